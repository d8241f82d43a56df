use super::*;
use crate::game::cards;
use crate::state::test_helpers::ScriptedDice;

fn seats(count: usize) -> Vec<Seat> {
    (0..count)
        .map(|i| Seat { user_id: 100 + i64::try_from(i).expect("small index"), name: format!("Player{i}") })
        .collect()
}

fn new_game(players: usize) -> Game {
    Game::new(Uuid::new_v4(), &seats(players), Rules::default())
}

fn act(game: &mut Game, actor: PlayerId, action: GameAction, rolls: &[(u8, u8)]) -> Result<Applied, GameError> {
    let mut dice = ScriptedDice::new(rolls);
    game.apply(actor, action, &mut dice)
}

fn give(game: &mut Game, player: PlayerId, squares: &[usize]) {
    for &id in squares {
        game.mutable_properties.get_mut(id).expect("purchasable").owner_id = Some(player);
        game.players[player].properties.insert(id);
    }
}

// =============================================================================
// ROLLING
// =============================================================================

#[test]
fn roll_to_unowned_square_then_buy() {
    let mut game = new_game(2);

    let applied = act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    assert_eq!(applied.event, EventKind::GameUpdate);
    assert_eq!(game.players[0].position, 7);
    assert_eq!(game.phase, Phase::DecideToBuy);
    assert_eq!(game.property_for_sale.as_ref().map(|s| s.id), Some(7));
    assert_eq!(game.dice, Some(Dice(3, 4)));

    let applied = act(&mut game, 0, GameAction::BuyProperty, &[]).expect("buy");
    assert_eq!(applied.event, EventKind::PropertyBought);
    assert_eq!(game.players[0].money, 1400);
    assert_eq!(game.mutable_properties.owner(7), Some(0));
    assert!(game.players[0].properties.contains(&7));
    assert!(game.property_for_sale.is_none());
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn roll_out_of_turn_is_rejected_without_mutation() {
    let mut game = new_game(2);
    let before = game.clone();

    assert_eq!(act(&mut game, 1, GameAction::RollDice, &[(3, 4)]), Err(GameError::NotYourTurn));
    assert_eq!(game, before);
}

#[test]
fn unknown_actor_is_rejected() {
    let mut game = new_game(2);
    assert_eq!(act(&mut game, 9, GameAction::RollDice, &[(3, 4)]), Err(GameError::PlayerNotFound(9)));
}

#[test]
fn buy_in_wrong_phase_is_rejected() {
    let mut game = new_game(2);
    assert_eq!(
        act(&mut game, 0, GameAction::BuyProperty, &[]),
        Err(GameError::WrongPhase(Phase::WaitForRoll))
    );
}

#[test]
fn buy_without_enough_money_changes_nothing() {
    let mut game = new_game(2);
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    game.players[0].money = 99;
    let before = game.clone();

    assert_eq!(
        act(&mut game, 0, GameAction::BuyProperty, &[]),
        Err(GameError::InsufficientFunds { needed: 100, available: 99 })
    );
    assert_eq!(game, before);
}

#[test]
fn passing_go_credits_bonus_once() {
    let mut game = new_game(2);
    game.players[0].position = 38;

    let applied = act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    assert_eq!(game.players[0].position, 3);
    assert_eq!(game.players[0].money, 1700);
    let go_notices = applied.notices.iter().filter(|n| matches!(n, Notice::PassedGo { .. })).count();
    assert_eq!(go_notices, 1);
}

#[test]
fn doubles_grant_another_roll() {
    let mut game = new_game(2);

    act(&mut game, 0, GameAction::RollDice, &[(2, 2)]).expect("roll");
    assert_eq!(game.players[0].position, 4);
    assert_eq!(game.players[0].money, 1300);
    assert_eq!(game.phase, Phase::WaitForRoll);
    assert_eq!(game.turn, 0);

    act(&mut game, 0, GameAction::RollDice, &[(1, 2)]).expect("second roll");
    assert_eq!(game.players[0].position, 7);
    assert_eq!(game.doubles, 0);

    act(&mut game, 0, GameAction::BuyProperty, &[]).expect("buy");
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn third_double_goes_to_jail_without_moving() {
    let mut game = new_game(2);
    game.doubles = 2;
    game.players[0].position = 5;

    act(&mut game, 0, GameAction::RollDice, &[(3, 3)]).expect("roll");
    assert_eq!(game.players[0].position, JAIL_SQUARE);
    assert!(game.players[0].in_jail);
    assert_eq!(game.doubles, 0);
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn landing_on_go_to_jail_jails_the_player() {
    let mut game = new_game(2);
    game.players[0].position = 25;

    act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    assert_eq!(game.players[0].position, JAIL_SQUARE);
    assert!(game.players[0].in_jail);
    assert_eq!(game.players[0].money, 1500);
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn rent_moves_money_to_owner() {
    let mut game = new_game(2);
    give(&mut game, 1, &[7]);

    let applied = act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    assert_eq!(game.players[0].money, 1494);
    assert_eq!(game.players[1].money, 1506);
    assert_eq!(game.phase, Phase::WaitForNextTurn);
    assert!(applied.notices.contains(&Notice::RentPaid { from: 0, to: 1, square_id: 7, amount: 6 }));
}

#[test]
fn own_or_mortgaged_property_charges_nothing() {
    let mut game = new_game(2);
    give(&mut game, 0, &[7]);
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    assert_eq!(game.players[0].money, 1500);

    let mut game = new_game(2);
    give(&mut game, 1, &[7]);
    game.mutable_properties.get_mut(7).expect("vermont").is_mortgaged = true;
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    assert_eq!(game.players[0].money, 1500);
    assert_eq!(game.players[1].money, 1500);
}

// =============================================================================
// AUCTIONS
// =============================================================================

#[test]
fn pass_opens_auction_and_fold_sells_to_bidder() {
    let mut game = new_game(3);
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");

    let applied = act(&mut game, 0, GameAction::PassOnBuy, &[]).expect("pass");
    assert_eq!(applied.event, EventKind::AuctionStarted);
    assert_eq!(game.phase, Phase::AuctionProperty);
    let auction = game.auction.as_ref().expect("auction open");
    assert_eq!(auction.active_players, vec![1, 2]);
    assert_eq!(auction.current_bidder(), Some(1));
    assert!(game.property_for_sale.is_none());

    let applied = act(&mut game, 1, GameAction::PlaceBid { amount: 50 }, &[]).expect("bid");
    assert_eq!(applied.event, EventKind::AuctionUpdate);
    assert_eq!(game.auction.as_ref().and_then(Auction::current_bidder), Some(2));

    let applied = act(&mut game, 2, GameAction::FoldAuction, &[]).expect("fold");
    assert_eq!(applied.event, EventKind::AuctionFinished);
    assert_eq!(game.mutable_properties.owner(7), Some(1));
    assert_eq!(game.players[1].money, 1450);
    assert!(game.players[1].properties.contains(&7));
    assert!(game.auction.is_none());
    assert_eq!(game.phase, Phase::WaitForNextTurn);
    assert_eq!(game.turn, 0);
}

#[test]
fn auction_seeding_starts_after_passer() {
    let mut game = new_game(4);
    game.turn = 2;
    game.players[2].position = 0;
    act(&mut game, 2, GameAction::RollDice, &[(3, 4)]).expect("roll");
    act(&mut game, 2, GameAction::PassOnBuy, &[]).expect("pass");

    let auction = game.auction.as_ref().expect("auction open");
    assert_eq!(auction.active_players, vec![3, 0, 1]);
}

#[test]
fn invalid_bids_leave_auction_untouched() {
    let mut game = new_game(3);
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    act(&mut game, 0, GameAction::PassOnBuy, &[]).expect("pass");
    act(&mut game, 1, GameAction::PlaceBid { amount: 50 }, &[]).expect("bid");
    let before = game.clone();

    assert!(matches!(act(&mut game, 2, GameAction::PlaceBid { amount: 50 }, &[]), Err(GameError::Rule(_))));
    assert_eq!(
        act(&mut game, 2, GameAction::PlaceBid { amount: 5000 }, &[]),
        Err(GameError::InsufficientFunds { needed: 5000, available: 1500 })
    );
    assert_eq!(act(&mut game, 1, GameAction::PlaceBid { amount: 60 }, &[]), Err(GameError::NotYourTurn));
    assert_eq!(game, before);
}

#[test]
fn everyone_folding_leaves_property_unowned() {
    let mut game = new_game(2);
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    act(&mut game, 0, GameAction::PassOnBuy, &[]).expect("pass");

    act(&mut game, 1, GameAction::FoldAuction, &[]).expect("fold");
    assert_eq!(game.mutable_properties.owner(7), None);
    assert!(game.auction.is_none());
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn property_management_is_blocked_during_auction() {
    let mut game = new_game(3);
    give(&mut game, 1, &[39]);
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    act(&mut game, 0, GameAction::PassOnBuy, &[]).expect("pass");

    assert_eq!(
        act(&mut game, 1, GameAction::Mortgage { square_id: 39 }, &[]),
        Err(GameError::WrongPhase(Phase::AuctionProperty))
    );
}

// =============================================================================
// JAIL
// =============================================================================

fn jailed_game() -> Game {
    let mut game = new_game(2);
    game.players[0].position = JAIL_SQUARE;
    game.players[0].in_jail = true;
    game.phase = Phase::JailDecision;
    game
}

#[test]
fn jail_pay_releases_to_roll() {
    let mut game = jailed_game();
    act(&mut game, 0, GameAction::Jail(JailChoice::Pay), &[]).expect("pay");
    assert!(!game.players[0].in_jail);
    assert_eq!(game.players[0].money, 1450);
    assert_eq!(game.phase, Phase::WaitForRoll);
}

#[test]
fn jail_pay_without_money_is_rejected() {
    let mut game = jailed_game();
    game.players[0].money = 10;
    assert_eq!(
        act(&mut game, 0, GameAction::Jail(JailChoice::Pay), &[]),
        Err(GameError::InsufficientFunds { needed: 50, available: 10 })
    );
    assert!(game.players[0].in_jail);
}

#[test]
fn jail_card_needs_a_token() {
    let mut game = jailed_game();
    assert!(matches!(act(&mut game, 0, GameAction::Jail(JailChoice::Card), &[]), Err(GameError::Rule(_))));

    game.players[0].get_out_of_jail_free = 1;
    act(&mut game, 0, GameAction::Jail(JailChoice::Card), &[]).expect("use card");
    assert!(!game.players[0].in_jail);
    assert_eq!(game.players[0].get_out_of_jail_free, 0);
    assert_eq!(game.phase, Phase::WaitForRoll);
}

#[test]
fn jail_roll_doubles_moves_without_extra_roll() {
    let mut game = jailed_game();
    act(&mut game, 0, GameAction::Jail(JailChoice::Roll), &[(3, 3)]).expect("roll");
    assert!(!game.players[0].in_jail);
    assert_eq!(game.players[0].position, 16);
    assert_eq!(game.phase, Phase::DecideToBuy);

    act(&mut game, 0, GameAction::BuyProperty, &[]).expect("buy");
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn failed_jail_roll_keeps_player_jailed() {
    let mut game = jailed_game();
    act(&mut game, 0, GameAction::Jail(JailChoice::Roll), &[(1, 2)]).expect("roll");
    assert!(game.players[0].in_jail);
    assert_eq!(game.players[0].jail_turns, 1);
    assert_eq!(game.players[0].position, JAIL_SQUARE);
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn third_failed_jail_roll_forces_fine_and_moves() {
    let mut game = jailed_game();
    game.players[0].jail_turns = 2;

    act(&mut game, 0, GameAction::Jail(JailChoice::Roll), &[(1, 2)]).expect("roll");
    assert!(!game.players[0].in_jail);
    assert_eq!(game.players[0].money, 1450);
    assert_eq!(game.players[0].position, 13);
    assert_eq!(game.phase, Phase::DecideToBuy);
}

#[test]
fn end_turn_skips_bankrupt_and_enters_jail_decision() {
    let mut game = new_game(3);
    game.phase = Phase::WaitForNextTurn;
    game.players[1].is_bankrupt = true;
    game.players[2].in_jail = true;

    let applied = act(&mut game, 0, GameAction::EndTurn, &[]).expect("end turn");
    assert_eq!(applied.event, EventKind::EndTurn);
    assert_eq!(game.turn, 2);
    assert_eq!(game.phase, Phase::JailDecision);
    assert!(game.dice.is_none());
}

#[test]
fn end_turn_wraps_to_first_seat() {
    let mut game = new_game(2);
    game.turn = 1;
    game.phase = Phase::WaitForNextTurn;
    act(&mut game, 1, GameAction::EndTurn, &[]).expect("end turn");
    assert_eq!(game.turn, 0);
    assert_eq!(game.phase, Phase::WaitForRoll);
}

// =============================================================================
// BUILDINGS AND MORTGAGES
// =============================================================================

#[test]
fn building_must_stay_even() {
    let mut game = new_game(2);
    give(&mut game, 0, &[6, 7, 9]);

    act(&mut game, 0, GameAction::BuildHouse { square_id: 6 }, &[]).expect("build");
    assert_eq!(game.mutable_properties.get(6).map(|p| p.houses), Some(1));
    assert_eq!(game.players[0].money, 1450);

    assert!(matches!(act(&mut game, 0, GameAction::BuildHouse { square_id: 6 }, &[]), Err(GameError::Rule(_))));

    act(&mut game, 0, GameAction::BuildHouse { square_id: 7 }, &[]).expect("build");
    act(&mut game, 0, GameAction::BuildHouse { square_id: 9 }, &[]).expect("build");
    act(&mut game, 0, GameAction::BuildHouse { square_id: 6 }, &[]).expect("build");
    assert_eq!(game.mutable_properties.group_houses(game.board(), board::ColorGroup::LightBlue), vec![2, 1, 1]);
}

#[test]
fn building_requires_whole_unmortgaged_group() {
    let mut game = new_game(2);
    give(&mut game, 0, &[6, 7]);
    assert!(matches!(act(&mut game, 0, GameAction::BuildHouse { square_id: 6 }, &[]), Err(GameError::Rule(_))));

    give(&mut game, 0, &[9]);
    game.mutable_properties.get_mut(9).expect("connecticut").is_mortgaged = true;
    assert!(matches!(act(&mut game, 0, GameAction::BuildHouse { square_id: 6 }, &[]), Err(GameError::Rule(_))));
}

#[test]
fn building_on_railroad_or_unowned_square_is_rejected() {
    let mut game = new_game(2);
    give(&mut game, 0, &[5]);
    assert!(matches!(act(&mut game, 0, GameAction::BuildHouse { square_id: 5 }, &[]), Err(GameError::Rule(_))));
    assert!(matches!(act(&mut game, 0, GameAction::BuildHouse { square_id: 1 }, &[]), Err(GameError::Rule(_))));
    assert_eq!(
        act(&mut game, 0, GameAction::BuildHouse { square_id: 40 }, &[]),
        Err(GameError::SquareNotFound(40))
    );
}

#[test]
fn hotel_is_the_limit() {
    let mut game = new_game(2);
    give(&mut game, 0, &[37, 39]);
    for square_id in [37, 39] {
        game.mutable_properties.get_mut(square_id).expect("dark blue").houses = MAX_HOUSES;
    }
    assert!(matches!(act(&mut game, 0, GameAction::BuildHouse { square_id: 39 }, &[]), Err(GameError::Rule(_))));
}

#[test]
fn selling_must_stay_even_and_refunds_half() {
    let mut game = new_game(2);
    give(&mut game, 0, &[6, 7, 9]);
    game.mutable_properties.get_mut(6).expect("oriental").houses = 2;
    game.mutable_properties.get_mut(7).expect("vermont").houses = 1;
    game.mutable_properties.get_mut(9).expect("connecticut").houses = 1;

    assert!(matches!(act(&mut game, 0, GameAction::SellHouse { square_id: 7 }, &[]), Err(GameError::Rule(_))));

    act(&mut game, 0, GameAction::SellHouse { square_id: 6 }, &[]).expect("sell");
    assert_eq!(game.mutable_properties.get(6).map(|p| p.houses), Some(1));
    assert_eq!(game.players[0].money, 1525);
}

#[test]
fn mortgage_and_unmortgage_round_down() {
    let mut game = new_game(2);
    give(&mut game, 0, &[7]);

    let applied = act(&mut game, 0, GameAction::Mortgage { square_id: 7 }, &[]).expect("mortgage");
    assert_eq!(applied.event, EventKind::PropertyMortgaged);
    assert_eq!(game.players[0].money, 1550);
    assert!(game.mutable_properties.get(7).is_some_and(|p| p.is_mortgaged));

    assert!(matches!(act(&mut game, 0, GameAction::Mortgage { square_id: 7 }, &[]), Err(GameError::Rule(_))));

    act(&mut game, 0, GameAction::Unmortgage { square_id: 7 }, &[]).expect("unmortgage");
    assert_eq!(game.players[0].money, 1495);
    assert!(game.mutable_properties.get(7).is_some_and(|p| !p.is_mortgaged));
}

#[test]
fn mortgage_blocked_while_group_has_houses() {
    let mut game = new_game(2);
    give(&mut game, 0, &[6, 7, 9]);
    game.mutable_properties.get_mut(6).expect("oriental").houses = 1;
    assert!(matches!(act(&mut game, 0, GameAction::Mortgage { square_id: 9 }, &[]), Err(GameError::Rule(_))));
}

#[test]
fn other_players_may_manage_property_off_turn() {
    let mut game = new_game(2);
    give(&mut game, 1, &[7]);
    act(&mut game, 1, GameAction::Mortgage { square_id: 7 }, &[]).expect("off-turn mortgage");
    assert_eq!(game.players[1].money, 1550);
    assert_eq!(game.phase, Phase::WaitForRoll);
}

// =============================================================================
// DEBT AND BANKRUPTCY
// =============================================================================

#[test]
fn unpaid_tax_raises_funds_until_mortgage_covers_it() {
    let mut game = new_game(2);
    give(&mut game, 0, &[39]);
    game.players[0].money = 100;

    act(&mut game, 0, GameAction::RollDice, &[(1, 3)]).expect("roll");
    assert_eq!(game.players[0].money, -100);
    assert_eq!(game.phase, Phase::RaiseFunds);
    assert_eq!(game.debts, vec![Debt { debtor: 0, creditor: None, amount: 200 }]);

    assert_eq!(
        act(&mut game, 0, GameAction::EndTurn, &[]),
        Err(GameError::WrongPhase(Phase::RaiseFunds))
    );

    act(&mut game, 0, GameAction::Mortgage { square_id: 39 }, &[]).expect("mortgage");
    assert_eq!(game.players[0].money, 100);
    assert!(game.debts.is_empty());
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn debt_to_player_is_paid_when_settled() {
    let mut game = new_game(2);
    give(&mut game, 1, &[6, 7, 9]);
    give(&mut game, 0, &[39]);
    game.mutable_properties.get_mut(7).expect("vermont").houses = 1;
    game.players[0].money = 20;

    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    assert_eq!(game.phase, Phase::RaiseFunds);
    assert_eq!(game.players[1].money, 1500);

    act(&mut game, 0, GameAction::Mortgage { square_id: 39 }, &[]).expect("mortgage");
    assert_eq!(game.players[0].money, 190);
    assert_eq!(game.players[1].money, 1530);
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn debtor_without_assets_goes_bankrupt_to_creditor() {
    let mut game = new_game(2);
    give(&mut game, 1, &[6, 7, 9]);
    game.mutable_properties.get_mut(7).expect("vermont").houses = 3;
    game.players[0].money = 10;

    let applied = act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    assert!(game.players[0].is_bankrupt);
    assert_eq!(game.players[0].money, 0);
    assert_eq!(game.players[1].money, 1510);
    assert_eq!(game.phase, Phase::GameOver);
    assert_eq!(game.winner, Some(1));
    assert!(applied.notices.contains(&Notice::Bankrupt { player_id: 0, creditor: Some(1) }));
    assert!(applied.notices.contains(&Notice::GameOver { winner: 1 }));
}

#[test]
fn bankrupt_estate_transfers_properties_to_creditor() {
    let mut game = new_game(3);
    give(&mut game, 1, &[6, 7, 9]);
    give(&mut game, 0, &[5]);
    game.mutable_properties.get_mut(5).expect("reading").is_mortgaged = true;
    game.mutable_properties.get_mut(7).expect("vermont").houses = 3;
    game.players[0].money = 10;

    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    assert!(game.players[0].is_bankrupt);
    assert_eq!(game.mutable_properties.owner(5), Some(1));
    assert!(game.players[1].properties.contains(&5));
    assert_eq!(game.phase, Phase::WaitForRoll);
    assert_eq!(game.turn, 1);
}

#[test]
fn declare_bankruptcy_returns_holdings_to_bank() {
    let mut game = new_game(3);
    give(&mut game, 0, &[39]);
    game.players[0].money = 100;
    act(&mut game, 0, GameAction::RollDice, &[(1, 3)]).expect("roll");
    assert_eq!(game.phase, Phase::RaiseFunds);

    assert!(matches!(act(&mut game, 1, GameAction::DeclareBankruptcy, &[]), Err(GameError::Rule(_))));

    let applied = act(&mut game, 0, GameAction::DeclareBankruptcy, &[]).expect("bankrupt");
    assert_eq!(applied.event, EventKind::PlayerBankrupt);
    assert!(game.players[0].is_bankrupt);
    assert!(game.players[0].properties.is_empty());
    assert_eq!(game.mutable_properties.owner(39), None);
    assert_eq!(game.turn, 1);
    assert_eq!(game.phase, Phase::WaitForRoll);
}

#[test]
fn declare_bankruptcy_outside_raise_funds_is_rejected() {
    let mut game = new_game(2);
    assert_eq!(
        act(&mut game, 0, GameAction::DeclareBankruptcy, &[]),
        Err(GameError::WrongPhase(Phase::WaitForRoll))
    );
}

#[test]
fn bankrupt_player_cannot_act() {
    let mut game = new_game(3);
    give(&mut game, 1, &[7]);
    game.players[1].is_bankrupt = true;
    assert!(matches!(act(&mut game, 1, GameAction::Mortgage { square_id: 7 }, &[]), Err(GameError::Rule(_))));
}

// =============================================================================
// CARDS
// =============================================================================

fn on_chance(card: Card) -> Game {
    let mut game = new_game(2);
    game.players[0].position = 17;
    game.stack_decks(vec![card], Vec::new());
    game
}

#[test]
fn money_card_credits_drawer() {
    let mut game = on_chance(Card::Money { amount: 50, text: "dividend".into() });
    let applied = act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    assert_eq!(game.players[0].position, 22);
    assert_eq!(game.players[0].money, 1550);
    assert_eq!(game.phase, Phase::WaitForNextTurn);
    assert!(applied.notices.iter().any(|n| matches!(n, Notice::CardDrawn { deck: DeckKind::Chance, .. })));
}

#[test]
fn nearest_railroad_card_offers_purchase() {
    let mut game = on_chance(Card::Nearest { target: SquareKind::Railroad, text: "railroad".into() });
    act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    assert_eq!(game.players[0].position, 25);
    assert_eq!(game.phase, Phase::DecideToBuy);
    assert_eq!(game.property_for_sale.as_ref().map(|s| s.id), Some(25));
}

#[test]
fn advance_to_go_card_pays_bonus() {
    let mut game = on_chance(Card::Move { target: 0, text: "go".into() });
    act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    assert_eq!(game.players[0].position, 0);
    assert_eq!(game.players[0].money, 1700);
    assert_eq!(game.phase, Phase::WaitForNextTurn);
}

#[test]
fn back_card_moves_without_go_bonus() {
    let mut game = on_chance(Card::Back { steps: 3, text: "back".into() });
    act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    assert_eq!(game.players[0].position, 19);
    assert_eq!(game.players[0].money, 1500);
    assert_eq!(game.phase, Phase::DecideToBuy);
}

fn jail_free() -> Card {
    Card::JailFree { text: "Get out of Jail Free".into() }
}

/// Player 0 draws the chance jail-free card from a two-card deck.
fn holding_jail_free() -> Game {
    let mut game = new_game(2);
    game.players[0].position = 17;
    game.stack_decks(vec![jail_free(), Card::Money { amount: 10, text: "ten".into() }], Vec::new());
    act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    game
}

#[test]
fn jail_free_card_is_kept_out_of_the_deck() {
    let game = holding_jail_free();
    assert_eq!(game.players[0].get_out_of_jail_free, 1);
    assert_eq!(game.held_cards, vec![HeldCard { player_id: 0, deck: DeckKind::Chance, card: jail_free() }]);
    assert_eq!(game.chance.len(), 1);
}

#[test]
fn used_jail_free_card_returns_to_its_deck() {
    let mut game = holding_jail_free();
    game.players[0].position = JAIL_SQUARE;
    game.players[0].in_jail = true;
    game.phase = Phase::JailDecision;

    act(&mut game, 0, GameAction::Jail(JailChoice::Card), &[]).expect("use card");
    assert!(game.held_cards.is_empty());
    assert_eq!(game.chance.len(), 2);
    assert!(game.community_chest.is_empty());
}

#[test]
fn bankruptcy_forfeits_held_cards_to_their_deck() {
    let mut game = holding_jail_free();
    game.players[0].position = 0;
    game.players[0].money = 0;
    game.phase = Phase::WaitForRoll;

    act(&mut game, 0, GameAction::RollDice, &[(1, 3)]).expect("roll onto income tax");
    assert!(game.players[0].is_bankrupt);
    assert_eq!(game.players[0].get_out_of_jail_free, 0);
    assert!(game.held_cards.is_empty());
    assert_eq!(game.chance.len(), 2);
}

#[test]
fn hydrated_game_does_not_duplicate_held_cards() {
    let game = holding_jail_free();
    let json = serde_json::to_string(&game).expect("serialize");

    let mut restored: Game = serde_json::from_str(&json).expect("deserialize");
    restored.restore_decks();
    assert_eq!(restored.held_cards.len(), 1);
    assert_eq!(restored.chance.len(), cards::chance_cards().len() - 1);
    assert_eq!(restored.community_chest.len(), cards::community_chest_cards().len());

    restored.players[0].get_out_of_jail_free = 0;
    restored.return_surplus_cards(0);
    assert!(restored.held_cards.is_empty());
    assert_eq!(restored.chance.len(), cards::chance_cards().len());
}

#[test]
fn repairs_card_charges_per_building() {
    let mut game = on_chance(Card::Repairs { per_house: 25, per_hotel: 100, text: "repairs".into() });
    give(&mut game, 0, &[37, 39]);
    game.mutable_properties.get_mut(37).expect("park place").houses = 4;
    game.mutable_properties.get_mut(39).expect("boardwalk").houses = MAX_HOUSES;
    act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    assert_eq!(game.players[0].money, 1300);
}

#[test]
fn collect_from_players_takes_what_each_can_pay() {
    let mut game = new_game(3);
    game.players[0].position = 12;
    game.players[2].money = 20;
    game.stack_decks(Vec::new(), vec![Card::FromPlayers { amount: 50, text: "opera".into() }]);

    act(&mut game, 0, GameAction::RollDice, &[(2, 3)]).expect("roll");
    assert_eq!(game.players[0].position, 17);
    assert_eq!(game.players[0].money, 1570);
    assert_eq!(game.players[1].money, 1450);
    assert_eq!(game.players[2].money, 0);
}

// =============================================================================
// RESET AND GAME OVER
// =============================================================================

#[test]
fn reset_rebuilds_initial_state_for_same_seats() {
    let mut game = new_game(2);
    let id = game.id;
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    act(&mut game, 0, GameAction::BuyProperty, &[]).expect("buy");

    let applied = act(&mut game, 1, GameAction::ResetGame, &[]).expect("reset");
    assert_eq!(applied.event, EventKind::ResetGame);
    assert_eq!(game.id, id);
    assert_eq!(game.seats(), seats(2));
    assert_eq!(game.players[0].money, 1500);
    assert_eq!(game.players[0].position, 0);
    assert_eq!(game.mutable_properties.owner(7), None);
    assert_eq!(game.phase, Phase::WaitForRoll);
    assert_eq!(game.turn, 0);
}

#[test]
fn game_over_rejects_everything_but_reset() {
    let mut game = new_game(2);
    game.phase = Phase::GameOver;
    game.winner = Some(1);

    assert_eq!(
        act(&mut game, 0, GameAction::RollDice, &[(3, 4)]),
        Err(GameError::WrongPhase(Phase::GameOver))
    );
    act(&mut game, 0, GameAction::ResetGame, &[]).expect("reset");
    assert_eq!(game.phase, Phase::WaitForRoll);
    assert!(game.winner.is_none());
}

// =============================================================================
// SERIALIZATION
// =============================================================================

#[test]
fn state_json_uses_client_field_names() {
    let mut game = new_game(2);
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");

    let value = serde_json::to_value(&game).expect("serialize");
    assert_eq!(value["phase"], "DECIDE_TO_BUY");
    assert_eq!(value["propertyForSale"]["id"], 7);
    assert_eq!(value["dice"], serde_json::json!([3, 4]));
    assert_eq!(value["mutable_properties"]["7"]["owner_id"], serde_json::Value::Null);
    assert_eq!(value["players"][0]["money"], 1500);
    assert!(value.get("chance").is_none());
}

#[test]
fn snapshot_hydrates_back_into_a_playable_game() {
    let mut game = new_game(2);
    act(&mut game, 0, GameAction::RollDice, &[(3, 4)]).expect("roll");
    let json = serde_json::to_string(&game).expect("serialize");

    let mut restored: Game = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(restored.players, game.players);
    assert_eq!(restored.mutable_properties, game.mutable_properties);
    assert_eq!(restored.phase, Phase::DecideToBuy);

    act(&mut restored, 0, GameAction::BuyProperty, &[]).expect("buy after hydrate");
    assert_eq!(restored.mutable_properties.owner(7), Some(0));
}

#[test]
fn grant_property_moves_square_between_players() {
    let mut game = new_game(2);
    game.grant_property(0, 1).expect("grant to first");
    game.grant_property(1, 1).expect("grant to second");

    assert_eq!(game.mutable_properties.owner(1), Some(1));
    assert!(game.players[0].properties.is_empty());
    assert!(game.players[1].properties.contains(&1));
    assert_eq!(game.grant_property(5, 1), Err(GameError::PlayerNotFound(5)));
    assert_eq!(game.grant_property(0, 2), Err(GameError::SquareNotFound(2)));
}
