//! Turn engine — the authoritative phase machine.
//!
//! DESIGN
//! ======
//! `Game::apply` is the single entry point. It runs the action against a
//! working copy and commits only on success, so a rejected action leaves the
//! game untouched and produces nothing to broadcast.
//!
//! Every path that finishes resolving a roll, purchase, or auction goes
//! through `settle_turn`, which decides between another roll (doubles),
//! raising funds (unpaid debt), bankruptcy (nothing left to sell), and
//! waiting for `end_turn`.
//!
//! DEBT
//! ====
//! A charge the payer cannot cover is still debited, leaving money negative,
//! and recorded as a `Debt`. Creditors are paid when the debtor climbs back
//! to zero. A debtor with nothing left to sell or mortgage goes bankrupt.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auction::{Auction, AuctionOutcome};
use super::board::{self, BOARD_SIZE, Board, JAIL_SQUARE, Square, SquareKind};
use super::cards::{Card, Deck, DeckKind};
use super::dice::{Dice, DiceRoller};
use super::event::{EventKind, Notice};
use super::ownership::{MAX_HOUSES, PropertyStore};
use super::player::{AccountId, Player, PlayerId, Seat};
use super::{GameAction, GameError, JailChoice};

/// Consecutive doubles that send a player to jail.
const MAX_DOUBLES: u8 = 3;

/// Failed jail rolls before the fine is forced.
const MAX_JAIL_ROLLS: u8 = 3;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    pub starting_money: i64,
    pub go_bonus: i64,
    pub jail_fine: i64,
}

impl Default for Rules {
    fn default() -> Self {
        Self { starting_money: 1500, go_bonus: 200, jail_fine: 50 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    WaitForRoll,
    DecideToBuy,
    AuctionProperty,
    JailDecision,
    RaiseFunds,
    WaitForNextTurn,
    GameOver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitForRoll => "WAIT_FOR_ROLL",
            Self::DecideToBuy => "DECIDE_TO_BUY",
            Self::AuctionProperty => "AUCTION_PROPERTY",
            Self::JailDecision => "JAIL_DECISION",
            Self::RaiseFunds => "RAISE_FUNDS",
            Self::WaitForNextTurn => "WAIT_FOR_NEXT_TURN",
            Self::GameOver => "GAME_OVER",
        };
        f.write_str(name)
    }
}

/// An unpaid charge. `creditor: None` means the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub debtor: PlayerId,
    pub creditor: Option<PlayerId>,
    pub amount: i64,
}

/// A get-out-of-jail-free card out of its deck, in a player's hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldCard {
    pub player_id: PlayerId,
    pub deck: DeckKind,
    pub card: Card,
}

/// Result of an accepted action: the broadcast event name and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub event: EventKind,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Landing {
    Settled,
    AwaitingPurchase,
}

// =============================================================================
// GAME
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    /// Player whose turn it is.
    pub turn: PlayerId,
    pub phase: Phase,
    pub players: Vec<Player>,
    pub mutable_properties: PropertyStore,
    pub dice: Option<Dice>,
    #[serde(rename = "propertyForSale")]
    pub property_for_sale: Option<Square>,
    pub auction: Option<Auction>,
    pub doubles: u8,
    pub debts: Vec<Debt>,
    #[serde(default)]
    pub held_cards: Vec<HeldCard>,
    pub winner: Option<PlayerId>,
    pub rules: Rules,
    #[serde(skip, default = "Deck::chance")]
    chance: Deck,
    #[serde(skip, default = "Deck::community_chest")]
    community_chest: Deck,
    #[serde(skip, default = "board::shared")]
    board: Arc<Board>,
    #[serde(skip)]
    log: Vec<Notice>,
}

impl Game {
    /// Fresh game on the shared board: everyone at Go with starting money.
    #[must_use]
    pub fn new(id: Uuid, seats: &[Seat], rules: Rules) -> Self {
        Self::with_board(id, seats, rules, board::shared())
    }

    #[must_use]
    pub fn with_board(id: Uuid, seats: &[Seat], rules: Rules, board: Arc<Board>) -> Self {
        let players = seats
            .iter()
            .enumerate()
            .map(|(id, seat)| Player::new(id, seat, rules.starting_money))
            .collect();
        Self {
            id,
            turn: 0,
            phase: Phase::WaitForRoll,
            players,
            mutable_properties: PropertyStore::for_board(&board),
            dice: None,
            property_for_sale: None,
            auction: None,
            doubles: 0,
            debts: Vec::new(),
            held_cards: Vec::new(),
            winner: None,
            rules,
            chance: Deck::chance(),
            community_chest: Deck::community_chest(),
            board,
            log: Vec::new(),
        }
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Seat index of an account, if it plays in this game.
    #[must_use]
    pub fn seat_of(&self, user_id: AccountId) -> Option<PlayerId> {
        self.players.iter().find(|p| p.user_id == user_id).map(|p| p.id)
    }

    #[must_use]
    pub fn seats(&self) -> Vec<Seat> {
        self.players.iter().map(Player::seat).collect()
    }

    /// `[account_id, player]` pairs in seat order.
    #[must_use]
    pub fn seat_mapping(&self) -> Vec<(AccountId, Player)> {
        self.players.iter().map(|p| (p.user_id, p.clone())).collect()
    }

    /// Take held cards out of freshly built decks. Decks are not part of the
    /// snapshot, so a hydrated game rebuilds them full and must call this.
    pub fn restore_decks(&mut self) {
        for held in &self.held_cards {
            let deck = match held.deck {
                DeckKind::Chance => &mut self.chance,
                DeckKind::CommunityChest => &mut self.community_chest,
            };
            deck.withhold(&held.card);
        }
    }

    /// Return cards a player holds beyond their `get_out_of_jail_free` count.
    pub fn return_surplus_cards(&mut self, player: PlayerId) {
        let Some(count) = self.players.get(player).map(|p| p.get_out_of_jail_free) else {
            return;
        };
        let held = self.held_cards.iter().filter(|h| h.player_id == player).count();
        let keep = usize::try_from(count).unwrap_or(usize::MAX);
        for _ in keep..held {
            self.return_held_card(player);
        }
    }

    fn deck_mut(&mut self, kind: DeckKind) -> &mut Deck {
        match kind {
            DeckKind::Chance => &mut self.chance,
            DeckKind::CommunityChest => &mut self.community_chest,
        }
    }

    /// Put the oldest card held by `player` back under its deck.
    fn return_held_card(&mut self, player: PlayerId) -> bool {
        let Some(index) = self.held_cards.iter().position(|h| h.player_id == player) else {
            return false;
        };
        let held = self.held_cards.remove(index);
        self.deck_mut(held.deck).put_back(held.card);
        true
    }

    #[cfg(test)]
    pub(crate) fn stack_decks(&mut self, chance: Vec<Card>, community_chest: Vec<Card>) {
        self.chance = Deck::stacked(chance);
        self.community_chest = Deck::stacked(community_chest);
    }

    /// Apply one action from `actor`.
    ///
    /// # Errors
    ///
    /// Returns a `GameError` when the action is illegal for the current phase,
    /// turn, or holdings. The game is unchanged in that case.
    pub fn apply(&mut self, actor: PlayerId, action: GameAction, dice: &mut dyn DiceRoller) -> Result<Applied, GameError> {
        let player = self.players.get(actor).ok_or(GameError::PlayerNotFound(actor))?;
        if action != GameAction::ResetGame {
            if self.phase == Phase::GameOver {
                return Err(GameError::WrongPhase(Phase::GameOver));
            }
            if player.is_bankrupt {
                return Err(GameError::Rule("bankrupt players cannot act".into()));
            }
        }

        let mut next = self.clone();
        let event = next.dispatch(actor, action, dice)?;
        let notices = std::mem::take(&mut next.log);
        *self = next;
        Ok(Applied { event, notices })
    }

    fn dispatch(&mut self, actor: PlayerId, action: GameAction, dice: &mut dyn DiceRoller) -> Result<EventKind, GameError> {
        match action {
            GameAction::RollDice => self.roll(actor, dice),
            GameAction::BuyProperty => self.buy(actor),
            GameAction::PassOnBuy => self.pass(actor),
            GameAction::PlaceBid { amount } => self.bid(actor, amount),
            GameAction::FoldAuction => self.fold(actor),
            GameAction::Jail(choice) => self.jail(actor, choice, dice),
            GameAction::BuildHouse { square_id } => self.build_house(actor, square_id),
            GameAction::SellHouse { square_id } => self.sell_house(actor, square_id),
            GameAction::Mortgage { square_id } => self.mortgage(actor, square_id),
            GameAction::Unmortgage { square_id } => self.unmortgage(actor, square_id),
            GameAction::DeclareBankruptcy => self.declare_bankruptcy(actor),
            GameAction::EndTurn => self.end_turn(actor),
            GameAction::ResetGame => Ok(self.reset()),
        }
    }

    fn expect_turn(&self, actor: PlayerId) -> Result<(), GameError> {
        if self.turn == actor { Ok(()) } else { Err(GameError::NotYourTurn) }
    }

    fn expect_phase(&self, phase: Phase) -> Result<(), GameError> {
        if self.phase == phase { Ok(()) } else { Err(GameError::WrongPhase(self.phase)) }
    }

    // =========================================================================
    // ROLLING AND MOVEMENT
    // =========================================================================

    fn roll(&mut self, actor: PlayerId, roller: &mut dyn DiceRoller) -> Result<EventKind, GameError> {
        self.expect_turn(actor)?;
        self.expect_phase(Phase::WaitForRoll)?;

        let dice = roller.roll();
        self.dice = Some(dice);
        self.log.push(Notice::DiceRolled { player_id: actor, dice });

        if dice.is_double() {
            self.doubles += 1;
            if self.doubles >= MAX_DOUBLES {
                self.send_to_jail(actor);
                self.settle_turn();
                return Ok(EventKind::GameUpdate);
            }
        } else {
            self.doubles = 0;
        }

        self.advance(actor, dice.sum());
        self.resolve_landing(actor, dice);
        Ok(EventKind::GameUpdate)
    }

    fn advance(&mut self, player: PlayerId, steps: usize) {
        let to = (self.players[player].position + steps) % BOARD_SIZE;
        self.move_to(player, to, true);
    }

    /// Move a token. Forward moves that wrap past Go pay the bonus once.
    fn move_to(&mut self, player: PlayerId, to: usize, forward: bool) {
        let from = self.players[player].position;
        if forward && to < from {
            self.players[player].money += self.rules.go_bonus;
            self.log.push(Notice::PassedGo { player_id: player, amount: self.rules.go_bonus });
        }
        self.players[player].position = to;
        self.log.push(Notice::Moved { player_id: player, position: to });
    }

    fn resolve_landing(&mut self, player: PlayerId, dice: Dice) {
        if self.land(player, dice) == Landing::Settled {
            self.settle_turn();
        }
    }

    fn land(&mut self, player: PlayerId, dice: Dice) -> Landing {
        let position = self.players[player].position;
        let Some(square) = self.board.square(position).cloned() else {
            return Landing::Settled;
        };

        match square.kind {
            SquareKind::Property | SquareKind::Railroad | SquareKind::Utility => {
                match self.mutable_properties.owner(square.id) {
                    None => {
                        self.property_for_sale = Some(square);
                        self.phase = Phase::DecideToBuy;
                        return Landing::AwaitingPurchase;
                    }
                    Some(owner) if owner != player => {
                        let rent = self.mutable_properties.rent(&self.board, &square, dice.sum());
                        if rent > 0 {
                            self.log.push(Notice::RentPaid { from: player, to: owner, square_id: square.id, amount: rent });
                            self.charge(player, Some(owner), rent);
                        }
                    }
                    Some(_) => {}
                }
            }
            SquareKind::Tax => {
                let amount = square.tax_amount.unwrap_or(0);
                self.log.push(Notice::TaxPaid { player_id: player, amount });
                self.charge(player, None, amount);
            }
            SquareKind::GoToJail => self.send_to_jail(player),
            SquareKind::Chance => return self.draw_card(player, DeckKind::Chance, dice),
            SquareKind::Community => return self.draw_card(player, DeckKind::CommunityChest, dice),
            SquareKind::Go | SquareKind::Jail | SquareKind::FreeParking => {}
        }
        Landing::Settled
    }

    fn draw_card(&mut self, player: PlayerId, deck: DeckKind, dice: Dice) -> Landing {
        let card = self.deck_mut(deck).draw();
        let Some(card) = card else {
            return Landing::Settled;
        };
        self.log.push(Notice::CardDrawn { player_id: player, deck, card: card.clone() });

        let position = self.players[player].position;
        match card {
            Card::Move { target, .. } => {
                self.move_to(player, target % BOARD_SIZE, true);
                return self.land(player, dice);
            }
            Card::Nearest { target, .. } => {
                if let Some(to) = self.board.nearest(position, target) {
                    self.move_to(player, to, true);
                    return self.land(player, dice);
                }
            }
            Card::Back { steps, .. } => {
                let to = (position + BOARD_SIZE - steps % BOARD_SIZE) % BOARD_SIZE;
                self.move_to(player, to, false);
                return self.land(player, dice);
            }
            Card::Money { amount, .. } => {
                if amount >= 0 {
                    self.players[player].money += amount;
                } else {
                    self.charge(player, None, -amount);
                }
            }
            Card::GoToJail { .. } => self.send_to_jail(player),
            Card::Repairs { per_house, per_hotel, .. } => {
                let (houses, hotels) = self.mutable_properties.buildings(player);
                self.charge(player, None, houses * per_house + hotels * per_hotel);
            }
            Card::JailFree { .. } => {
                self.players[player].get_out_of_jail_free += 1;
                self.held_cards.push(HeldCard { player_id: player, deck, card });
            }
            Card::FromPlayers { amount, .. } => {
                for other in 0..self.players.len() {
                    if other == player || self.players[other].is_bankrupt {
                        continue;
                    }
                    let paid = amount.min(self.players[other].money.max(0));
                    self.players[other].money -= paid;
                    self.players[player].money += paid;
                    self.log.push(Notice::Collected { from: other, to: player, amount: paid });
                }
            }
        }
        Landing::Settled
    }

    fn send_to_jail(&mut self, player: PlayerId) {
        let p = &mut self.players[player];
        p.position = JAIL_SQUARE;
        p.in_jail = true;
        p.jail_turns = 0;
        if self.turn == player {
            self.doubles = 0;
        }
        self.log.push(Notice::SentToJail { player_id: player });
    }

    fn release_from_jail(&mut self, player: PlayerId) {
        let p = &mut self.players[player];
        p.in_jail = false;
        p.jail_turns = 0;
        self.log.push(Notice::ReleasedFromJail { player_id: player });
    }

    // =========================================================================
    // MONEY
    // =========================================================================

    /// Debit `amount` from `debtor`. Uncovered charges become a `Debt`.
    fn charge(&mut self, debtor: PlayerId, creditor: Option<PlayerId>, amount: i64) {
        if amount <= 0 {
            return;
        }
        let available = self.players[debtor].money;
        self.players[debtor].money -= amount;
        if available >= amount {
            if let Some(creditor) = creditor {
                self.players[creditor].money += amount;
            }
        } else {
            self.debts.push(Debt { debtor, creditor, amount });
            self.log.push(Notice::DebtOwed { player_id: debtor, amount });
        }
    }

    /// Pay creditors once the debtor is back to zero. Returns `true` when no
    /// debt remains.
    fn clear_debts(&mut self) -> bool {
        let Some(first) = self.debts.first() else {
            return true;
        };
        let debtor = first.debtor;
        if self.players[debtor].money < 0 {
            return false;
        }
        for debt in std::mem::take(&mut self.debts) {
            if let Some(creditor) = debt.creditor {
                self.players[creditor].money += debt.amount;
            }
        }
        self.log.push(Notice::DebtSettled { player_id: debtor });
        true
    }

    /// Decide where the current turn goes once an action has fully resolved.
    fn settle_turn(&mut self) {
        if self.phase == Phase::GameOver {
            return;
        }
        if !self.clear_debts() {
            let debtor = self.debts[0].debtor;
            if self.mutable_properties.has_liquid_assets(debtor) {
                self.phase = Phase::RaiseFunds;
            } else {
                self.bankrupt(debtor);
            }
            return;
        }
        let current = &self.players[self.turn];
        self.phase = if self.doubles > 0 && !current.in_jail { Phase::WaitForRoll } else { Phase::WaitForNextTurn };
    }

    fn bankrupt(&mut self, debtor: PlayerId) {
        let creditor = self.debts.iter().find_map(|d| d.creditor.filter(|&c| c != debtor));

        // Buildings go back to the bank at half their cost.
        let mut refund = 0;
        for &square_id in &self.players[debtor].properties {
            if let (Some(prop), Some(square)) = (self.mutable_properties.get_mut(square_id), self.board.square(square_id)) {
                let house_cost = square.details.as_ref().map_or(0, |d| d.house_cost);
                refund += i64::from(prop.houses) * house_cost / 2;
                prop.houses = 0;
            }
        }
        let owed: i64 = self.debts.iter().map(|d| d.amount).sum();
        let estate = (self.players[debtor].money + owed + refund).max(0);
        self.debts.clear();

        match creditor {
            Some(creditor) => {
                self.players[creditor].money += estate;
                let moved = self.mutable_properties.transfer_all(debtor, creditor);
                self.players[creditor].properties.extend(moved);
            }
            None => self.mutable_properties.release_all(debtor),
        }

        while self.return_held_card(debtor) {}
        let p = &mut self.players[debtor];
        p.money = 0;
        p.properties.clear();
        p.in_jail = false;
        p.jail_turns = 0;
        p.get_out_of_jail_free = 0;
        p.is_bankrupt = true;
        self.log.push(Notice::Bankrupt { player_id: debtor, creditor });

        let solvent: Vec<PlayerId> = self.players.iter().filter(|p| !p.is_bankrupt).map(|p| p.id).collect();
        if solvent.len() <= 1 {
            self.phase = Phase::GameOver;
            self.winner = solvent.first().copied();
            self.auction = None;
            self.property_for_sale = None;
            if let Some(winner) = self.winner {
                self.log.push(Notice::GameOver { winner });
            }
            return;
        }
        if self.turn == debtor {
            self.advance_turn();
        }
    }

    fn advance_turn(&mut self) {
        let count = self.players.len();
        let current = self.turn;
        let next = (1..=count)
            .map(|step| (current + step) % count)
            .find(|&id| !self.players[id].is_bankrupt);
        if let Some(next) = next {
            self.turn = next;
        }
        self.dice = None;
        self.doubles = 0;
        self.phase = if self.players[self.turn].in_jail { Phase::JailDecision } else { Phase::WaitForRoll };
        self.log.push(Notice::TurnStarted { player_id: self.turn });
    }

    fn take_ownership(&mut self, player: PlayerId, square_id: usize) {
        if let Some(prop) = self.mutable_properties.get_mut(square_id) {
            prop.owner_id = Some(player);
        }
        self.players[player].properties.insert(square_id);
    }

    /// Hand a purchasable square to a player outside the turn flow, taking it
    /// from any previous owner. Houses and mortgage state travel with it.
    ///
    /// # Errors
    ///
    /// Returns `PlayerNotFound` or `SquareNotFound`.
    pub fn grant_property(&mut self, player: PlayerId, square_id: usize) -> Result<(), GameError> {
        if player >= self.players.len() {
            return Err(GameError::PlayerNotFound(player));
        }
        let previous = self.mutable_properties.get(square_id).ok_or(GameError::SquareNotFound(square_id))?.owner_id;
        if let Some(previous) = previous {
            self.players[previous].properties.remove(&square_id);
        }
        self.take_ownership(player, square_id);
        Ok(())
    }

    // =========================================================================
    // BUYING AND AUCTIONS
    // =========================================================================

    fn buy(&mut self, actor: PlayerId) -> Result<EventKind, GameError> {
        self.expect_turn(actor)?;
        self.expect_phase(Phase::DecideToBuy)?;
        let Some(square) = self.property_for_sale.clone() else {
            return Err(GameError::Rule("nothing is for sale".into()));
        };

        let price = square.price();
        let available = self.players[actor].money;
        if available < price {
            return Err(GameError::InsufficientFunds { needed: price, available });
        }

        self.players[actor].money -= price;
        self.take_ownership(actor, square.id);
        self.property_for_sale = None;
        self.log.push(Notice::PropertyBought { player_id: actor, square_id: square.id, price });
        self.settle_turn();
        Ok(EventKind::PropertyBought)
    }

    fn pass(&mut self, actor: PlayerId) -> Result<EventKind, GameError> {
        self.expect_turn(actor)?;
        self.expect_phase(Phase::DecideToBuy)?;
        let Some(square) = self.property_for_sale.take() else {
            return Err(GameError::Rule("nothing is for sale".into()));
        };

        let count = self.players.len();
        let bidders = (1..count)
            .map(|step| (actor + step) % count)
            .filter(|&id| !self.players[id].is_bankrupt)
            .collect();
        let square_id = square.id;

        if let Some(auction) = Auction::open(square, bidders) {
            self.auction = Some(auction);
            self.phase = Phase::AuctionProperty;
            self.log.push(Notice::AuctionStarted { square_id });
            Ok(EventKind::AuctionStarted)
        } else {
            self.log.push(Notice::AuctionUnsold { square_id });
            self.settle_turn();
            Ok(EventKind::AuctionFinished)
        }
    }

    fn bid(&mut self, actor: PlayerId, amount: i64) -> Result<EventKind, GameError> {
        self.expect_phase(Phase::AuctionProperty)?;
        let available = self.players[actor].money;
        let Some(auction) = self.auction.as_mut() else {
            return Err(GameError::WrongPhase(Phase::AuctionProperty));
        };
        let outcome = auction.bid(actor, amount, available)?;
        self.log.push(Notice::BidPlaced { player_id: actor, amount });
        Ok(self.conclude_auction(outcome))
    }

    fn fold(&mut self, actor: PlayerId) -> Result<EventKind, GameError> {
        self.expect_phase(Phase::AuctionProperty)?;
        let Some(auction) = self.auction.as_mut() else {
            return Err(GameError::WrongPhase(Phase::AuctionProperty));
        };
        let outcome = auction.fold(actor)?;
        self.log.push(Notice::Folded { player_id: actor });
        Ok(self.conclude_auction(outcome))
    }

    fn conclude_auction(&mut self, outcome: Option<AuctionOutcome>) -> EventKind {
        let Some(outcome) = outcome else {
            return EventKind::AuctionUpdate;
        };
        let Some(auction) = self.auction.take() else {
            return EventKind::AuctionUpdate;
        };
        let square_id = auction.property.id;

        match outcome {
            AuctionOutcome::Sold { winner, price } => {
                self.players[winner].money -= price;
                self.take_ownership(winner, square_id);
                self.log.push(Notice::AuctionWon { player_id: winner, square_id, price });
            }
            AuctionOutcome::Unsold => self.log.push(Notice::AuctionUnsold { square_id }),
        }
        self.settle_turn();
        EventKind::AuctionFinished
    }

    // =========================================================================
    // JAIL
    // =========================================================================

    fn jail(&mut self, actor: PlayerId, choice: JailChoice, roller: &mut dyn DiceRoller) -> Result<EventKind, GameError> {
        self.expect_turn(actor)?;
        self.expect_phase(Phase::JailDecision)?;
        if !self.players[actor].in_jail {
            return Err(GameError::Rule("you are not in jail".into()));
        }

        let fine = self.rules.jail_fine;
        match choice {
            JailChoice::Pay => {
                let available = self.players[actor].money;
                if available < fine {
                    return Err(GameError::InsufficientFunds { needed: fine, available });
                }
                self.players[actor].money -= fine;
                self.release_from_jail(actor);
                self.phase = Phase::WaitForRoll;
            }
            JailChoice::Card => {
                if self.players[actor].get_out_of_jail_free == 0 {
                    return Err(GameError::Rule("you have no get out of jail free card".into()));
                }
                self.players[actor].get_out_of_jail_free -= 1;
                self.return_held_card(actor);
                self.release_from_jail(actor);
                self.phase = Phase::WaitForRoll;
            }
            JailChoice::Roll => {
                let dice = roller.roll();
                self.dice = Some(dice);
                self.doubles = 0;
                self.log.push(Notice::DiceRolled { player_id: actor, dice });

                if dice.is_double() {
                    self.release_from_jail(actor);
                } else {
                    self.players[actor].jail_turns += 1;
                    if self.players[actor].jail_turns < MAX_JAIL_ROLLS {
                        self.phase = Phase::WaitForNextTurn;
                        return Ok(EventKind::GameUpdate);
                    }
                    self.charge(actor, None, fine);
                    self.release_from_jail(actor);
                }
                self.advance(actor, dice.sum());
                self.resolve_landing(actor, dice);
            }
        }
        Ok(EventKind::GameUpdate)
    }

    fn end_turn(&mut self, actor: PlayerId) -> Result<EventKind, GameError> {
        self.expect_turn(actor)?;
        self.expect_phase(Phase::WaitForNextTurn)?;
        self.advance_turn();
        Ok(EventKind::EndTurn)
    }

    // =========================================================================
    // PROPERTY MANAGEMENT
    // =========================================================================

    /// Shared checks for build/sell/mortgage/unmortgage. Returns the square.
    fn manageable(&self, actor: PlayerId, square_id: usize) -> Result<Square, GameError> {
        if matches!(self.phase, Phase::AuctionProperty | Phase::GameOver) {
            return Err(GameError::WrongPhase(self.phase));
        }
        let square = self.board.square(square_id).cloned().ok_or(GameError::SquareNotFound(square_id))?;
        if self.mutable_properties.owner(square_id) != Some(actor) {
            return Err(GameError::Rule(format!("you do not own {}", square.name)));
        }
        Ok(square)
    }

    /// After a sale or mortgage, see whether the debtor can now settle.
    fn after_liquidation(&mut self, actor: PlayerId) {
        if self.phase == Phase::RaiseFunds && self.debts.first().is_some_and(|d| d.debtor == actor) {
            self.settle_turn();
        }
    }

    fn build_house(&mut self, actor: PlayerId, square_id: usize) -> Result<EventKind, GameError> {
        let square = self.manageable(actor, square_id)?;
        let Some(details) = square.details.as_ref().filter(|_| square.kind == SquareKind::Property) else {
            return Err(GameError::Rule(format!("cannot build on {}", square.name)));
        };
        let group = details.color;

        if !self.mutable_properties.owns_group(&self.board, actor, group) {
            return Err(GameError::Rule("you must own every property in the color group".into()));
        }
        if self.mutable_properties.group_has_mortgage(&self.board, group) {
            return Err(GameError::Rule("cannot build while a property in the group is mortgaged".into()));
        }
        let current = self.mutable_properties.get(square_id).map_or(0, |p| p.houses);
        if current >= MAX_HOUSES {
            return Err(GameError::Rule(format!("{} already has a hotel", square.name)));
        }
        let fewest = self.mutable_properties.group_houses(&self.board, group).into_iter().min().unwrap_or(0);
        if current > fewest {
            return Err(GameError::Rule("houses must be built evenly across the group".into()));
        }
        let available = self.players[actor].money;
        if available < details.house_cost {
            return Err(GameError::InsufficientFunds { needed: details.house_cost, available });
        }

        self.players[actor].money -= details.house_cost;
        let houses = current + 1;
        if let Some(prop) = self.mutable_properties.get_mut(square_id) {
            prop.houses = houses;
        }
        self.log.push(Notice::HouseBuilt { player_id: actor, square_id, houses });
        Ok(EventKind::HouseBuilt)
    }

    fn sell_house(&mut self, actor: PlayerId, square_id: usize) -> Result<EventKind, GameError> {
        let square = self.manageable(actor, square_id)?;
        let Some(details) = square.details.as_ref().filter(|_| square.kind == SquareKind::Property) else {
            return Err(GameError::Rule(format!("{} has no houses", square.name)));
        };
        let current = self.mutable_properties.get(square_id).map_or(0, |p| p.houses);
        if current == 0 {
            return Err(GameError::Rule(format!("{} has no houses", square.name)));
        }
        let most = self.mutable_properties.group_houses(&self.board, details.color).into_iter().max().unwrap_or(0);
        if current < most {
            return Err(GameError::Rule("houses must be sold evenly across the group".into()));
        }

        let houses = current - 1;
        if let Some(prop) = self.mutable_properties.get_mut(square_id) {
            prop.houses = houses;
        }
        self.players[actor].money += details.house_cost / 2;
        self.log.push(Notice::HouseSold { player_id: actor, square_id, houses });
        self.after_liquidation(actor);
        Ok(EventKind::HouseSold)
    }

    fn mortgage(&mut self, actor: PlayerId, square_id: usize) -> Result<EventKind, GameError> {
        let square = self.manageable(actor, square_id)?;
        if self.mutable_properties.get(square_id).is_some_and(|p| p.is_mortgaged) {
            return Err(GameError::Rule(format!("{} is already mortgaged", square.name)));
        }
        if let Some(group) = square.group() {
            if self.mutable_properties.group_houses(&self.board, group).iter().any(|&h| h > 0) {
                return Err(GameError::Rule("sell every house in the group first".into()));
            }
        }

        let amount = square.price() / 2;
        if let Some(prop) = self.mutable_properties.get_mut(square_id) {
            prop.is_mortgaged = true;
        }
        self.players[actor].money += amount;
        self.log.push(Notice::Mortgaged { player_id: actor, square_id, amount });
        self.after_liquidation(actor);
        Ok(EventKind::PropertyMortgaged)
    }

    fn unmortgage(&mut self, actor: PlayerId, square_id: usize) -> Result<EventKind, GameError> {
        let square = self.manageable(actor, square_id)?;
        if !self.mutable_properties.get(square_id).is_some_and(|p| p.is_mortgaged) {
            return Err(GameError::Rule(format!("{} is not mortgaged", square.name)));
        }

        // Half the price plus 10%, rounded down.
        let amount = square.price() / 2 * 11 / 10;
        let available = self.players[actor].money;
        if available < amount {
            return Err(GameError::InsufficientFunds { needed: amount, available });
        }

        self.players[actor].money -= amount;
        if let Some(prop) = self.mutable_properties.get_mut(square_id) {
            prop.is_mortgaged = false;
        }
        self.log.push(Notice::Unmortgaged { player_id: actor, square_id, amount });
        Ok(EventKind::PropertyUnmortgaged)
    }

    fn declare_bankruptcy(&mut self, actor: PlayerId) -> Result<EventKind, GameError> {
        self.expect_phase(Phase::RaiseFunds)?;
        if !self.debts.first().is_some_and(|d| d.debtor == actor) {
            return Err(GameError::Rule("you have no outstanding debt".into()));
        }
        self.bankrupt(actor);
        Ok(EventKind::PlayerBankrupt)
    }

    fn reset(&mut self) -> EventKind {
        let seats = self.seats();
        *self = Self::with_board(self.id, &seats, self.rules, self.board.clone());
        EventKind::ResetGame
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
