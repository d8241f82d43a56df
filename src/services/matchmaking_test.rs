use super::*;
use crate::state::test_helpers;
use tokio::time::{Duration, timeout};

fn entry(user_id: AccountId) -> (QueueEntry, mpsc::Receiver<ServerMessage>) {
    let (tx, rx) = mpsc::channel(8);
    (QueueEntry { user_id, name: format!("user{user_id}"), conn_id: Uuid::new_v4(), tx }, rx)
}

async fn recv(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("message receive timed out")
        .expect("channel closed")
}

#[test]
fn enqueue_waits_until_pool_is_full() {
    let mut matchmaker = Matchmaker::new(2);
    let (a, _rx_a) = entry(1);
    let (b, _rx_b) = entry(2);

    assert!(matches!(matchmaker.enqueue(a, None), Ok(Enqueued::Waiting { size: 2, queued: 1 })));
    let Ok(Enqueued::Matched(matched)) = matchmaker.enqueue(b, None) else {
        panic!("second join should match");
    };
    assert_eq!(matched.iter().map(|e| e.user_id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(matchmaker.queued_len(), 0);
}

#[test]
fn pools_are_separate_per_size() {
    let mut matchmaker = Matchmaker::new(2);
    let (a, _rx_a) = entry(1);
    let (b, _rx_b) = entry(2);

    assert!(matches!(matchmaker.enqueue(a, Some(3)), Ok(Enqueued::Waiting { size: 3, queued: 1 })));
    assert!(matches!(matchmaker.enqueue(b, Some(2)), Ok(Enqueued::Waiting { size: 2, queued: 1 })));
    assert_eq!(matchmaker.queued_len(), 2);
}

#[test]
fn enqueue_rejects_duplicates_and_bad_sizes() {
    let mut matchmaker = Matchmaker::new(3);
    let (a, _rx_a) = entry(1);
    let (a_again, _rx_again) = entry(1);
    let (b, _rx_b) = entry(2);

    matchmaker.enqueue(a, None).expect("first join");
    assert!(matches!(matchmaker.enqueue(a_again, Some(2)), Err(MatchError::AlreadyQueued(1))));
    assert!(matches!(matchmaker.enqueue(b, Some(5)), Err(MatchError::InvalidSize(5))));
}

#[test]
fn remove_connection_ignores_other_sockets() {
    let mut matchmaker = Matchmaker::new(3);
    let (a, _rx_a) = entry(1);
    let conn_id = a.conn_id;
    matchmaker.enqueue(a, None).expect("join");

    assert!(!matchmaker.remove_connection(1, Uuid::new_v4()));
    assert!(matchmaker.is_queued(1));
    assert!(matchmaker.remove_connection(1, conn_id));
    assert!(!matchmaker.is_queued(1));
    assert!(!matchmaker.remove(1));
}

fn ids(entries: &[QueueEntry]) -> Vec<AccountId> {
    entries.iter().map(|e| e.user_id).collect()
}

#[test]
fn party_fills_a_game_together_with_a_solo_player() {
    let mut matchmaker = Matchmaker::new(3);
    let (a, _rx_a) = entry(1);
    let (b, _rx_b) = entry(2);
    let (c, _rx_c) = entry(3);

    assert!(matches!(matchmaker.enqueue_group(vec![a, b], None), Ok(Enqueued::Waiting { size: 3, queued: 2 })));
    let Ok(Enqueued::Matched(matched)) = matchmaker.enqueue(c, None) else {
        panic!("solo player should complete the party's game");
    };
    assert_eq!(ids(&matched), vec![1, 2, 3]);
    assert_eq!(matchmaker.queued_len(), 0);
}

#[test]
fn first_fit_skips_groups_that_would_overflow() {
    let mut matchmaker = Matchmaker::new(4);
    let (a, _rx_a) = entry(1);
    let (b, _rx_b) = entry(2);
    let (c, _rx_c) = entry(3);
    let (d, _rx_d) = entry(4);
    let (e, _rx_e) = entry(5);
    let (f, _rx_f) = entry(6);

    matchmaker.enqueue_group(vec![a, b, c], None).expect("trio");
    matchmaker.enqueue_group(vec![d, e], None).expect("pair");
    let Ok(Enqueued::Matched(matched)) = matchmaker.enqueue(f, None) else {
        panic!("trio plus solo should fill the game");
    };
    assert_eq!(ids(&matched), vec![1, 2, 3, 6]);
    assert!(matchmaker.is_queued(4));
    assert!(matchmaker.is_queued(5));
    assert_eq!(matchmaker.queued_len(), 2);
}

#[test]
fn oversized_party_and_queued_member_are_rejected() {
    let mut matchmaker = Matchmaker::new(2);
    let (a, _rx_a) = entry(1);
    let (b, _rx_b) = entry(2);
    let (c, _rx_c) = entry(3);
    let (b_again, _rx_again) = entry(2);
    let (d, _rx_d) = entry(4);

    assert!(matches!(
        matchmaker.enqueue_group(vec![a, b, c], None),
        Err(MatchError::PartyTooLarge { party: 3, size: 2 })
    ));
    let (b_solo, _rx_solo) = entry(2);
    matchmaker.enqueue(b_solo, Some(3)).expect("solo");
    assert!(matches!(matchmaker.enqueue_group(vec![d, b_again], Some(4)), Err(MatchError::AlreadyQueued(2))));
    assert!(!matchmaker.is_queued(4));
}

#[test]
fn leaving_removes_the_whole_party() {
    let mut matchmaker = Matchmaker::new(4);
    let (a, _rx_a) = entry(1);
    let (b, _rx_b) = entry(2);
    let conn_b = b.conn_id;
    matchmaker.enqueue_group(vec![a, b], None).expect("pair");

    assert!(matchmaker.remove_connection(2, conn_b));
    assert!(!matchmaker.is_queued(1));
    assert_eq!(matchmaker.queued_len(), 0);
}

#[test]
fn party_members_come_from_the_lobby() {
    let mut matchmaker = Matchmaker::new(4);
    let (b, _rx_b) = entry(2);
    let conn_b = b.conn_id;
    matchmaker.register(b);

    let members = matchmaker.party_members(1, &[1, 2, 2]).expect("online friend");
    assert_eq!(ids(&members), vec![2]);
    assert!(matches!(matchmaker.party_members(1, &[2, 3]), Err(MatchError::PartyMemberOffline(3))));

    assert!(!matchmaker.unregister(2, Uuid::new_v4()));
    assert!(matchmaker.party_members(1, &[2]).is_ok(), "stale close must not drop the newer socket");
    matchmaker.unregister(2, conn_b);
    assert!(matches!(matchmaker.party_members(1, &[2]), Err(MatchError::PartyMemberOffline(2))));
}

#[tokio::test]
async fn party_join_with_offline_member_is_rejected_before_queueing() {
    let state = test_helpers::test_app_state();
    let (x, _rx) = entry(10);

    assert_eq!(join(&state, x, Some(3), &[11]).await, Err(MatchError::PartyMemberOffline(11)));
    assert_eq!(state.matchmaker.lock().await.queued_len(), 0);
}

#[tokio::test]
async fn two_joins_create_game_and_notify_both() {
    let state = test_helpers::test_app_state();
    let (x, mut rx_x) = entry(10);
    let (y, mut rx_y) = entry(20);

    assert_eq!(join(&state, x, None, &[]).await, Ok(JoinStatus::Waiting { size: 2, queued: 1 }));
    let Ok(JoinStatus::Matched { game_id }) = join(&state, y, None, &[]).await else {
        panic!("second join should match");
    };

    for rx in [&mut rx_x, &mut rx_y] {
        let ServerMessage::MatchFound { game_id: found, players, .. } = recv(rx).await else {
            panic!("expected match_found");
        };
        assert_eq!(found, game_id);
        assert_eq!(players.len(), 2);
        assert_eq!((players[0].0, players[0].1.id), (10, 0));
        assert_eq!((players[1].0, players[1].1.id), (20, 1));
        assert_eq!(players[0].1.money, 1500);
    }

    let game = services::game::snapshot(&state, game_id).await.expect("game created");
    assert_eq!(game.seat_of(20), Some(1));
    assert_eq!(state.matchmaker.lock().await.queued_len(), 0);
}

#[tokio::test]
async fn leave_reports_whether_player_was_queued() {
    let state = test_helpers::test_app_state();
    let (x, _rx) = entry(10);
    join(&state, x, Some(4), &[]).await.expect("join");

    assert!(leave(&state, 10).await);
    assert!(!leave(&state, 10).await);
}

#[tokio::test]
async fn closed_socket_leaves_queue() {
    let state = test_helpers::test_app_state();
    let (x, _rx) = entry(10);
    let conn_id = x.conn_id;
    join(&state, x, None, &[]).await.expect("join");

    leave_connection(&state, 10, conn_id).await;
    assert!(!state.matchmaker.lock().await.is_queued(10));
}
