//! Teleport request protocol driven through the service with a manual clock.
mod common;

use common::{loc, Harness};
use hearth::clock::Clock;
use hearth::config::{Config, TpaConfig};
use hearth::messages::MessageKey;
use hearth::tpa::RequestDirection;
use hearth::{ErrorKind, HomesError};
use tokio_test::{assert_err, assert_ok};

fn no_cooldown() -> Config {
    Config {
        tpa: TpaConfig {
            cooldown_seconds: 0,
            ..TpaConfig::default()
        },
        ..Config::default()
    }
}

#[tokio::test]
async fn repeated_request_replaces_instead_of_duplicating() {
    let mut h = Harness::new(no_cooldown());
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;

    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
    h.clock.advance_secs(5);
    assert_ok!(h.service.send_request(a, "bob", RequestDirection::BringHere));

    let pending = h.service.ledger().pending_for(b);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].direction, RequestDirection::BringHere);
    assert_eq!(h.notes.count(b, MessageKey::TpaReceived), 1);
    assert_eq!(h.notes.count(b, MessageKey::TpaHereReceived), 1);
}

#[tokio::test]
async fn replaced_request_expires_on_its_own_schedule() {
    let mut h = Harness::new(no_cooldown());
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;

    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
    h.clock.advance_secs(5);
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::BringHere));

    // Past the first request's deadline, short of the replacement's.
    h.run_for(59);
    assert_eq!(h.service.ledger().pending_count(), 1);
    assert_eq!(h.notes.count(a, MessageKey::TpaExpiredSender), 0);
    assert_eq!(h.notes.count(b, MessageKey::TpaExpiredReceiver), 0);

    h.run_for(1);
    assert_eq!(h.service.ledger().pending_count(), 0);
    assert_eq!(h.notes.count(a, MessageKey::TpaExpiredSender), 1);
    assert_eq!(h.notes.count(b, MessageKey::TpaExpiredReceiver), 1);

    h.run_for(30);
    assert_eq!(h.notes.count(a, MessageKey::TpaExpiredSender), 1);
    assert_eq!(h.notes.count(b, MessageKey::TpaExpiredReceiver), 1);
}

#[tokio::test]
async fn unanswered_request_expires_once_after_sixty_seconds() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));

    h.run_for(59);
    assert_eq!(h.service.ledger().pending_count(), 1);
    assert_eq!(h.notes.count(a, MessageKey::TpaExpiredSender), 0);

    h.run_for(1);
    assert_eq!(h.service.ledger().pending_count(), 0);
    assert_eq!(h.notes.count(a, MessageKey::TpaExpiredSender), 1);
    assert_eq!(h.notes.count(b, MessageKey::TpaExpiredReceiver), 1);

    h.run_for(10);
    assert_eq!(h.notes.count(a, MessageKey::TpaExpiredSender), 1);
    assert_eq!(h.notes.count(b, MessageKey::TpaExpiredReceiver), 1);
}

#[tokio::test]
async fn expiry_skips_offline_parties() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));

    h.world.leave(a);
    h.run_for(60);
    assert_eq!(h.service.ledger().pending_count(), 0);
    assert_eq!(h.notes.count(a, MessageKey::TpaExpiredSender), 0);
    assert_eq!(h.notes.count(b, MessageKey::TpaExpiredReceiver), 1);
}

#[tokio::test]
async fn second_send_inside_cooldown_keeps_first_request() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    let sent_at = h.clock.now();

    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
    h.clock.advance_secs(10);
    let err = assert_err!(h.service.send_request(a, "Bob", RequestDirection::BringHere));
    assert!(matches!(err, HomesError::Cooldown { seconds: 50 }));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(h.notes.count(a, MessageKey::TpaCooldown), 1);

    let pending = h.service.ledger().pending_for(b);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].direction, RequestDirection::ComeTo);
    assert_eq!(pending[0].created_at, sent_at);
}

#[tokio::test]
async fn accepted_come_to_follows_the_receiver() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));

    h.world.walk(b, loc(200.0, 70.0, -5.0));
    assert_eq!(assert_ok!(h.service.accept_request(b)), a);
    assert!(h.service.executor().is_pending(a));
    assert_eq!(h.service.ledger().pending_count(), 0);

    h.world.walk(b, loc(210.0, 70.0, -5.0));
    h.run_for(5);
    assert_eq!(h.world.at(a), Some(loc(210.0, 70.0, -5.0)));
    assert_eq!(h.world.at(b), Some(loc(210.0, 70.0, -5.0)));
    assert_eq!(h.notes.count(a, MessageKey::TpaAccepted), 1);
    assert_eq!(h.notes.count(b, MessageKey::TpaAcceptedTarget), 1);
    assert_eq!(h.notes.count(a, MessageKey::TeleportSuccess), 1);
}

#[tokio::test]
async fn accepted_bring_here_moves_the_receiver() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::BringHere));

    assert_ok!(h.service.accept_request_from(b, "alice"));
    assert!(h.service.executor().is_pending(b));
    h.run_for(5);
    assert_eq!(h.world.at(b), Some(loc(0.0, 64.0, 0.0)));
    assert_eq!(
        h.service.last_locations().peek(b),
        Some(&loc(50.0, 64.0, 50.0))
    );
}

#[tokio::test]
async fn accept_after_sender_left_reports_unavailable() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));

    h.world.leave(a);
    assert_eq!(h.service.ledger().pending_count(), 1);
    let err = assert_err!(h.service.accept_request(b));
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(h.service.ledger().pending_count(), 0);
    assert_eq!(h.notes.last(b).map(|(k, _)| k), Some(MessageKey::PlayerNotFound));
}

#[tokio::test]
async fn accept_while_sender_counts_down_tells_both_sides() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    assert_ok!(h.service.create_home(a, "base"));
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
    assert_ok!(h.service.teleport_home(a, "base"));

    let err = assert_err!(h.service.accept_request(b));
    assert!(matches!(err, HomesError::TravelerBusy { ref player } if player == "Alice"));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let (key, params) = h.notes.last(a).expect("sender notified");
    assert_eq!(key, MessageKey::TeleportAlreadyInProgress);
    assert_eq!(params.get("player"), Some("Bob"));
    let (key, params) = h.notes.last(b).expect("receiver notified");
    assert_eq!(key, MessageKey::TpaTravelerBusy);
    assert_eq!(params.get("player"), Some("Alice"));
    assert_eq!(h.notes.count(a, MessageKey::TpaAccepted), 0);
    assert_eq!(h.service.ledger().pending_count(), 0);

    // The home countdown that was already running is untouched.
    assert!(h.service.executor().is_pending(a));
}

#[tokio::test]
async fn deny_without_sender_takes_most_recent() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    let c = h.join("Cara", loc(9.0, 64.0, 9.0)).await;

    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
    h.clock.advance_secs(2);
    assert_ok!(h.service.send_request(c, "Bob", RequestDirection::ComeTo));

    assert_eq!(assert_ok!(h.service.deny_request(b)), c);
    assert_eq!(h.notes.count(c, MessageKey::TpaDeniedSender), 1);
    assert_eq!(h.notes.count(a, MessageKey::TpaDeniedSender), 0);
    assert_eq!(h.service.ledger().pending_for(b)[0].sender, a);

    assert_ok!(h.service.deny_request_from(b, "Alice"));
    let err = assert_err!(h.service.deny_request(b));
    assert!(matches!(err, HomesError::NoPendingRequest));
}

#[tokio::test]
async fn sender_can_cancel_only_their_own_request() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    let c = h.join("Cara", loc(9.0, 64.0, 9.0)).await;
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));

    let err = assert_err!(h.service.cancel_request(c, "Bob"));
    assert!(matches!(err, HomesError::NoRequestToTarget { .. }));
    assert_eq!(h.service.ledger().pending_count(), 1);

    assert_ok!(h.service.cancel_request(a, "Bob"));
    assert_eq!(h.service.ledger().pending_count(), 0);
    assert!(h.service.ledger().pending_request(b, a).is_none());
}

#[tokio::test]
async fn opt_out_and_ignore_are_independent_of_pending_requests() {
    let mut h = Harness::new(no_cooldown());
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));

    assert_eq!(assert_ok!(h.service.toggle_requests(b)), false);
    assert_eq!(h.service.ledger().pending_count(), 1);
    let err = assert_err!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
    assert!(matches!(err, HomesError::RequestsDisabled { .. }));
    assert_eq!(assert_ok!(h.service.toggle_requests(b)), true);

    assert!(assert_ok!(h.service.toggle_ignore(b, "Alice")));
    assert!(h.service.ledger().is_ignored(b, a));
    let err = assert_err!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
    assert!(matches!(err, HomesError::Ignored { .. }));
    assert_eq!(h.notes.count(a, MessageKey::TpaIgnored), 1);

    assert!(!assert_ok!(h.service.toggle_ignore(b, "Alice")));
    assert_ok!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
}

#[tokio::test]
async fn self_and_offline_targets_are_rejected() {
    let mut h = Harness::with_defaults();
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;

    let err = assert_err!(h.service.send_request(a, "alice", RequestDirection::ComeTo));
    assert!(matches!(err, HomesError::SelfRequest));
    let err = assert_err!(h.service.send_request(a, "Nobody", RequestDirection::ComeTo));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.service.ledger().pending_count(), 0);
}

#[tokio::test]
async fn disabled_requests_reject_every_operation() {
    let mut h = Harness::new(Config {
        tpa: TpaConfig {
            enabled: false,
            ..TpaConfig::default()
        },
        ..Config::default()
    });
    let a = h.join("Alice", loc(0.0, 64.0, 0.0)).await;
    let b = h.join("Bob", loc(50.0, 64.0, 50.0)).await;

    assert_err!(h.service.send_request(a, "Bob", RequestDirection::ComeTo));
    assert_err!(h.service.accept_request(b));
    assert_err!(h.service.deny_request(b));
    assert_err!(h.service.toggle_requests(b));
    assert_eq!(h.notes.count(a, MessageKey::TpaFeatureDisabled), 1);
    assert_eq!(h.notes.count(b, MessageKey::TpaFeatureDisabled), 3);
}
