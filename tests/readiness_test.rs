// Flow deck readiness gate

use crazyflie_pilot::readiness::{self, ReadinessFlag};
use crazyflie_pilot::Error;
use std::time::Duration;

const DECK: &str = "deck.bcFlow2";
const TIMEOUT: Duration = Duration::from_secs(5);

fn set_after(flag: &ReadinessFlag, delay: Duration) {
    let flag = flag.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        readiness::on_deck_value(DECK, 1.0, &flag);
    });
}

#[tokio::test(start_paused = true)]
async fn deck_reported_in_time_proceeds() {
    let flag = ReadinessFlag::new();
    set_after(&flag, Duration::from_millis(4900));

    let start = tokio::time::Instant::now();
    readiness::wait_for_deck(&flag, DECK, TIMEOUT).await.unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(4900) && elapsed < TIMEOUT, "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn deck_reported_late_aborts() {
    let flag = ReadinessFlag::new();
    set_after(&flag, Duration::from_millis(5100));

    let error = readiness::wait_for_deck(&flag, DECK, TIMEOUT).await.unwrap_err();

    match &error {
        Error::DeckNotDetected { deck, timeout } => {
            assert_eq!(deck, DECK);
            assert_eq!(*timeout, TIMEOUT);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(error.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn deck_never_reported_aborts() {
    let flag = ReadinessFlag::new();

    let start = tokio::time::Instant::now();
    let error = readiness::wait_for_deck(&flag, DECK, TIMEOUT).await.unwrap_err();

    assert!(matches!(error, Error::DeckNotDetected { .. }));
    assert!(start.elapsed() >= TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn detached_deck_does_not_open_the_gate() {
    let flag = ReadinessFlag::new();
    readiness::on_deck_value(DECK, 0.0, &flag);

    assert!(!flag.is_set());
    assert!(!flag.wait(TIMEOUT).await);
}

#[tokio::test]
async fn flag_set_before_waiting_proceeds_immediately() {
    let flag = ReadinessFlag::new();
    readiness::on_deck_value(DECK, 1.0, &flag);

    assert!(flag.is_set());
    assert!(flag.wait(Duration::ZERO).await);
}

#[test]
fn flag_is_set_only_once() {
    let flag = ReadinessFlag::new();
    let other = flag.clone();

    assert!(flag.set());
    assert!(!other.set());
    assert!(other.is_set());
}
