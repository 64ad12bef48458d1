mod common;

use futures_util::future::join_all;
use std::collections::HashSet;

use cinegate_core::{BookingStatus, CoreError, PaymentOutcome, SeatStatus, TicketStatus};
use common::Harness;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_identical_reservations_have_one_winner() {
    let h = Harness::new().await;

    let tasks = (0..8).map(|i| {
        let h = h.clone();
        tokio::spawn(async move {
            h.reservations
                .reserve(h.request(&format!("user-{i}"), &["A-01", "A-02"]))
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for loser in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(loser, CoreError::SeatsUnavailable { .. }));
    }

    for label in ["A-01", "A-02"] {
        let seat = h.store.seat(h.showtime_id, h.seat(label)).await.unwrap();
        assert_eq!(seat.booking_id, Some(winners[0].id));
    }
    assert_eq!(h.reservations.list_bookings(None).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_reservations_leave_no_stray_locks() {
    let h = Harness::new().await;

    let left = {
        let h = h.clone();
        tokio::spawn(async move { h.reservations.reserve(h.request("left", &["A-01", "A-02"])).await })
    };
    let right = {
        let h = h.clone();
        tokio::spawn(async move { h.reservations.reserve(h.request("right", &["A-02", "A-03"])).await })
    };
    let (left, right) = (left.await.unwrap(), right.await.unwrap());

    assert!(left.is_ok() ^ right.is_ok());
    let (winner, loser_only_seat) = match (&left, &right) {
        (Ok(b), Err(_)) => (b, "A-03"),
        (Err(_), Ok(b)) => (b, "A-01"),
        _ => unreachable!(),
    };

    let shared = h.store.seat(h.showtime_id, h.seat("A-02")).await.unwrap();
    assert_eq!(shared.booking_id, Some(winner.id));

    let untouched = h.store.seat(h.showtime_id, h.seat(loser_only_seat)).await.unwrap();
    assert_eq!(untouched.status, SeatStatus::Available);
    assert_eq!(untouched.booking_id, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_callbacks_apply_once() {
    let h = Harness::new().await;
    let booking = h.reservations.reserve(h.request("user-1", &["A-01", "B-01"])).await.unwrap();

    let tasks = (0..6).map(|_| {
        let h = h.clone();
        let id = booking.id;
        tokio::spawn(async move { h.settlement.settle(id, PaymentOutcome::Success).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|s| s.was_applied()).count(), 1);
    assert!(results.iter().all(|s| s.status() == BookingStatus::Confirmed));
    assert_eq!(h.notifier.confirmed().len(), 1);

    let confirmed = h.reservations.get_booking(booking.id).await.unwrap();
    let codes: HashSet<_> = confirmed.tickets.iter().map(|t| t.redemption_code.clone()).collect();
    assert_eq!(codes.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_success_and_failure_settle_once() {
    let h = Harness::new().await;
    let booking = h.reservations.reserve(h.request("user-1", &["A-03"])).await.unwrap();

    let outcomes = [PaymentOutcome::Success, PaymentOutcome::Failed];
    let tasks = outcomes.into_iter().map(|outcome| {
        let h = h.clone();
        let id = booking.id;
        tokio::spawn(async move { h.settlement.settle(id, outcome).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|s| s.was_applied()).count(), 1);
    let settled = h.reservations.get_booking(booking.id).await.unwrap();
    let seat = h.store.seat(h.showtime_id, h.seat("A-03")).await.unwrap();
    match settled.status {
        BookingStatus::Confirmed => assert_eq!(seat.status, SeatStatus::Sold),
        BookingStatus::Failed => assert_eq!(seat.status, SeatStatus::Available),
        other => panic!("unexpected status {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scans_redeem_once() {
    let h = Harness::new().await;
    let booking = h.reservations.reserve(h.request("user-1", &["A-01"])).await.unwrap();
    h.settlement.settle(booking.id, PaymentOutcome::Success).await.unwrap();
    let code = h.reservations.get_booking(booking.id).await.unwrap().tickets[0]
        .redemption_code
        .clone()
        .unwrap();

    let tasks = (0..5).map(|_| {
        let h = h.clone();
        let code = code.clone();
        tokio::spawn(async move { h.redemption.redeem(&code).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, CoreError::TicketNotActive { status: TicketStatus::Used }));
    }
}
