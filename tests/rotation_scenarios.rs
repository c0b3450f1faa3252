//! Session ticket key rotation scenarios.
//!
//! Timer-driven tests run on a paused tokio clock, so a one-hour interval
//! elapses instantly once every task is idle.


use std::sync::Arc;
use std::time::Duration;

use rustls::server::ProducesTickets;
use test_helpers::{key, scripted_random, RecordingSink};
use tls_rotor::security::OsRandom;
use tls_rotor::ticket::{KeyRotator, RotationError};
use tls_rotor::{new_tls_config, with_random_source, with_session_ticket_key_rotation, TaskGroup};
use tokio_test::assert_pending;
use tokio_util::sync::CancellationToken;

const HOUR: Duration = Duration::from_secs(60 * 60);

// ===========================================================================
// Ring semantics
// ===========================================================================

#[test]
fn scenario_a_four_rotations_keep_three_newest() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink.clone(), scripted_random(&[1, 2, 3, 4]), 3, HOUR);

    for _ in 0..4 {
        rotator.rotate().expect("rotation");
    }

    assert_eq!(sink.last(), vec![key(4), key(3), key(2)]);
    assert_eq!(rotator.len(), 3);
    assert_eq!(
        sink.writes()
            .iter()
            .map(Vec::len)
            .collect::<Vec<_>>(),
        vec![1, 2, 3, 3]
    );
}

#[test]
fn scenario_b_failed_read_republishes_unchanged_ring() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink.clone(), scripted_random(&[1]), 3, HOUR);

    rotator.rotate().expect("first rotation");
    let err = rotator.rotate().expect_err("source exhausted");
    assert!(matches!(err, RotationError::Random(_)));

    assert_eq!(sink.writes(), vec![vec![key(1)], vec![key(1)]]);
}

#[test]
fn eviction_after_capacity_plus_one_rotations() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink.clone(), scripted_random(&[1, 2, 3]), 2, HOUR);

    for _ in 0..3 {
        rotator.rotate().expect("rotation");
    }

    let published = sink.last();
    assert_eq!(published, vec![key(3), key(2)]);
    assert!(!published.contains(&key(1)));
}

// ===========================================================================
// Seeding wrapper
// ===========================================================================

#[test]
fn scenario_c_failed_seed_disables_tickets() {
    let mut group = TaskGroup::new();
    let settings = new_tls_config(vec![
        with_random_source(scripted_random(&[])),
        with_session_ticket_key_rotation(&mut group, 3, HOUR),
    ])
    .expect("configuration still succeeds");

    assert!(settings.session_tickets_disabled());
    assert!(group.is_empty());

    let config = settings.into_server_config().expect("server config");
    assert!(!config.ticketer.enabled());
    assert_eq!(config.send_tls13_tickets, 0);
}

#[test]
fn successful_seed_registers_rotator() {
    let mut group = TaskGroup::new();
    let settings = new_tls_config(vec![
        with_random_source(scripted_random(&[7])),
        with_session_ticket_key_rotation(&mut group, 3, HOUR),
    ])
    .expect("configuration");

    assert!(!settings.session_tickets_disabled());
    assert_eq!(group.len(), 1);
    assert_eq!(settings.ticketer().key_count(), 1);
    assert_eq!(settings.ticketer().lifetime(), 3 * 60 * 60);
}

// ===========================================================================
// Run loop
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn scenario_d_stop_while_waiting_on_timer() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink.clone(), Arc::new(OsRandom), 3, HOUR);
    rotator.rotate().expect("seed");
    let stop = rotator.stop_handle();

    let task = tokio::spawn(async move { rotator.run().await });
    tokio::task::yield_now().await;

    tokio::time::timeout(Duration::from_secs(1), stop.request_stop())
        .await
        .expect("stop is acknowledged promptly");
    task.await.expect("run loop exits");

    let writes = sink.write_count();
    tokio::time::sleep(HOUR * 5).await;
    assert_eq!(sink.write_count(), writes, "no writes after stop");
}

#[tokio::test(start_paused = true)]
async fn rotates_once_per_interval_starting_after_one_interval() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink.clone(), scripted_random(&[1, 2, 3]), 2, HOUR);
    let stop = rotator.stop_handle();
    let task = tokio::spawn(async move { rotator.run().await });

    tokio::time::sleep(HOUR - Duration::from_secs(1)).await;
    assert_eq!(sink.write_count(), 0, "first tick is one interval after start");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.last(), vec![key(1)]);

    tokio::time::sleep(HOUR).await;
    assert_eq!(sink.last(), vec![key(2), key(1)]);

    stop.request_stop().await;
    task.await.expect("run loop exits");
}

#[tokio::test(start_paused = true)]
async fn tick_failures_keep_loop_running() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink.clone(), scripted_random(&[1]), 2, HOUR);
    let stop = rotator.stop_handle();
    let task = tokio::spawn(async move { rotator.run().await });

    tokio::time::sleep(HOUR * 3 + Duration::from_secs(1)).await;
    assert_eq!(sink.writes(), vec![vec![key(1)]; 3]);

    stop.request_stop().await;
    task.await.expect("run loop exits");
}

#[tokio::test]
async fn stop_waits_for_acknowledgement() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink, Arc::new(OsRandom), 1, HOUR);
    let stop = rotator.stop_handle();

    let mut pending = tokio_test::task::spawn(stop.request_stop());
    assert_pending!(pending.poll());

    let task = tokio::spawn(async move { rotator.run().await });
    while pending.poll().is_pending() {
        tokio::task::yield_now().await;
    }
    task.await.expect("run loop exits");
}

#[tokio::test]
async fn stop_after_exit_returns_immediately() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink, Arc::new(OsRandom), 1, HOUR);
    let stop = rotator.stop_handle();

    let task = tokio::spawn(async move {
        rotator.run().await;
        drop(rotator);
    });
    stop.request_stop().await;
    task.await.expect("run loop exits");

    tokio::time::timeout(Duration::from_secs(1), stop.request_stop())
        .await
        .expect("closed channel does not hang");
}

#[tokio::test(start_paused = true)]
async fn random_source_set_after_rotation_option_is_used_for_ticks() {
    let mut group = TaskGroup::new();
    let settings = new_tls_config(vec![
        with_session_ticket_key_rotation(&mut group, 3, HOUR),
        with_random_source(scripted_random(&[])),
    ])
    .expect("configuration");

    // The seed key came from the operating system source.
    assert!(!settings.session_tickets_disabled());
    let ticketer = settings.ticketer();
    assert_eq!(ticketer.key_count(), 1);

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(group.run(shutdown.clone()));

    tokio::time::sleep(HOUR * 2 + Duration::from_secs(1)).await;
    assert_eq!(ticketer.key_count(), 1, "ticks draw from the exhausted override");

    shutdown.cancel();
    running
        .await
        .expect("group task")
        .expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn tick_ready_together_with_stop_does_not_rotate() {
    let sink = Arc::new(RecordingSink::default());
    let mut rotator = KeyRotator::new(sink.clone(), Arc::new(OsRandom), 3, HOUR);
    rotator.rotate().expect("seed");
    let stop = rotator.stop_handle();

    let task = tokio::spawn(async move { rotator.run().await });
    tokio::task::yield_now().await;

    // Queue the stop request, then move the clock past the first tick before
    // the loop gets to run, so both branches are ready together.
    let mut stopping = tokio_test::task::spawn(stop.request_stop());
    assert_pending!(stopping.poll());
    tokio::time::advance(HOUR + Duration::from_secs(1)).await;
    while stopping.poll().is_pending() {
        tokio::task::yield_now().await;
    }
    task.await.expect("run loop exits");

    assert_eq!(sink.write_count(), 1, "only the seed; stop wins over a ready tick");
    tokio::time::sleep(HOUR * 3).await;
    assert_eq!(sink.write_count(), 1, "no writes after stop");
}

#[tokio::test(start_paused = true)]
async fn task_group_drives_and_stops_rotator() {
    let mut group = TaskGroup::new();
    let settings = new_tls_config(vec![
        with_random_source(scripted_random(&[1, 2, 3])),
        with_session_ticket_key_rotation(&mut group, 2, HOUR),
    ])
    .expect("configuration");
    let ticketer = settings.ticketer();
    assert_eq!(ticketer.key_count(), 1);

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(group.run(shutdown.clone()));

    tokio::time::sleep(HOUR * 2 + Duration::from_secs(1)).await;
    assert_eq!(ticketer.key_count(), 2);

    shutdown.cancel();
    running
        .await
        .expect("group task")
        .expect("clean shutdown");
}
