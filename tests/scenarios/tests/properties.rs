// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Properties that hold for any workload: queue order, conservation,
//! backoff bounds, the giveup threshold, reconnect reset and idempotent
//! connect.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use yare::parameterized;

use scenarios::{config, drain, ledger, manager, settle, Connect, ScriptedTransport};
use tether::connection::SendOptions;
use tether_core::backoff::planned_delay_ms;
use tether_core::{
    Backoff, BackoffPolicy, ConnectionState, DropStrategy, EnqueueOptions, Envelope, OutboundQueue,
    QueueConfig,
};

fn priority(p: u8) -> SendOptions {
    SendOptions {
        priority: Some(p),
        ..SendOptions::default()
    }
}

// Queue order

#[parameterized(
    seed_1 = { 1 },
    seed_2 = { 2 },
    seed_3 = { 3 },
    seed_4 = { 4 },
)]
fn queue_order_holds_after_random_enqueues_and_failures(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let queue_config = QueueConfig {
        max_size: 1_000,
        max_send_retries: 10,
        ..QueueConfig::default()
    };
    let mut queue = OutboundQueue::new(queue_config, Some(seed));
    let base = Instant::now();
    let mut now = base;

    for step in 0..200 {
        now += Duration::from_millis(rng.gen_range(1..20));
        if rng.gen_bool(0.8) {
            let options = EnqueueOptions {
                priority: Some(rng.gen_range(0..3)),
                ..EnqueueOptions::default()
            };
            queue
                .enqueue(Envelope::raw(format!("m{step}")), options, now)
                .unwrap();
        } else {
            let fail = rng.gen_bool(0.5);
            queue.flush_if_possible(now, true, |_| if fail { Err("down") } else { Ok(()) });
        }
    }

    // Viewed from `base`, every retry deadline is still ahead, so the
    // snapshot exposes the full ordering key.
    let snapshot = queue.snapshot(base);
    let mut expected = snapshot.clone();
    expected.sort_by_key(|item| (item.priority, item.next_send_in_ms, item.id));
    assert_eq!(
        snapshot.iter().map(|i| i.id).collect::<Vec<_>>(),
        expected.iter().map(|i| i.id).collect::<Vec<_>>()
    );
    assert_eq!(queue.ids(), snapshot.iter().map(|i| i.id).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn manager_flushes_random_backlog_by_priority_then_insertion() {
    let mut rng = StdRng::seed_from_u64(99);
    let transport = ScriptedTransport::new();
    let manager = manager(&transport, config());

    let mut expected: Vec<(u8, usize, String)> = Vec::new();
    for n in 0..40 {
        let p = rng.gen_range(0..3);
        let body = format!("m{n}");
        manager.send_raw(body.clone(), priority(p)).unwrap();
        expected.push((p, n, body));
    }
    expected.sort();

    manager.connect().await.unwrap();
    settle(&manager).await;

    let bodies: Vec<_> = expected.into_iter().map(|(_, _, body)| body).collect();
    assert_eq!(transport.sent(), bodies);
}

// Conservation

#[parameterized(
    drop_oldest = { DropStrategy::DropOldest },
    drop_newest = { DropStrategy::DropNewest },
    error = { DropStrategy::Error },
)]
#[test_macro(tokio::test(start_paused = true))]
async fn every_enqueued_item_is_accounted_for(strategy: DropStrategy) {
    let mut rng = StdRng::seed_from_u64(7);
    let transport = ScriptedTransport::new();
    let mut cfg = config();
    cfg.queue.max_size = 8;
    cfg.queue.drop_strategy = strategy;
    cfg.queue.ttl_ms = 2_000;
    cfg.queue.ttl_sweep_interval_ms = 250;
    cfg.queue.max_send_retries = 2;
    cfg.queue.retry_backoff_base_ms = 100;
    let manager = manager(&transport, cfg);

    for round in 0..10 {
        for n in 0..rng.gen_range(1..6) {
            manager
                .send_raw(format!("r{round}-{n}"), priority(rng.gen_range(0..3)))
                .unwrap();
        }
        match rng.gen_range(0..4) {
            0 => {
                manager.connect().await.unwrap();
            }
            1 => manager.disconnect(false).await.unwrap(),
            2 => transport.fail_next_sends(rng.gen_range(1..4)),
            _ => {}
        }
        tokio::time::sleep(Duration::from_millis(rng.gen_range(50..900))).await;

        let (queued, accounted) = ledger(&manager).await;
        assert_eq!(queued, accounted, "round {round}");
    }

    // Let everything reach a terminal outcome.
    manager.connect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let metrics = settle(&manager).await;
    assert!(manager.outbound_queue_snapshot().await.unwrap().is_empty());
    assert_eq!(
        metrics.outbound_queued,
        metrics.outbound_sent
            + metrics.outbound_dropped
            + metrics.outbound_expired
            + metrics.outbound_giveups
    );
}

// Backoff bound

#[test]
fn backoff_is_monotonic_and_bounded_for_random_policies() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..200 {
        let max_delay_ms = rng.gen_range(1..120_000);
        let policy = BackoffPolicy {
            initial_delay_ms: rng.gen_range(0..=max_delay_ms),
            max_delay_ms,
            multiplier: rng.gen_range(1.0..4.0),
            jitter_ratio: rng.gen_range(0.0..=1.0),
        };
        let mut backoff = Backoff::seeded(policy, rng.gen());

        let mut previous = 0;
        for attempt in 1..=40 {
            let planned = planned_delay_ms(attempt, &policy);
            assert!(planned >= previous, "{policy:?} attempt {attempt}");
            assert!(planned <= policy.max_delay_ms, "{policy:?} attempt {attempt}");
            previous = planned;

            let delay = backoff.delay(attempt);
            assert_eq!(delay.planned_ms, planned);
            let band = (planned as f64 * policy.jitter_ratio / 2.0).ceil() as u64;
            assert!(delay.jittered_ms <= planned + band);
            assert!(delay.jittered_ms + band >= planned);
        }
    }
}

// Giveup threshold

#[parameterized(
    once = { 1 },
    twice = { 2 },
    five_times = { 5 },
)]
#[test_macro(tokio::test(start_paused = true))]
async fn item_failing_max_attempts_times_is_given_up(max_attempts: u32) {
    let transport = ScriptedTransport::new();
    let mut cfg = config();
    cfg.queue.max_send_retries = max_attempts;
    cfg.queue.retry_backoff_base_ms = 10;
    let manager = manager(&transport, cfg);
    manager.connect().await.unwrap();
    transport.fail_every_send(true);

    manager.send_raw("doomed", SendOptions::default()).unwrap();
    manager.send_raw("also doomed", SendOptions::default()).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(manager.outbound_queue_snapshot().await.unwrap().is_empty());
    let giveups = manager.giveup_queue_snapshot().await.unwrap();
    assert_eq!(giveups.len(), 2);
    assert!(giveups.iter().all(|item| item.attempt == max_attempts));
    assert!(transport.sent().is_empty());
}

// Reconnect reset

#[tokio::test(start_paused = true)]
async fn success_resets_failures_and_restarts_backoff() {
    let transport = ScriptedTransport::new();
    transport.on_connect([Connect::Refused, Connect::Refused, Connect::Refused]);
    let mut cfg = config();
    cfg.reconnect.initial_delay_ms = 100;
    let manager = manager(&transport, cfg);
    let mut states = manager.subscribe_state();

    manager.connect().await.unwrap();
    manager
        .wait_for_state(ConnectionState::Connected)
        .await
        .unwrap();
    assert_eq!(settle(&manager).await.consecutive_failures, 0);
    let attempts: Vec<_> = drain(&mut states)
        .into_iter()
        .filter(|c| c.state == ConnectionState::Reconnecting)
        .map(|c| c.attempt)
        .collect();
    assert_eq!(attempts, vec![Some(1), Some(2), Some(3)]);

    transport.on_connect([Connect::Refused]);
    transport.drop_link();
    manager
        .wait_for_state(ConnectionState::Reconnecting)
        .await
        .unwrap();
    let lost_at = tokio::time::Instant::now();
    manager
        .wait_for_state(ConnectionState::Connected)
        .await
        .unwrap();
    assert_eq!(settle(&manager).await.consecutive_failures, 0);

    let attempts: Vec<_> = drain(&mut states)
        .into_iter()
        .filter(|c| c.state == ConnectionState::Reconnecting)
        .map(|c| c.attempt)
        .collect();
    assert_eq!(attempts, vec![Some(1), Some(2)]);
    // Backoff restarted: 100ms then 200ms, not 800ms onwards.
    assert!(lost_at.elapsed() < Duration::from_millis(400));
}

// Idempotent connect

#[tokio::test(start_paused = true)]
async fn overlapping_connects_share_one_transport_attempt() {
    let transport = ScriptedTransport::new();
    transport.on_connect([Connect::After(Duration::from_millis(300))]);
    let manager = manager(&transport, config());

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.connect().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.current_state(), ConnectionState::Connecting);

    let (second, third) = tokio::join!(manager.connect(), manager.connect());

    assert_eq!(first.await.unwrap().unwrap(), ConnectionState::Connected);
    assert_eq!(second.unwrap(), ConnectionState::Connected);
    assert_eq!(third.unwrap(), ConnectionState::Connected);
    assert_eq!(transport.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_failed_connects_report_the_same_outcome() {
    let transport = ScriptedTransport::new();
    transport.on_connect([Connect::Rejected]);
    let manager = manager(&transport, config());

    let (a, b) = tokio::join!(manager.connect(), manager.connect());

    assert_eq!(a.unwrap(), ConnectionState::Failed);
    assert_eq!(b.unwrap(), ConnectionState::Failed);
    assert_eq!(transport.connect_calls(), 1);
}
