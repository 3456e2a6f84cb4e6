// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Worked scenarios: overflow, giveup, backoff schedule, offline backlog
//! and TTL expiry.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::time::Duration;

use scenarios::{config, drain, manager, settle, Connect, ScriptedTransport};
use tether::connection::SendOptions;
use tether_core::backoff::planned_delay_ms;
use tether_core::{ConnectionState, DropReason, DropStrategy, QueueEvent};

fn priority(p: u8) -> SendOptions {
    SendOptions {
        priority: Some(p),
        ..SendOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn overflow_with_drop_oldest_keeps_newest_two() {
    let transport = ScriptedTransport::new();
    let mut cfg = config();
    cfg.queue.max_size = 2;
    cfg.queue.drop_strategy = DropStrategy::DropOldest;
    let manager = manager(&transport, cfg);
    let mut events = manager.subscribe_queue_events();

    manager.send_raw("A", priority(1)).unwrap();
    manager.send_raw("B", priority(1)).unwrap();
    manager.send_raw("C", priority(1)).unwrap();

    let pending = manager.outbound_queue_snapshot().await.unwrap();
    assert_eq!(pending.len(), 2);
    let dropped: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            QueueEvent::Dropped { id, reason } => Some((id, reason)),
            _ => None,
        })
        .collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].1, DropReason::Evicted);
    assert!(pending.iter().all(|item| item.id > dropped[0].0));
    assert_eq!(settle(&manager).await.outbound_dropped, 1);

    manager.connect().await.unwrap();
    settle(&manager).await;
    assert_eq!(transport.sent(), vec!["B", "C"]);
}

#[tokio::test(start_paused = true)]
async fn always_failing_send_is_given_up_after_two_attempts() {
    let transport = ScriptedTransport::new();
    let mut cfg = config();
    cfg.queue.max_send_retries = 2;
    let manager = manager(&transport, cfg);
    manager.connect().await.unwrap();
    transport.fail_every_send(true);

    manager.send_raw("<message/>", SendOptions::default()).unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let giveups = manager.giveup_queue_snapshot().await.unwrap();
    assert_eq!(giveups.len(), 1);
    assert_eq!(giveups[0].attempt, 2);
    assert!(giveups[0].last_error.is_some());
    assert!(manager.outbound_queue_snapshot().await.unwrap().is_empty());
    assert_eq!(settle(&manager).await.outbound_giveups, 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_schedule_doubles_until_capped() {
    let transport = ScriptedTransport::new();
    transport.on_connect(std::iter::repeat(Connect::Refused).take(6));
    let mut cfg = config();
    cfg.reconnect.initial_delay_ms = 100;
    cfg.reconnect.multiplier = 2.0;
    cfg.reconnect.max_delay_ms = 1_000;
    cfg.reconnect.jitter_ratio = 0.0;
    let policy = cfg.reconnect.policy();
    let manager = manager(&transport, cfg);

    let planned: Vec<_> = (1..=5).map(|n| planned_delay_ms(n, &policy)).collect();
    assert_eq!(planned, vec![100, 200, 400, 800, 1_000]);

    manager.connect().await.unwrap();
    manager
        .wait_for_state(ConnectionState::Connected)
        .await
        .unwrap();

    let gaps = transport.connect_gaps();
    let expected = [100, 200, 400, 800, 1_000, 1_000];
    assert_eq!(gaps.len(), expected.len());
    for (gap, ms) in gaps.iter().zip(expected) {
        let ms = Duration::from_millis(ms);
        assert!(*gap >= ms && *gap < ms + Duration::from_millis(5), "{gaps:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn offline_backlog_is_sent_in_order_after_reconnect() {
    let transport = ScriptedTransport::new();
    let manager = manager(&transport, config());
    assert_eq!(manager.connect().await.unwrap(), ConnectionState::Connected);

    manager.set_network_status(false).unwrap();
    manager
        .wait_for_state(ConnectionState::Offline)
        .await
        .unwrap();

    manager.send_raw("p2-first", priority(2)).unwrap();
    manager.send_raw("p0-first", priority(0)).unwrap();
    manager.send_raw("p1", priority(1)).unwrap();
    manager.send_raw("p0-second", priority(0)).unwrap();
    manager.send_raw("p2-second", priority(2)).unwrap();
    assert_eq!(manager.outbound_queue_snapshot().await.unwrap().len(), 5);
    assert!(transport.sent().is_empty());

    manager.set_network_status(true).unwrap();
    manager
        .wait_for_state(ConnectionState::Connected)
        .await
        .unwrap();
    assert_eq!(manager.connect().await.unwrap(), ConnectionState::Connected);
    let metrics = settle(&manager).await;

    assert_eq!(
        transport.sent(),
        vec!["p0-first", "p0-second", "p1", "p2-first", "p2-second"]
    );
    let delivered = metrics.outbound_queued
        - metrics.outbound_dropped
        - metrics.outbound_expired
        - metrics.outbound_giveups;
    assert_eq!(delivered, 5);
    assert_eq!(metrics.outbound_sent, delivered);
    assert_eq!(transport.connect_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn stale_item_expires_once_on_sweep() {
    let transport = ScriptedTransport::new();
    let mut cfg = config();
    cfg.queue.ttl_ms = 1_000;
    cfg.queue.ttl_sweep_interval_ms = 500;
    let manager = manager(&transport, cfg);
    let mut events = manager.subscribe_queue_events();

    manager.send_raw("<presence/>", SendOptions::default()).unwrap();
    let id = manager.outbound_queue_snapshot().await.unwrap()[0].id;

    // The sweep at t=1000 sees an age equal to the TTL, which is not stale.
    tokio::time::sleep(Duration::from_millis(1_400)).await;
    assert_eq!(manager.outbound_queue_snapshot().await.unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(manager.outbound_queue_snapshot().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    let expired: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, QueueEvent::Expired { .. }))
        .collect();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id(), id);
    assert_eq!(settle(&manager).await.outbound_expired, 1);
    assert!(transport.sent().is_empty());
}
