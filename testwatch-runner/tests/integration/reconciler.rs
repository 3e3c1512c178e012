// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use std::time::Duration;
use testwatch_metadata::Event;
use testwatch_runner::{
    reconciler::{Reconciler, ReconcilerStats, ReconnectPolicy},
    store::{StateHandle, Status},
};

fn reconciler(transport: &ChannelTransport) -> Reconciler<ChannelTransport> {
    Reconciler::new(transport.clone(), StateHandle::new(), FAST_RECONNECT)
}

#[tokio::test]
async fn applies_events_in_arrival_order() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let connection = transport.connection();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();
    reconciler.start().await;

    connection.send(&init(vec![file("b.lua", 0, vec![]), file("a.lua", 0, vec![])]));
    connection.send(&Event::StartTest(sub_test("a.lua", "login", 0)));
    connection.send(&Event::StartTest(sub_test("a.lua", "logout", 0)));
    connection.send(&Event::Error(failed_sub_test("a.lua", "login", "expected 200")));
    connection.send(&Event::EndTest(sub_test("a.lua", "logout", 12)));
    connection.send(&Event::Start(file("c.lua", 0, vec![])));

    wait_for(&state, has_file("c.lua")).await?;
    assert_eq!(file_names(&state), vec!["a.lua", "b.lua", "c.lua"]);
    state.read(|store| -> Result<()> {
        let a = store.file("a.lua").ok_or_else(|| color_eyre::eyre::eyre!("a.lua missing"))?;
        let tests: Vec<_> = a.sub_tests().map(|test| test.name()).collect();
        assert_eq!(tests, vec!["login", "logout"]);
        assert_eq!(a.status(), Status::Error);
        assert_eq!(
            a.sub_test("logout").map(|test| test.status()),
            Some(Status::Done)
        );
        Ok(())
    })?;

    assert_eq!(
        reconciler.stats(),
        ReconcilerStats {
            subscriptions: 1,
            events_applied: 6,
            decode_failures: 0,
            transport_failures: 0,
        }
    );
    reconciler.stop().await;
    Ok(())
}

#[tokio::test]
async fn undecodable_messages_are_dropped() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let connection = transport.connection();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();
    reconciler.start().await;

    connection.send(&init(vec![file("a.lua", 0, vec![])]));
    connection.send_raw("not json");
    connection.send_raw(r#"{"type":"explode","data":{}}"#);
    connection.send_raw(r#"{"type":"start","data":{"duration":5}}"#);
    connection.send(&Event::Start(file("b.lua", 0, vec![])));

    wait_for(&state, has_file("b.lua")).await?;
    let stats = reconciler.stats();
    assert_eq!(stats.decode_failures, 3);
    assert_eq!(stats.events_applied, 2);
    assert_eq!(stats.subscriptions, 1, "decode failures do not reconnect");
    reconciler.stop().await;
    Ok(())
}

#[tokio::test]
async fn events_for_unknown_files_are_dropped() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let connection = transport.connection();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();
    reconciler.start().await;

    connection.send(&Event::StartTest(sub_test("ghost.lua", "t", 0)));
    connection.send(&Event::Remove("ghost.lua".to_owned()));
    connection.send(&Event::Start(file("real.lua", 0, vec![])));

    wait_for(&state, has_file("real.lua")).await?;
    assert_eq!(file_names(&state), vec!["real.lua"]);
    assert_eq!(state.revision(), 1, "only the start event changed the store");
    reconciler.stop().await;
    Ok(())
}

#[tokio::test]
async fn no_mutation_after_stop() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let connection = transport.connection();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();
    reconciler.start().await;

    connection.send(&init(vec![file("a.lua", 0, vec![])]));
    wait_for(&state, has_file("a.lua")).await?;
    ensure!(reconciler.is_running(), "reconciler should be running");

    reconciler.stop().await;
    assert!(!reconciler.is_running());
    assert!(connection.is_released(), "stop releases the subscription");
    let revision = state.revision();
    let before = state.snapshot();

    // Nothing listens any more; these go nowhere.
    connection.send(&Event::Start(file("b.lua", 0, vec![])));
    connection.send(&init(vec![]));
    tokio::time::sleep(FAST_RECONNECT.delay * 5).await;

    assert_eq!(state.revision(), revision);
    assert_eq!(state.snapshot(), before);
    assert_eq!(transport.attempts(), 1, "no reconnect after stop");

    // Stopping twice is fine.
    reconciler.stop().await;
    Ok(())
}

#[tokio::test]
async fn reconnect_then_fresh_init_replaces_files() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let first = transport.connection();
    let second = transport.connection();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();
    reconciler.start().await;

    first.send(&init(vec![file("a.lua", 0, vec![]), file("b.lua", 0, vec![])]));
    first.send(&Event::Start(file("c.lua", 0, vec![])));
    wait_for(&state, has_file("c.lua")).await?;

    // Closing the stream makes the reconciler subscribe again.
    drop(first);
    wait_until("second subscription", || reconciler.stats().subscriptions == 2).await?;
    assert_eq!(
        file_names(&state),
        vec!["a.lua", "b.lua", "c.lua"],
        "reconnecting alone does not clear state"
    );

    second.send(&init(vec![file("x.lua", 0, vec![]), file("b.lua", 7, vec![])]));
    wait_for(&state, |store| store.file("a.lua").is_none()).await?;
    assert_eq!(file_names(&state), vec!["b.lua", "x.lua"]);
    assert_eq!(
        state.read(|store| store.file("b.lua").map(|file| file.duration())),
        Some(7)
    );
    assert_eq!(reconciler.stats().transport_failures, 0, "a clean close is not a failure");

    reconciler.stop().await;
    Ok(())
}

#[tokio::test]
async fn stream_errors_trigger_reconnect() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let first = transport.connection();
    let second = transport.connection();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();
    reconciler.start().await;

    first.fail("connection reset");
    second.send(&Event::Start(file("after.lua", 0, vec![])));
    wait_for(&state, has_file("after.lua")).await?;

    let stats = reconciler.stats();
    assert_eq!(stats.subscriptions, 2);
    assert_eq!(stats.transport_failures, 1);
    assert!(first.is_released(), "failed subscription was dropped");
    reconciler.stop().await;
    Ok(())
}

#[tokio::test]
async fn keeps_retrying_until_a_connection_succeeds() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();
    reconciler.start().await;

    wait_until("several failed attempts", || reconciler.stats().transport_failures >= 3).await?;
    assert_eq!(reconciler.stats().subscriptions, 0);
    ensure!(reconciler.is_running(), "failures never stop the reconciler");

    let connection = transport.connection();
    connection.send(&init(vec![file("late.lua", 0, vec![])]));
    wait_for(&state, has_file("late.lua")).await?;
    assert_eq!(reconciler.stats().subscriptions, 1);
    reconciler.stop().await;
    Ok(())
}

#[tokio::test]
async fn stop_interrupts_reconnect_delay() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let policy = ReconnectPolicy::new(Duration::from_secs(3600));
    let mut reconciler = Reconciler::new(transport.clone(), StateHandle::new(), policy);
    reconciler.start().await;

    wait_until("first failed attempt", || transport.attempts() == 1).await?;
    tokio::time::timeout(Duration::from_secs(5), reconciler.stop())
        .await
        .map_err(|_| color_eyre::eyre::eyre!("stop did not interrupt the reconnect delay"))?;
    assert!(!reconciler.is_running());
    Ok(())
}

#[tokio::test]
async fn restart_releases_previous_subscription() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let first = transport.connection();
    let second = transport.connection();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();

    reconciler.start().await;
    first.send(&Event::Start(file("one.lua", 0, vec![])));
    wait_for(&state, has_file("one.lua")).await?;

    reconciler.start().await;
    assert!(first.is_released(), "restart stops the previous task first");
    second.send(&Event::Start(file("two.lua", 0, vec![])));
    wait_for(&state, has_file("two.lua")).await?;

    // The old connection can no longer reach the store.
    first.send(&Event::Start(file("stale.lua", 0, vec![])));
    assert_eq!(file_names(&state), vec!["one.lua", "two.lua"]);
    assert_eq!(reconciler.stats().subscriptions, 2);
    reconciler.stop().await;
    Ok(())
}

#[tokio::test]
async fn dropping_reconciler_aborts_task() -> Result<()> {
    test_init();
    let transport = ChannelTransport::new();
    let connection = transport.connection();
    let mut reconciler = reconciler(&transport);
    let state = reconciler.state().clone();
    reconciler.start().await;

    connection.send(&Event::Start(file("a.lua", 0, vec![])));
    wait_for(&state, file_matches("a.lua", |file| file.status() == Status::Done)).await?;

    drop(reconciler);
    wait_until("subscription released", || connection.is_released()).await?;
    let revision = state.revision();
    connection.send(&Event::Start(file("b.lua", 0, vec![])));
    assert_eq!(state.revision(), revision);
    Ok(())
}
