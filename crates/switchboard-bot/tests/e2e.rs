// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot client against an in-process relay.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchboard_bot::{ConnectionMonitor, EchoHandler, MonitorConfig, MonitorHandle, MonitorState};
use switchboard_config::RelayConfig;
use switchboard_relay::{BotRegistry, ChatRequest, FragmentObserver, Relay};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct Running {
    registry: Arc<BotRegistry>,
    url: String,
    cancel: CancellationToken,
}

async fn start_relay(bot_token: Option<&str>) -> Running {
    let relay = Relay::new(RelayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        bot_token: bot_token.map(str::to_string),
        ..RelayConfig::default()
    });
    let listener = relay.bind().await.unwrap();
    let url = format!("ws://{}/bot-ws", listener.local_addr().unwrap());
    let registry = relay.registry();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move { relay.serve(listener, token).await });
    Running {
        registry,
        url,
        cancel,
    }
}

fn start_bot(url: &str, token: Option<&str>) -> (MonitorHandle, JoinHandle<()>) {
    let config = MonitorConfig {
        token: token.map(str::to_string),
        reconnect_interval: Duration::from_millis(50),
        ..MonitorConfig::new(url, "echo")
    };
    let monitor = ConnectionMonitor::new(config, EchoHandler);
    let handle = monitor.handle();
    let task = tokio::spawn(monitor.run(CancellationToken::new()));
    (handle, task)
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}

#[tokio::test]
async fn echo_bot_answers_through_relay() {
    let relay = start_relay(Some("secret")).await;
    let (bot, task) = start_bot(&relay.url, Some("secret"));
    tokio::time::timeout(WAIT, bot.wait_for_state(MonitorState::Active))
        .await
        .unwrap()
        .unwrap();
    assert!(relay.registry.is_registered("echo"));

    let fragments = Arc::new(Mutex::new(Vec::<(String, bool)>::new()));
    let seen = fragments.clone();
    let observer: FragmentObserver = Arc::new(move |text: &str, done: bool| {
        seen.lock().unwrap().push((text.to_string(), done));
    });

    let reply = tokio::time::timeout(
        WAIT,
        relay
            .registry
            .dispatch_request("echo", ChatRequest::new("one two three", "api"), Some(observer)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(reply, "one two three");

    let fragments = fragments.lock().unwrap().clone();
    assert_eq!(fragments.len(), 3);
    assert!(fragments[..2].iter().all(|(_, done)| !done));
    assert!(fragments[2].1);
    assert_eq!(relay.registry.pending_count(), 0);

    bot.stop();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    relay.cancel.cancel();
}

#[tokio::test]
async fn stopped_bot_leaves_the_registry() {
    let relay = start_relay(None).await;
    let (bot, task) = start_bot(&relay.url, None);
    tokio::time::timeout(WAIT, bot.wait_for_state(MonitorState::Active))
        .await
        .unwrap()
        .unwrap();

    bot.stop();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    let registry = relay.registry.clone();
    eventually(|| !registry.is_registered("echo")).await;
    relay.cancel.cancel();
}

#[tokio::test]
async fn wrong_token_never_becomes_active() {
    let relay = start_relay(Some("secret")).await;
    let (bot, task) = start_bot(&relay.url, Some("guess"));

    tokio::time::timeout(WAIT, bot.wait_for_state(MonitorState::Registered))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(bot.state(), MonitorState::Registered);
    assert!(!relay.registry.is_registered("echo"));

    bot.stop();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    relay.cancel.cancel();
}

#[tokio::test]
async fn bot_reconnects_after_relay_closes_it() {
    let relay = start_relay(None).await;
    let (bot, task) = start_bot(&relay.url, None);
    tokio::time::timeout(WAIT, bot.wait_for_state(MonitorState::Active))
        .await
        .unwrap()
        .unwrap();
    let first = bot.current_link().unwrap();

    assert!(relay.registry.unregister("echo"));
    eventually(|| !first.is_open()).await;

    let registry = relay.registry.clone();
    eventually(|| registry.is_registered("echo")).await;
    assert!(bot.current_link().is_some_and(|link| link.is_open()));

    bot.stop();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    relay.cancel.cancel();
}
