//! A coordinator wired to an in-process server through `SettingsBridge`.

use std::future::Future;

use serde_json::json;
use tokio::sync::mpsc;
use trellis_lsp::{BridgeEvent, ClientStatus, LspClient, SettingsBridge, SettingsView, resolve_project};
use trellis_settings::{
    ConfirmChoice, ConfirmPrompt, Coordinator, CoordinatorState, OutboundMessage, SwitchOutcome,
};
use trellis_types::{BuildLineKind, GroupId, SelectionAxis, render_build_line};

use crate::common::{self, SettingsStore};

const GENERAL: GroupId = GroupId::new(1);
const COMPILER: GroupId = GroupId::new(2);

type Live = Coordinator<mpsc::UnboundedSender<OutboundMessage>>;
type Events = mpsc::UnboundedReceiver<BridgeEvent>;

/// Run `script` against a coordinator bridged to `client`. The bridge stops
/// once the script drops the coordinator.
async fn session<F, Fut>(client: &LspClient, view: SettingsView, script: F)
where
    F: FnOnce(Live, Events) -> Fut,
    Fut: Future<Output = ()>,
{
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let bridge = SettingsBridge::new(view);
    tokio::join!(
        bridge.run(client, outbound_rx, event_tx),
        script(Coordinator::new(outbound_tx), event_rx)
    );
}

async fn pump(coordinator: &mut Live, events: &mut Events) {
    let message = common::next_settings(events).await;
    coordinator.handle(message);
}

/// Receive the schema and the first values.
async fn open(coordinator: &mut Live, events: &mut Events) {
    pump(coordinator, events).await;
    pump(coordinator, events).await;
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn edit_apply_and_reload_round_trip() {
    let store = SettingsStore::seeded();
    let (client, received) = common::start_settings_server(store.clone()).await;

    session(&client, SettingsView::workspace(), |mut coordinator, mut events| async move {
        open(&mut coordinator, &mut events).await;
        assert_eq!(coordinator.store().get_string(GENERAL, "startupProject"), "Core");

        coordinator.set(COMPILER, "optLevel", 2);
        coordinator.set(GENERAL, "startupProject", "Tests");
        coordinator.set(GENERAL, "startupProject", "Core");
        assert_eq!(coordinator.apply(), 1);

        pump(&mut coordinator, &mut events).await;
        assert!(!coordinator.store().has_changed());
        assert_eq!(coordinator.store().get_int(COMPILER, "optLevel"), 2);
    })
    .await;

    assert_eq!(
        received.methods(),
        [
            "beef/settingsSchema",
            "beef/getSettingsValues",
            "beef/setSettingsValues",
            "beef/getSettingsValues"
        ]
    );
    assert_eq!(
        received.params("beef/setSettingsValues")[0],
        json!({
            "id": "workspace",
            "configuration": "Debug",
            "platform": "Win64",
            "groups": [{ "id": 2, "settings": { "optLevel": 2 } }]
        })
    );
    assert_eq!(store.get("Debug", "Win64", 2, "optLevel"), json!(2));
    assert_eq!(store.get("Debug", "Win64", 1, "startupProject"), json!("Core"));
    client.shutdown().await;
}

#[tokio::test]
async fn apply_choice_saves_under_the_old_selection_then_loads_the_new_one() {
    let store = SettingsStore::seeded();
    let (client, received) = common::start_settings_server(store.clone()).await;

    session(&client, SettingsView::workspace(), |mut coordinator, mut events| async move {
        open(&mut coordinator, &mut events).await;
        coordinator.set(COMPILER, "incremental", false);

        let outcome = coordinator
            .switch_guarded(SelectionAxis::Configuration, "Release", &mut |_: &ConfirmPrompt| {
                ConfirmChoice::Apply
            })
            .await
            .unwrap();
        assert_eq!(outcome, SwitchOutcome::Resolved(ConfirmChoice::Apply));

        pump(&mut coordinator, &mut events).await;
        assert_eq!(coordinator.schema().unwrap().configuration(), "Release");
        assert_eq!(coordinator.store().get_int(COMPILER, "optLevel"), 3);
        assert!(!coordinator.store().get_bool(COMPILER, "incremental"));
    })
    .await;

    assert_eq!(store.get("Debug", "Win64", 2, "incremental"), json!(false));
    let loads = received.params("beef/getSettingsValues");
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[1]["configuration"], "Release");
    assert_eq!(
        received.params("beef/setSettingsValues")[0]["configuration"],
        "Debug"
    );
    client.shutdown().await;
}

#[tokio::test]
async fn discard_choice_leaves_the_server_untouched() {
    let store = SettingsStore::seeded();
    let (client, received) = common::start_settings_server(store.clone()).await;

    session(&client, SettingsView::workspace(), |mut coordinator, mut events| async move {
        open(&mut coordinator, &mut events).await;
        coordinator.set(COMPILER, "optLevel", 1);
        coordinator
            .switch_guarded(SelectionAxis::Platform, "Linux64", &mut |_: &ConfirmPrompt| {
                ConfirmChoice::Discard
            })
            .await
            .unwrap();
        pump(&mut coordinator, &mut events).await;
        let defines = coordinator.store().get_object(COMPILER, "defines");
        assert_eq!(defines["TARGET"].as_str(), Some("Linux64"));
    })
    .await;

    assert!(received.params("beef/setSettingsValues").is_empty());
    assert_eq!(store.get("Debug", "Win64", 2, "optLevel"), json!(0));
    client.shutdown().await;
}

#[tokio::test]
async fn cancel_choice_sends_nothing() {
    let (client, received) = common::start_settings_server(SettingsStore::seeded()).await;

    session(&client, SettingsView::workspace(), |mut coordinator, mut events| async move {
        open(&mut coordinator, &mut events).await;
        coordinator.set(GENERAL, "startupProject", "Tests");
        coordinator
            .switch_guarded(SelectionAxis::Configuration, "Release", &mut |_: &ConfirmPrompt| {
                ConfirmChoice::Cancel
            })
            .await
            .unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Dirty);
        assert_eq!(coordinator.store().get_string(GENERAL, "startupProject"), "Tests");
    })
    .await;

    assert_eq!(
        received.methods(),
        ["beef/settingsSchema", "beef/getSettingsValues"]
    );
    client.shutdown().await;
}

#[tokio::test]
async fn project_view_resolved_from_a_manifest_scopes_every_call() {
    let (client, received) = common::start_settings_server(SettingsStore::seeded()).await;
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("Core").join("BeefProj.toml");

    let project = resolve_project(&client, None, Some(&manifest)).await.unwrap();
    assert_eq!(project.as_deref(), Some("Core"));
    let other = resolve_project(&client, None, Some(&dir.path().join("BeefProj.toml")))
        .await
        .unwrap();
    assert_eq!(other, None);

    let view = SettingsView::project("Core");
    assert_eq!(view.title(), "Project Settings: Core");
    session(&client, view, |mut coordinator, mut events| async move {
        open(&mut coordinator, &mut events).await;
    })
    .await;

    assert_eq!(received.params("beef/settingsSchema")[0]["project"], "Core");
    assert_eq!(received.params("beef/getSettingsValues")[0]["project"], "Core");
    client.shutdown().await;
}

#[tokio::test]
async fn server_failures_surface_as_bridge_events() {
    let (client, _) = common::start(|method, _| match method {
        "beef/settingsSchema" => Some(json!({ "id": "workspace", "groups": "not a list" })),
        _ => None,
    })
    .await;

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    drop(outbound_tx);
    SettingsBridge::new(SettingsView::workspace())
        .run(&client, outbound_rx, event_tx)
        .await;

    let Some(BridgeEvent::Failed { operation, .. }) = event_rx.recv().await else {
        panic!("expected a failure event");
    };
    assert_eq!(operation, "load settings schema");
    client.shutdown().await;
}

#[tokio::test]
async fn configuration_change_and_build() {
    let (mut client, received) = common::start_settings_server(SettingsStore::seeded()).await;
    assert_eq!(client.status().configurations(), ["Debug", "Release"]);

    let active = client.change_configuration("Release").await.unwrap();
    assert_eq!(active, "Release");
    assert!(matches!(client.status(), ClientStatus::Running { configuration, .. } if configuration == "Release"));
    assert_eq!(client.status().label(), "Beef Lsp: Release");

    let result = client.build(true).await.unwrap();
    assert_eq!(result.exit_code_or_success(), 0);
    let kinds: Vec<BuildLineKind> = result
        .lines()
        .iter()
        .map(|line| BuildLineKind::classify(line))
        .collect();
    assert_eq!(
        kinds,
        [BuildLineKind::Compile, BuildLineKind::Warning, BuildLineKind::Plain]
    );
    assert_eq!(
        render_build_line(&result.lines()[1], true),
        "\x1b[93mWARNING: unused variable\r\n"
    );
    assert_eq!(received.params("beef/build")[0], json!({ "clean": true }));
    client.shutdown().await;
}
