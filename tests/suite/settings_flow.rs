//! Coordinator scenarios across the types and settings crates, without a
//! server: what gets posted, and what observers see.

use serde_json::json;
use trellis_settings::{
    ConfirmChoice, ConfirmPrompt, Coordinator, CoordinatorState, InboundMessage, OutboundMessage,
    SettingsError, SwitchOutcome,
};
use trellis_types::{GroupId, SelectionAxis, SettingValue, SettingsValues};

use crate::common;

const GENERAL: GroupId = GroupId::new(1);
const COMPILER: GroupId = GroupId::new(2);

fn values(opt: i64) -> SettingsValues {
    serde_json::from_value(json!({ "groups": [
        { "id": 1, "settings": { "startupProject": "Core", "extraPlatforms": ["Wasm"] } },
        { "id": 2, "settings": {
            "incremental": true,
            "optLevel": opt,
            "defines": { "TARGET": "Win64", "MODE": "debug" }
        } }
    ] }))
    .unwrap()
}

/// A coordinator holding the fixture schema and values for load `seq` 1.
fn loaded() -> Coordinator<Vec<OutboundMessage>> {
    let mut coordinator = Coordinator::new(Vec::new());
    coordinator.handle(InboundMessage::Schema {
        schema: common::schema(),
    });
    coordinator.handle(InboundMessage::Values {
        seq: 1,
        values: values(0),
    });
    coordinator.channel_mut().clear();
    coordinator
}

#[test]
fn apply_posts_changes_grouped_by_ascending_group_id() {
    let mut coordinator = loaded();
    coordinator.set(COMPILER, "optLevel", 2);
    coordinator.set(GENERAL, "startupProject", "Tests");
    coordinator.set(COMPILER, "incremental", true);

    assert_eq!(coordinator.apply(), 2);

    let sent = serde_json::to_value(coordinator.channel()).unwrap();
    assert_eq!(
        sent,
        json!([
            {
                "type": "set-values",
                "id": "workspace",
                "configuration": "Debug",
                "platform": "Win64",
                "groups": [
                    { "id": 1, "settings": { "startupProject": "Tests" } },
                    { "id": 2, "settings": { "optLevel": 2 } }
                ]
            },
            {
                "type": "values",
                "seq": 2,
                "id": "workspace",
                "configuration": "Debug",
                "platform": "Win64"
            }
        ])
    );
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
}

#[test]
fn structurally_equal_values_do_not_count_as_changes() {
    let mut coordinator = loaded();
    let reordered: SettingValue =
        serde_json::from_value(json!({ "MODE": "debug", "TARGET": "Win64" })).unwrap();
    coordinator.set(COMPILER, "defines", reordered);
    coordinator
        .set_json(GENERAL, "extraPlatforms", json!(["Wasm"]))
        .unwrap();
    assert_eq!(coordinator.state(), CoordinatorState::Idle);

    coordinator
        .set_json(GENERAL, "extraPlatforms", json!(["Wasm", "Linux32"]))
        .unwrap();
    assert_eq!(coordinator.store().changed_count(), 1);
    coordinator
        .set_json(GENERAL, "extraPlatforms", json!(["Wasm"]))
        .unwrap();
    assert_eq!(coordinator.apply(), 0);
    assert!(coordinator.channel().is_empty());
}

#[test]
fn malformed_json_edits_are_rejected_and_null_is_ignored() {
    let mut coordinator = loaded();
    assert!(coordinator.set_json(COMPILER, "optLevel", json!(1.5)).is_err());
    coordinator.set_json(COMPILER, "optLevel", json!(null)).unwrap();
    assert!(!coordinator.store().has_changed());
    assert_eq!(coordinator.store().get_int(COMPILER, "optLevel"), 0);
}

#[test]
fn observers_follow_a_discarded_switch() {
    let mut coordinator = loaded();
    let mut status = coordinator.subscribe_store();
    let mut snapshot = coordinator.subscribe_schema();
    status.borrow_and_update();
    snapshot.borrow_and_update();

    coordinator.set(COMPILER, "optLevel", 1);
    assert!(status.has_changed().unwrap());
    assert_eq!(status.borrow_and_update().changed, 1);

    let SwitchOutcome::AwaitingConfirmation(prompt) = coordinator
        .request_switch(SelectionAxis::Platform, "Linux64")
        .unwrap()
    else {
        panic!("expected a prompt");
    };
    assert_eq!(prompt, ConfirmPrompt::new(1));
    assert_eq!(coordinator.state(), CoordinatorState::Confirming);
    assert!(!snapshot.has_changed().unwrap());

    coordinator.resolve_prompt(ConfirmChoice::Discard).unwrap();
    assert_eq!(status.borrow_and_update().changed, 0);
    let seen = snapshot.borrow_and_update().clone();
    assert_eq!(seen.schema.unwrap().platform(), "Linux64");

    let sent = coordinator.channel();
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], OutboundMessage::RequestValues(load) if load.selection.platform == "Linux64"));
}

#[test]
fn cancel_republishes_the_unchanged_selection() {
    let mut coordinator = loaded();
    let mut snapshot = coordinator.subscribe_schema();
    snapshot.borrow_and_update();
    coordinator.set(GENERAL, "startupProject", "Tests");

    coordinator.set_configuration("Release").unwrap();
    coordinator.resolve_prompt(ConfirmChoice::Cancel).unwrap();

    assert!(snapshot.has_changed().unwrap());
    let seen = snapshot.borrow_and_update().clone();
    assert_eq!(seen.schema.unwrap().configuration(), "Debug");
    assert_eq!(coordinator.state(), CoordinatorState::Dirty);
    assert!(coordinator.channel().is_empty());
}

#[test]
fn second_request_while_prompt_is_open_changes_nothing() {
    let mut coordinator = loaded();
    coordinator.set(GENERAL, "startupProject", "Tests");
    coordinator.set_configuration("Release").unwrap();

    assert_eq!(
        coordinator.set_platform("Linux64").unwrap(),
        SwitchOutcome::PromptOpen
    );
    let pending = coordinator.pending_switch().unwrap();
    assert_eq!(pending.axis, SelectionAxis::Configuration);
    assert_eq!(pending.target, "Release");

    coordinator.resolve_prompt(ConfirmChoice::Apply).unwrap();
    let schema = coordinator.schema().unwrap();
    assert_eq!(schema.configuration(), "Release");
    assert_eq!(schema.platform(), "Win64");
}

#[test]
fn replacing_the_schema_abandons_an_open_prompt() {
    let mut coordinator = loaded();
    coordinator.set(GENERAL, "startupProject", "Tests");
    coordinator.set_configuration("Release").unwrap();

    coordinator.handle(InboundMessage::Schema {
        schema: common::schema(),
    });

    assert!(coordinator.pending_switch().is_none());
    assert!(!coordinator.store().has_changed());
    assert_eq!(
        coordinator.resolve_prompt(ConfirmChoice::Apply),
        Err(SettingsError::NoPendingSwitch)
    );
    assert_eq!(coordinator.active_group().unwrap().id(), GENERAL);
}

#[test]
fn values_for_an_abandoned_selection_are_dropped() {
    let mut coordinator = loaded();
    coordinator.set_configuration("Release").unwrap();
    coordinator.set_configuration("Debug").unwrap();

    assert!(!coordinator.on_values(2, values(3)));
    assert_eq!(coordinator.store().get_int(COMPILER, "optLevel"), 0);
    assert!(coordinator.on_values(3, values(7)));
    assert_eq!(coordinator.store().get_int(COMPILER, "optLevel"), 7);
}

#[tokio::test]
async fn guarded_switch_with_apply_issues_a_single_reload() {
    let mut coordinator = loaded();
    coordinator.set(COMPILER, "optLevel", 2);
    let mut asked = 0;
    let outcome = coordinator
        .switch_guarded(SelectionAxis::Configuration, "Release", &mut |prompt: &ConfirmPrompt| {
            asked += 1;
            assert_eq!(prompt.changed(), 1);
            ConfirmChoice::Apply
        })
        .await
        .unwrap();
    assert_eq!(outcome, SwitchOutcome::Resolved(ConfirmChoice::Apply));
    assert_eq!(asked, 1);

    let sent = coordinator.channel();
    assert_eq!(sent.len(), 2);
    let OutboundMessage::SetValues(set) = &sent[0] else {
        panic!("expected set-values first");
    };
    assert_eq!(set.selection.configuration, "Debug");
    let OutboundMessage::RequestValues(load) = &sent[1] else {
        panic!("expected a reload");
    };
    assert_eq!(load.selection.configuration, "Release");
}

/// Two edits in different groups, then a platform switch answered with
/// `choice`.
fn switch_platform_with_two_edits(choice: ConfirmChoice) -> Coordinator<Vec<OutboundMessage>> {
    let mut coordinator = loaded();
    coordinator.set(GENERAL, "startupProject", "Tests");
    coordinator.set(COMPILER, "optLevel", 2);
    assert_eq!(coordinator.store().changed_count(), 2);

    let outcome = coordinator.set_platform("Linux64").unwrap();
    assert_eq!(outcome, SwitchOutcome::AwaitingConfirmation(ConfirmPrompt::new(2)));
    assert!(coordinator.channel().is_empty());
    coordinator.resolve_prompt(choice).unwrap();
    coordinator
}

#[test]
fn platform_switch_apply_saves_both_groups_then_loads_once() {
    let coordinator = switch_platform_with_two_edits(ConfirmChoice::Apply);

    let sent = coordinator.channel();
    assert_eq!(sent.len(), 2);
    let OutboundMessage::SetValues(set) = &sent[0] else {
        panic!("expected set-values first");
    };
    assert_eq!(set.selection.platform, "Win64");
    let ids: Vec<GroupId> = set.groups.iter().map(|g| g.id).collect();
    assert_eq!(ids, [GENERAL, COMPILER]);
    assert_eq!(
        set.groups[0].settings["startupProject"],
        SettingValue::from("Tests")
    );
    assert_eq!(set.groups[1].settings["optLevel"], SettingValue::from(2));
    let OutboundMessage::RequestValues(load) = &sent[1] else {
        panic!("expected a load");
    };
    assert_eq!(load.selection.platform, "Linux64");

    assert_eq!(coordinator.store().changed_count(), 0);
    assert_eq!(coordinator.schema().unwrap().platform(), "Linux64");
}

#[test]
fn platform_switch_reset_drops_both_edits_and_loads_once() {
    let coordinator = switch_platform_with_two_edits(ConfirmChoice::Discard);

    let sent = coordinator.channel();
    assert!(!sent.iter().any(|m| matches!(m, OutboundMessage::SetValues(_))));
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], OutboundMessage::RequestValues(load) if load.selection.platform == "Linux64"));
    assert_eq!(coordinator.store().changed_count(), 0);
}

#[test]
fn platform_switch_cancel_keeps_both_edits_and_the_platform() {
    let coordinator = switch_platform_with_two_edits(ConfirmChoice::Cancel);

    assert!(coordinator.channel().is_empty());
    assert_eq!(coordinator.schema().unwrap().platform(), "Win64");
    assert_eq!(coordinator.store().changed_count(), 2);
    assert_eq!(coordinator.state(), CoordinatorState::Dirty);
}
