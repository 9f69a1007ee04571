//! Interactive settings session.
//!
//! A [`Session`] owns the coordinator and reacts to two inputs: bridge events
//! (schema, values, failures) and typed input lines. Confirmation prompts
//! read their answer from the same line channel as commands. Stdin is read on
//! a plain thread so an interrupted session never waits on a blocking read.

use std::fmt::Write as _;

use anyhow::{Context, Result, anyhow, bail};
use tokio::sync::mpsc;
use trellis_lsp::{BridgeEvent, LspClient, SettingsBridge, SettingsView};
use trellis_settings::{
    ConfirmChoice, ConfirmPrompt, Coordinator, InboundMessage, Prompter, SettingsChannel,
    SwitchOutcome, ValueStore,
};
use trellis_types::{Group, GroupId, SelectionAxis, Setting, SettingKind, SettingValue};

const HELP: &str = "\
Commands:
  show                      settings of the current group
  groups                    list groups
  group <id|name>           switch to a group
  get <setting>             value and loaded value of a setting
  set <setting> <value>     edit a setting (JSON, or plain text for strings)
  revert <setting>          drop the edit of one setting
  changes                   list pending edits
  apply                     save pending edits
  reset                     discard pending edits
  config <name>             switch configuration
  platform <name>           switch platform
  help                      this text
  quit                      leave (pending edits are discarded)";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Help,
    Show,
    Groups,
    Group(String),
    Get(String),
    Set {
        name: String,
        raw: String,
    },
    Revert(String),
    Changes,
    Apply,
    Reset,
    Switch {
        axis: SelectionAxis,
        target: String,
    },
    Quit,
}

impl SessionCommand {
    /// Parse one input line. Blank lines are `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let argument = |usage: &str| -> Result<String> {
            if rest.is_empty() {
                bail!("usage: {usage}");
            }
            Ok(rest.to_string())
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "show" | "ls" => Self::Show,
            "groups" => Self::Groups,
            "group" | "g" => Self::Group(argument("group <id|name>")?),
            "get" => Self::Get(argument("get <setting>")?),
            "set" => {
                let Some((name, raw)) = rest.split_once(char::is_whitespace) else {
                    bail!("usage: set <setting> <value>");
                };
                Self::Set {
                    name: name.to_string(),
                    raw: raw.trim().to_string(),
                }
            }
            "revert" => Self::Revert(argument("revert <setting>")?),
            "changes" | "diff" => Self::Changes,
            "apply" => Self::Apply,
            "reset" => Self::Reset,
            "config" | "configuration" => Self::Switch {
                axis: SelectionAxis::Configuration,
                target: argument("config <name>")?,
            },
            "platform" => Self::Switch {
                axis: SelectionAxis::Platform,
                target: argument("platform <name>")?,
            },
            "quit" | "exit" | "q" => Self::Quit,
            other => bail!("unknown command `{other}` (try `help`)"),
        };
        Ok(Some(command))
    }
}

/// Answers confirmation prompts from the input channel. End of input cancels.
pub struct LinePrompter<'a> {
    input: &'a mut mpsc::UnboundedReceiver<String>,
}

impl<'a> LinePrompter<'a> {
    pub fn new(input: &'a mut mpsc::UnboundedReceiver<String>) -> Self {
        Self { input }
    }
}

impl Prompter for LinePrompter<'_> {
    async fn confirm(&mut self, prompt: &ConfirmPrompt) -> ConfirmChoice {
        let options: Vec<String> = prompt
            .options()
            .iter()
            .enumerate()
            .map(|(i, choice)| format!("[{}] {choice}", i + 1))
            .collect();
        loop {
            println!("{}", prompt.message());
            println!("  {}", options.join("  "));
            let Some(answer) = self.input.recv().await else {
                return ConfirmChoice::Cancel;
            };
            if let Some(choice) = ConfirmChoice::parse(&answer) {
                return choice;
            }
            println!("Please answer 1, 2 or 3.");
        }
    }
}

pub struct Session<C> {
    coordinator: Coordinator<C>,
    title: String,
}

impl<C: SettingsChannel> Session<C> {
    pub fn new(coordinator: Coordinator<C>, title: impl Into<String>) -> Self {
        Self {
            coordinator,
            title: title.into(),
        }
    }

    pub fn coordinator(&self) -> &Coordinator<C> {
        &self.coordinator
    }

    /// React to one bridge event; returns text to show, if any.
    pub fn on_event(&mut self, event: BridgeEvent) -> Option<String> {
        match event {
            BridgeEvent::Settings(InboundMessage::Schema { schema }) => {
                self.coordinator.on_schema(schema);
                Some(self.describe_schema())
            }
            BridgeEvent::Settings(InboundMessage::Values { seq, values }) => {
                if self.coordinator.on_values(seq, values) {
                    Some(self.show())
                } else {
                    None
                }
            }
            BridgeEvent::Failed { operation, message } => {
                Some(format!("error: {operation} failed: {message}"))
            }
        }
    }

    pub async fn execute<P: Prompter>(
        &mut self,
        command: SessionCommand,
        prompter: &mut P,
    ) -> Result<String> {
        match command {
            SessionCommand::Help => Ok(HELP.to_string()),
            SessionCommand::Show => Ok(self.show()),
            SessionCommand::Groups => self.groups(),
            SessionCommand::Group(selector) => {
                let id = self.find_group(&selector)?;
                self.coordinator.select_group(id)?;
                Ok(self.show())
            }
            SessionCommand::Get(name) => {
                let group = self.setting_group(&name)?;
                let store = self.coordinator.store();
                let mut out = format!("{name} = {}", display(store.get(group, &name)));
                if store.is_changed(group, &name) {
                    let _ = write!(out, " (loaded: {})", display(store.baseline(group, &name)));
                }
                Ok(out)
            }
            SessionCommand::Set { name, raw } => {
                let (group, setting) = self.editable_setting(&name)?;
                let value = typed_value(setting, &raw)?;
                self.coordinator.set_json(group, &name, value)?;
                let store = self.coordinator.store();
                Ok(format!(
                    "{name} = {} ({} pending)",
                    display(store.get(group, &name)),
                    store.changed_count()
                ))
            }
            SessionCommand::Revert(name) => {
                let group = self.setting_group(&name)?;
                let loaded = self
                    .coordinator
                    .store()
                    .baseline(group, &name)
                    .cloned()
                    .ok_or_else(|| anyhow!("`{name}` has no loaded value"))?;
                self.coordinator.set(group, &name, loaded);
                Ok(format!(
                    "{name} reverted ({} pending)",
                    self.coordinator.store().changed_count()
                ))
            }
            SessionCommand::Changes => Ok(self.changes()),
            SessionCommand::Apply => {
                let sent = self.coordinator.apply();
                Ok(if sent == 0 {
                    "Nothing to apply.".to_string()
                } else {
                    format!("Applied {sent} {}; reloading.", plural(sent, "setting"))
                })
            }
            SessionCommand::Reset => {
                let dropped = self.coordinator.store().changed_count();
                self.coordinator.reset();
                Ok(format!("Discarded {dropped} {}.", plural(dropped, "change")))
            }
            SessionCommand::Switch { axis, target } => {
                let outcome = self
                    .coordinator
                    .switch_guarded(axis, &target, prompter)
                    .await?;
                Ok(self.describe_switch(axis, &target, &outcome))
            }
            SessionCommand::Quit => Ok(String::new()),
        }
    }

    /// Alternate between bridge events and input lines until `quit`, end of
    /// input, or the bridge going away. Queued events are handled before
    /// queued input.
    pub async fn interact(
        &mut self,
        input: &mut mpsc::UnboundedReceiver<String>,
        events: &mut mpsc::UnboundedReceiver<BridgeEvent>,
    ) {
        println!("{} (type `help` for commands)", self.title);
        loop {
            tokio::select! {
                biased;
                event = events.recv() => {
                    let Some(event) = event else {
                        println!("Connection to the language server closed.");
                        break;
                    };
                    if let Some(text) = self.on_event(event) {
                        println!("{text}");
                    }
                }
                line = input.recv() => {
                    let Some(line) = line else {
                        break;
                    };
                    let command = match SessionCommand::parse(&line) {
                        Ok(Some(SessionCommand::Quit)) => break,
                        Ok(Some(command)) => command,
                        Ok(None) => continue,
                        Err(e) => {
                            println!("error: {e}");
                            continue;
                        }
                    };
                    let mut prompter = LinePrompter::new(input);
                    match self.execute(command, &mut prompter).await {
                        Ok(text) if text.is_empty() => {}
                        Ok(text) => println!("{text}"),
                        Err(e) => println!("error: {e}"),
                    }
                }
            }
        }

        let pending = self.coordinator().store().changed_count();
        if pending > 0 {
            tracing::info!(pending, "Session closed with unapplied edits");
            println!("Discarding {pending} unapplied {}.", plural(pending, "change"));
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn describe_schema(&self) -> String {
        let Some(schema) = self.coordinator.schema() else {
            return String::new();
        };
        let mut out = format!(
            "{}: configuration {} of [{}], platform {} of [{}]",
            self.title,
            schema.configuration(),
            schema.configurations().join(", "),
            schema.platform(),
            schema.platforms().join(", "),
        );
        for group in schema.groups() {
            let _ = write!(out, "\n  [{}] {}", group.id(), group.name());
        }
        out
    }

    fn show(&self) -> String {
        match self.coordinator.active_group() {
            Some(group) => render_group(group, self.coordinator.store()),
            None => "No settings loaded yet.".to_string(),
        }
    }

    fn groups(&self) -> Result<String> {
        let schema = self
            .coordinator
            .schema()
            .ok_or_else(|| anyhow!("no settings loaded yet"))?;
        let active = self.coordinator.active_group().map(Group::id);
        let lines: Vec<String> = schema
            .groups()
            .iter()
            .map(|group| {
                let marker = if Some(group.id()) == active { '>' } else { ' ' };
                format!("{marker} [{}] {}", group.id(), group.name())
            })
            .collect();
        Ok(lines.join("\n"))
    }

    fn changes(&self) -> String {
        let store = self.coordinator.store();
        if !store.has_changed() {
            return "No pending changes.".to_string();
        }
        let schema = self.coordinator.schema();
        let lines: Vec<String> = store
            .changes()
            .map(|(key, value)| {
                let group = schema
                    .and_then(|s| s.group(key.group()))
                    .map_or_else(|| key.group().to_string(), |g| g.name().to_string());
                format!("  {group}.{} = {value}", key.setting())
            })
            .collect();
        lines.join("\n")
    }

    fn describe_switch(&self, axis: SelectionAxis, target: &str, outcome: &SwitchOutcome) -> String {
        let current = self
            .coordinator
            .schema()
            .map(|s| s.selected(axis).to_string())
            .unwrap_or_default();
        match outcome {
            SwitchOutcome::Switched => format!("Switched {axis} to {current}."),
            SwitchOutcome::Unchanged => format!("{current} is already the {axis}."),
            SwitchOutcome::PromptOpen => "A confirmation is already open.".to_string(),
            SwitchOutcome::AwaitingConfirmation(prompt) => prompt.message(),
            SwitchOutcome::Resolved(ConfirmChoice::Apply) => {
                format!("Saved changes and switched {axis} to {current}.")
            }
            SwitchOutcome::Resolved(ConfirmChoice::Discard) => {
                format!("Discarded changes and switched {axis} to {current}.")
            }
            SwitchOutcome::Resolved(ConfirmChoice::Cancel) => {
                let kept = self.coordinator.store().changed_count();
                format!(
                    "Kept {kept} {}; {axis} stays {current} (not {target}).",
                    plural(kept, "change")
                )
            }
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    fn find_group(&self, selector: &str) -> Result<GroupId> {
        let schema = self
            .coordinator
            .schema()
            .ok_or_else(|| anyhow!("no settings loaded yet"))?;
        let by_id = selector.parse::<u32>().ok().map(GroupId::new);
        schema
            .groups()
            .iter()
            .find(|g| Some(g.id()) == by_id || g.name().eq_ignore_ascii_case(selector))
            .map(Group::id)
            .ok_or_else(|| anyhow!("no group `{selector}`"))
    }

    /// Editable setting `name` in the active group, with the group's id.
    fn editable_setting(&self, name: &str) -> Result<(GroupId, &Setting)> {
        let group = self
            .coordinator
            .active_group()
            .ok_or_else(|| anyhow!("no settings loaded yet"))?;
        let setting = find_setting(group.settings(), name)
            .ok_or_else(|| anyhow!("`{}` has no setting `{name}`", group.name()))?;
        if matches!(setting.kind(), SettingKind::Group { .. }) {
            bail!("`{name}` is a section, not a setting");
        }
        Ok((group.id(), setting))
    }

    fn setting_group(&self, name: &str) -> Result<GroupId> {
        self.editable_setting(name).map(|(group, _)| group)
    }
}

fn find_setting<'a>(settings: &'a [Setting], name: &str) -> Option<&'a Setting> {
    settings.iter().find_map(|setting| {
        if setting.name() == name {
            return Some(setting);
        }
        match setting.kind() {
            SettingKind::Group { settings } => find_setting(settings, name),
            _ => None,
        }
    })
}

/// Read typed input for `setting`. String settings take the text as typed
/// unless it is a quoted JSON string; other kinds need JSON of their shape.
fn typed_value(setting: &Setting, raw: &str) -> Result<serde_json::Value> {
    use serde_json::Value;

    let name = setting.name();
    if let SettingKind::String { .. } = setting.kind() {
        return Ok(match serde_json::from_str(raw) {
            Ok(Value::String(text)) => Value::String(text),
            _ => Value::String(raw.to_string()),
        });
    }
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("`{raw}` is not valid JSON for `{name}`"))?;
    let (fits, expected) = match setting.kind() {
        SettingKind::Bool => (value.is_boolean(), "true or false"),
        SettingKind::Int { .. } => (value.is_i64(), "an integer"),
        SettingKind::List { .. } => (value.is_array(), "a JSON list"),
        SettingKind::Object { .. } => (value.is_object(), "a JSON object"),
        SettingKind::String { .. } | SettingKind::Group { .. } => (true, ""),
    };
    if !fits {
        bail!("`{name}` takes {expected}, not `{raw}`");
    }
    Ok(value)
}

fn display(value: Option<&SettingValue>) -> String {
    value.map_or_else(|| "(unset)".to_string(), ToString::to_string)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}

/// One group's settings, edited ones marked with `*`.
pub fn render_group(group: &Group, store: &ValueStore) -> String {
    let mut varies = Vec::new();
    if group.varies_by_configuration() {
        varies.push("configuration");
    }
    if group.varies_by_platform() {
        varies.push("platform");
    }
    let mut out = format!("[{}] {}", group.id(), group.name());
    if !varies.is_empty() {
        let _ = write!(out, " (per {})", varies.join(" and "));
    }
    render_settings(&mut out, group.id(), group.settings(), store, 1);
    out
}

fn render_settings(
    out: &mut String,
    group: GroupId,
    settings: &[Setting],
    store: &ValueStore,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    for setting in settings {
        if let SettingKind::Group { settings } = setting.kind() {
            let _ = write!(out, "\n{indent}  {}:", setting.name());
            render_settings(out, group, settings, store, depth + 1);
            continue;
        }
        let marker = if store.is_changed(group, setting.name()) { '*' } else { ' ' };
        let _ = write!(
            out,
            "\n{indent}{marker} {} = {}",
            setting.name(),
            display(store.get(group, setting.name()))
        );
    }
}

/// Run a session for `view` on stdin/stdout until the user quits.
pub async fn run(client: &LspClient, view: SettingsView) -> Result<()> {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let bridge = SettingsBridge::new(view);
    let mut session = Session::new(Coordinator::new(outbound_tx), bridge.view().title());

    let mut input = spawn_stdin_reader()?;

    let interact = async move { session.interact(&mut input, &mut event_rx).await };
    tokio::join!(bridge.run(client, outbound_rx, event_tx), interact);
    Ok(())
}

/// Forward stdin lines until end of input or until nobody is listening.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("trellis-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else {
                    tracing::warn!("Stopped reading stdin after a read error");
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to start stdin reader")?;
    Ok(rx)
}
