//! Typed, immutable scenario tree nodes built from validated definitions.

use crate::error::ScenarioError;
use regex::Regex;
use sbot_core::PresenceSignal;
use serde_json::Value;

/// Reserved command pattern: matches unconditionally and is tried after
/// every other pattern, regardless of where it was declared.
pub const FALLBACK_PATTERN: &str = ".";

/// Presence flags in evaluation priority order, paired with their field
/// names in the definition.
pub(crate) static PRESENCE_FLAGS: [(&str, PresenceSignal); 8] = [
    ("typing", PresenceSignal::Typing),
    ("uploading_photo", PresenceSignal::UploadPhoto),
    ("recording_video", PresenceSignal::RecordVideo),
    ("uploading_video", PresenceSignal::UploadVideo),
    ("recording_audio", PresenceSignal::RecordAudio),
    ("uploading_audio", PresenceSignal::UploadAudio),
    ("uploading_document", PresenceSignal::UploadDocument),
    ("finding_location", PresenceSignal::FindLocation),
];

/// One routing entry: a compiled pattern and the child it selects.
#[derive(Debug)]
pub(crate) struct Command {
    pub(crate) pattern: String,
    /// None for the reserved fallback entry.
    pub(crate) regex: Option<Regex>,
    pub(crate) node: ScenarioNode,
}

/// A named node of the conversation tree. Constructed once at load time;
/// never mutated during execution.
#[derive(Debug)]
pub struct ScenarioNode {
    pub(crate) name: String,
    pub(crate) reply: Option<Value>,
    pub(crate) menu: Option<Value>,
    pub(crate) ttl: Option<Value>,
    pub(crate) r#goto: Option<Value>,
    /// Presence flags present in the definition, in priority order.
    pub(crate) presence: Vec<(PresenceSignal, Value)>,
    pub(crate) before: Option<Value>,
    pub(crate) action: Option<Value>,
    pub(crate) after: Option<Value>,
    pub(crate) commands: Vec<Command>,
}

impl ScenarioNode {
    /// Builds a node (and its subtree) from an already-validated definition.
    /// Command patterns are compiled here, so a pattern that is not a valid
    /// regular expression fails at load time instead of mid-turn.
    pub(crate) fn from_value(path: &str, value: &Value) -> Result<Self, ScenarioError> {
        let Some(map) = value.as_object() else {
            return Err(ScenarioError::validation(path, "must be an object"));
        };
        let name = match map.get("name").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => {
                return Err(ScenarioError::validation(
                    path,
                    "expected to have key \"name\"",
                ))
            }
        };

        let mut presence = Vec::new();
        for (field, signal) in PRESENCE_FLAGS {
            if let Some(flag) = map.get(field) {
                presence.push((signal, flag.clone()));
            }
        }

        let mut commands = Vec::new();
        if let Some(command_map) = map.get("commands").and_then(Value::as_object) {
            for (pattern, sub) in command_map {
                let sub_path = format!("{path}.commands.\"{pattern}\"");
                let node = ScenarioNode::from_value(&sub_path, sub)?;
                if commands.iter().any(|c: &Command| c.node.name == node.name) {
                    return Err(ScenarioError::validation(
                        sub_path.as_str(),
                        format!("duplicate sibling name \"{}\"", node.name),
                    ));
                }
                let regex = if pattern == FALLBACK_PATTERN {
                    None
                } else {
                    let compiled = Regex::new(pattern).map_err(|e| {
                        ScenarioError::validation(
                            sub_path.as_str(),
                            format!("invalid pattern: {e}"),
                        )
                    })?;
                    Some(compiled)
                };
                commands.push(Command {
                    pattern: pattern.clone(),
                    regex,
                    node,
                });
            }
        }

        Ok(Self {
            name,
            reply: map.get("reply").cloned(),
            menu: map.get("menu").cloned(),
            ttl: map.get("ttl").cloned(),
            r#goto: map.get("goto").cloned(),
            presence,
            before: map.get("before").cloned(),
            action: map.get("action").cloned(),
            after: map.get("after").cloned(),
            commands,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the node has at least one routing entry.
    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Direct children.
    pub(crate) fn children(&self) -> impl Iterator<Item = &ScenarioNode> {
        self.commands.iter().map(|command| &command.node)
    }
}
