//! Declarative validation of raw scenario definitions.
//!
//! A definition is a JSON-like tree; every key must appear in the node
//! schema and every `<% name %>` reference must be registered in the
//! capability table. Validation runs once at load time, so runtime never
//! sees a malformed tree.

use crate::api::{Api, TOKEN_RE};
use crate::error::ScenarioError;
use serde_json::Value;

/// Shape a definition value must satisfy.
#[derive(Debug, Clone, Copy)]
enum Rule {
    /// Non-empty string without '/', '<', '>'.
    Name,
    /// Literal bool or capability reference.
    Boolean,
    /// Literal number or capability reference.
    Number,
    /// String; embedded references are checked against the table.
    Text,
    /// Exact-form capability reference only.
    Hook,
    /// Nested command map: each value is a full node definition.
    Commands,
    /// Any of the listed rules.
    OneOf(&'static [Rule]),
    /// Literal array whose elements each satisfy one of the listed rules,
    /// or a capability reference producing one.
    ArrayOf(&'static [Rule]),
}

static MENU_COL: [Rule; 1] = [Rule::Text];
static MENU_ROW: [Rule; 2] = [Rule::Text, Rule::ArrayOf(&MENU_COL)];
static MENU: [Rule; 2] = [Rule::Text, Rule::ArrayOf(&MENU_ROW)];

/// Keys every node definition must carry.
static REQUIRED_KEYS: [&str; 1] = ["name"];

/// Schema of one scenario node. `commands` values recurse as full nodes, so
/// nesting depth is unbounded.
static NODE_SCHEMA: [(&str, Rule); 17] = [
    ("name", Rule::Name),
    ("typing", Rule::Boolean),
    ("uploading_photo", Rule::Boolean),
    ("recording_video", Rule::Boolean),
    ("uploading_video", Rule::Boolean),
    ("recording_audio", Rule::Boolean),
    ("uploading_audio", Rule::Boolean),
    ("uploading_document", Rule::Boolean),
    ("finding_location", Rule::Boolean),
    ("reply", Rule::Text),
    ("menu", Rule::OneOf(&MENU)),
    ("ttl", Rule::Number),
    ("goto", Rule::Text),
    ("before", Rule::Hook),
    ("action", Rule::Hook),
    ("after", Rule::Hook),
    ("commands", Rule::Commands),
];

/// Validates raw definitions against the node schema.
pub struct Validator<'a> {
    api: &'a Api,
}

impl<'a> Validator<'a> {
    pub fn new(api: &'a Api) -> Self {
        Self { api }
    }

    /// Validates a whole definition tree. The error names the offending
    /// dot-separated definition path and the reason.
    pub fn validate(&self, definition: &Value) -> Result<(), ScenarioError> {
        self.check_node("scenario", definition)
    }

    fn check_node(&self, path: &str, value: &Value) -> Result<(), ScenarioError> {
        let Some(map) = value.as_object() else {
            return Err(ScenarioError::validation(path, "must be an object"));
        };

        // required keys first, then per-key rules
        for key in REQUIRED_KEYS {
            if !map.contains_key(key) {
                return Err(ScenarioError::validation(
                    path,
                    format!("expected to have key \"{key}\""),
                ));
            }
        }

        for (key, rule) in &NODE_SCHEMA {
            if let Some(field) = map.get(*key) {
                self.check_rule(&format!("{path}.{key}"), field, rule)?;
            }
        }

        let unknown: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|key| !NODE_SCHEMA.iter().any(|(name, _)| name == key))
            .collect();
        if !unknown.is_empty() {
            return Err(ScenarioError::validation(
                path,
                format!("unknown keys: [\"{}\"]", unknown.join("\", \"")),
            ));
        }

        Ok(())
    }

    fn check_rule(&self, path: &str, value: &Value, rule: &Rule) -> Result<(), ScenarioError> {
        match rule {
            Rule::Name => self.check_name(path, value),
            Rule::Boolean => self.check_typed(path, value, "boolean", Value::is_boolean),
            Rule::Number => self.check_typed(path, value, "number", Value::is_number),
            Rule::Text => self.check_text(path, value),
            Rule::Hook => self.check_hook(path, value),
            Rule::Commands => self.check_commands(path, value),
            Rule::OneOf(rules) => self.check_one_of(path, value, rules),
            Rule::ArrayOf(rules) => self.check_array(path, value, rules),
        }
    }

    /// Literal of `type_name`, or an exact capability reference.
    fn check_typed(
        &self,
        path: &str,
        value: &Value,
        type_name: &str,
        is_type: fn(&Value) -> bool,
    ) -> Result<(), ScenarioError> {
        if is_type(value) || self.is_deferred(path, value)? {
            return Ok(());
        }
        Err(ScenarioError::validation(
            path,
            format!("must be {type_name} or capability call \"<% name %>\""),
        ))
    }

    /// True when the value is exactly `<% name %>`. A reference to an
    /// unregistered name is an error, not a mismatch.
    fn is_deferred(&self, path: &str, value: &Value) -> Result<bool, ScenarioError> {
        match Api::deferred_name(value) {
            Some(name) if self.api.contains(name) => Ok(true),
            Some(name) => Err(ScenarioError::validation(
                path,
                format!("capability \"{name}\" used in \"<% %>\" is not registered"),
            )),
            None => Ok(false),
        }
    }

    /// String field: every embedded `<% name %>` must be registered.
    fn check_text(&self, path: &str, value: &Value) -> Result<(), ScenarioError> {
        let Some(s) = value.as_str() else {
            return Err(ScenarioError::validation(path, "must be a string"));
        };
        for caps in TOKEN_RE.captures_iter(s) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !self.api.contains(name) {
                    return Err(ScenarioError::validation(
                        path,
                        format!("capability \"{name}\" used in \"<% %>\" is not registered"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_hook(&self, path: &str, value: &Value) -> Result<(), ScenarioError> {
        if self.is_deferred(path, value)? {
            return Ok(());
        }
        Err(ScenarioError::validation(
            path,
            "must be a capability call \"<% name %>\"",
        ))
    }

    fn check_name(&self, path: &str, value: &Value) -> Result<(), ScenarioError> {
        let Some(s) = value.as_str() else {
            return Err(ScenarioError::validation(path, "must be a non-empty string"));
        };
        if s.is_empty() {
            return Err(ScenarioError::validation(path, "must be a non-empty string"));
        }
        if s.contains(['/', '<', '>']) {
            return Err(ScenarioError::validation(
                path,
                "chars ['/' '<' '>'] are not allowed",
            ));
        }
        Ok(())
    }

    fn check_commands(&self, path: &str, value: &Value) -> Result<(), ScenarioError> {
        let Some(map) = value.as_object() else {
            return Err(ScenarioError::validation(path, "must be an object"));
        };
        for (pattern, sub) in map {
            self.check_node(&format!("{path}.\"{pattern}\""), sub)?;
        }
        Ok(())
    }

    fn check_one_of(
        &self,
        path: &str,
        value: &Value,
        rules: &[Rule],
    ) -> Result<(), ScenarioError> {
        let mut errors = Vec::new();
        for rule in rules {
            match self.check_rule(path, value, rule) {
                Ok(()) => return Ok(()),
                Err(e) => errors.push(e.to_string()),
            }
        }
        Err(ScenarioError::validation(
            path,
            format!(
                "none of the accepted shapes matched:\n  {}",
                errors.join("\n  ")
            ),
        ))
    }

    fn check_array(
        &self,
        path: &str,
        value: &Value,
        rules: &[Rule],
    ) -> Result<(), ScenarioError> {
        if self.is_deferred(path, value)? {
            return Ok(());
        }
        let Some(items) = value.as_array() else {
            return Err(ScenarioError::validation(
                path,
                "must be an array or capability call returning one",
            ));
        };
        for (index, item) in items.iter().enumerate() {
            self.check_one_of(&format!("{path}[{index}]"), item, rules)?;
        }
        Ok(())
    }
}
