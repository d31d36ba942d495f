//! Scenario executor: renders a node's templated fields against the
//! capability table at turn time.
//!
//! Reply strings select one `==`-delimited alternative at random and only
//! then substitute, so unselected alternatives never invoke anything. Menu
//! strings substitute first and split after; structured menus pass through
//! untouched.

use crate::api::{Api, TurnContext, TOKEN_RE};
use crate::error::ScenarioError;
use crate::node::{ScenarioNode, FALLBACK_PATTERN};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use sbot_core::{Menu, PresenceSignal};
use serde_json::Value;
use std::collections::VecDeque;

/// Delimiter between reply alternatives: a line of two or more '='.
static REPLY_ALT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\n={2,}\n)+").expect("reply delimiter regex"));

/// Row split for string menus.
static MENU_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").expect("menu row regex"));

/// Column split for string menus.
static MENU_COL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\|\|\s*").expect("menu column regex"));

/// A node viewed through the capability table, at its canonical path.
#[derive(Clone)]
pub struct ScenarioWrapper<'a> {
    api: &'a Api,
    node: &'a ScenarioNode,
    path: String,
}

impl<'a> std::fmt::Debug for ScenarioWrapper<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioWrapper")
            .field("node", &self.node)
            .field("path", &self.path)
            .finish()
    }
}

impl<'a> ScenarioWrapper<'a> {
    pub(crate) fn new(api: &'a Api, node: &'a ScenarioNode, path: String) -> Self {
        Self { api, node, path }
    }

    pub fn node(&self) -> &'a ScenarioNode {
        self.node
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Canonical path of this node from the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Selects the child whose routing pattern matches `text`. The reserved
    /// `"."` entry matches unconditionally and is tried last regardless of
    /// declaration order. `None` when nothing matches or there are no
    /// commands.
    pub fn match_next(&self, text: &str) -> Option<ScenarioWrapper<'a>> {
        for command in &self.node.commands {
            if let Some(regex) = &command.regex {
                if regex.is_match(text) {
                    return Some(self.child(&command.node));
                }
            }
        }
        self.node
            .commands
            .iter()
            .find(|command| command.pattern == FALLBACK_PATTERN)
            .map(|command| self.child(&command.node))
    }

    fn child(&self, node: &'a ScenarioNode) -> ScenarioWrapper<'a> {
        ScenarioWrapper::new(self.api, node, format!("{}/{}", self.path, node.name()))
    }

    /// Runs the node's `before` hook, if any.
    pub async fn call_before(
        &self,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<Value, ScenarioError> {
        self.call_deferred(self.node.before.as_ref(), ctx, args).await
    }

    /// Runs the node's `action` hook, if any. A non-empty string result
    /// means the node refused to advance; the caller treats it as this
    /// turn's reply and rolls back to the parent.
    pub async fn call_action(
        &self,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<Value, ScenarioError> {
        self.call_deferred(self.node.action.as_ref(), ctx, args).await
    }

    /// Runs the node's `after` hook, if any.
    pub async fn call_after(
        &self,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<Value, ScenarioError> {
        self.call_deferred(self.node.after.as_ref(), ctx, args).await
    }

    /// First presence flag that resolves truthy, in fixed priority order.
    /// Later flags are not evaluated once one wins.
    pub async fn presence_signal(
        &self,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<Option<PresenceSignal>, ScenarioError> {
        for (signal, flag) in &self.node.presence {
            if self.as_bool(flag, ctx, args).await? {
                return Ok(Some(*signal));
            }
        }
        Ok(None)
    }

    /// Reply text for this node, if any. String replies may carry several
    /// `==`-delimited alternatives; one is selected uniformly at random and
    /// only the selected alternative is substituted.
    pub async fn reply(
        &self,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<Option<String>, ScenarioError> {
        let Some(value) = &self.node.reply else {
            return Ok(None);
        };
        match value {
            Value::String(s) => {
                let alternatives: Vec<&str> = REPLY_ALT_RE.split(s).collect();
                let selected = if alternatives.len() > 1 {
                    let index = {
                        let mut rng = rand::thread_rng();
                        rng.gen_range(0..alternatives.len())
                    };
                    alternatives[index]
                } else {
                    s.as_str()
                };
                Ok(Some(self.substitute(selected, ctx, args).await?))
            }
            other => Ok(Some(value_to_text(other))),
        }
    }

    /// Menu rows for this node, if any. String menus are substituted, then
    /// split into rows on newlines and columns on `||`; rows reducing to a
    /// single empty column are dropped. Structured menus (or a deferred call
    /// returning one) pass through without substitution.
    pub async fn menu(
        &self,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<Option<Menu>, ScenarioError> {
        let Some(value) = &self.node.menu else {
            return Ok(None);
        };

        if let Some(name) = Api::deferred_name(value) {
            let produced = self.api.invoke(name, ctx, args).await?;
            return Ok(match produced {
                Value::Array(rows) => Some(structured_menu(&rows)),
                Value::String(s) => Some(split_menu(&s)),
                _ => None,
            });
        }

        match value {
            Value::String(s) => {
                let compiled = self.substitute(s, ctx, args).await?;
                Ok(Some(split_menu(&compiled)))
            }
            Value::Array(rows) => Ok(Some(structured_menu(rows))),
            _ => Ok(None),
        }
    }

    /// Path of the next scenario. Without an explicit `goto`: `"."` (stay)
    /// when the node has commands, `"/"` (root) otherwise. The result is
    /// returned raw; the caller resolves and validates it.
    pub async fn goto_path(
        &self,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<String, ScenarioError> {
        match &self.node.r#goto {
            None => Ok(if self.node.has_commands() {
                ".".to_string()
            } else {
                "/".to_string()
            }),
            Some(value) => self.as_text(value, ctx, args).await,
        }
    }

    /// Session TTL override in milliseconds; 0 means "use the caller's
    /// default". Unset and non-numeric values coerce to 0.
    pub async fn ttl(&self, ctx: &mut TurnContext, args: &[Value]) -> Result<u64, ScenarioError> {
        let Some(value) = &self.node.ttl else {
            return Ok(0);
        };
        let number = self.as_number(value, ctx, args).await?;
        Ok(if number.is_finite() && number > 0.0 {
            number as u64
        } else {
            0
        })
    }

    /// Resolves a field as a deferred call: an exact `<% name %>` reference
    /// invokes the capability; anything else is a no-op returning Null.
    async fn call_deferred(
        &self,
        value: Option<&Value>,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<Value, ScenarioError> {
        let Some(value) = value else {
            return Ok(Value::Null);
        };
        match Api::deferred_name(value) {
            Some(name) => self.api.invoke(name, ctx, args).await,
            None => Ok(Value::Null),
        }
    }

    async fn as_bool(
        &self,
        value: &Value,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<bool, ScenarioError> {
        if let Some(flag) = value.as_bool() {
            return Ok(flag);
        }
        let result = match Api::deferred_name(value) {
            Some(name) => self.api.invoke(name, ctx, args).await?,
            None => Value::Null,
        };
        Ok(is_truthy(&result))
    }

    async fn as_number(
        &self,
        value: &Value,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<f64, ScenarioError> {
        if let Some(number) = value.as_f64() {
            return Ok(number);
        }
        let result = match Api::deferred_name(value) {
            Some(name) => self.api.invoke(name, ctx, args).await?,
            None => Value::Null,
        };
        Ok(number_of(&result))
    }

    async fn as_text(
        &self,
        value: &Value,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<String, ScenarioError> {
        match value {
            Value::String(s) => self.substitute(s, ctx, args).await,
            other => Ok(value_to_text(other)),
        }
    }

    /// Replaces every `<% name %>` in `text` with its capability result,
    /// awaiting the capabilities left to right. An unregistered name fails
    /// the whole substitution.
    async fn substitute(
        &self,
        text: &str,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<String, ScenarioError> {
        let names: Vec<String> = TOKEN_RE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect();
        if names.is_empty() {
            return Ok(text.to_string());
        }

        let mut results: VecDeque<Value> = VecDeque::with_capacity(names.len());
        for name in &names {
            results.push_back(self.api.invoke(name, ctx, args).await?);
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for found in TOKEN_RE.find_iter(text) {
            out.push_str(&text[last..found.start()]);
            if let Some(result) = results.pop_front() {
                out.push_str(&value_to_text(&result));
            }
            last = found.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }
}

/// JS-style truthiness over JSON values.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Capability results rendered into substituted text; falsy results render
/// as the empty string.
fn value_to_text(value: &Value) -> String {
    if !is_truthy(value) {
        return String::new();
    }
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number_of(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn split_menu(text: &str) -> Menu {
    MENU_ROW_RE
        .split(text)
        .map(|row| {
            MENU_COL_RE
                .split(row)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|row| row.len() != 1 || !row[0].is_empty())
        .collect()
}

fn structured_menu(rows: &[Value]) -> Menu {
    rows.iter()
        .map(|row| match row {
            Value::Array(cols) => cols.iter().map(text_of).collect(),
            other => vec![text_of(other)],
        })
        .collect()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
