//! Capability table: named behavior invocable from scenario fields through
//! `<% name %>` references. The per-turn context is an explicit argument of
//! every call; capabilities hold no ambient state of their own.

use crate::error::ScenarioError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sbot_core::{Chat, User};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Matches a value that is exactly one capability reference.
pub(crate) static DEFERRED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<%\s*(\w+)\s*%>$").expect("deferred-call regex"));

/// Matches every embedded capability reference in a string.
pub(crate) static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<%\s*(\w+)\s*%>").expect("token regex"));

/// Per-turn state handed to every capability: message text, sender, chat, a
/// scratch map for this turn, and the session's data map.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub text: String,
    pub from: User,
    pub chat: Chat,
    /// Scratch values for this turn only; discarded afterwards.
    pub stash: Map<String, Value>,
    /// Session data persisted across turns; reset when the user returns to
    /// the root node.
    pub session: Map<String, Value>,
}

impl TurnContext {
    pub fn new(text: impl Into<String>, from: User, chat: Chat) -> Self {
        Self {
            text: text.into(),
            from,
            chat,
            stash: Map::new(),
            session: Map::new(),
        }
    }
}

/// One invocable behavior. `args` is whatever the caller forwards; the engine
/// forwards an empty list.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn call(&self, ctx: &mut TurnContext, args: &[Value]) -> anyhow::Result<Value>;
}

struct FnCapability<F>(F);

#[async_trait]
impl<F> Capability for FnCapability<F>
where
    F: Fn(&mut TurnContext, &[Value]) -> anyhow::Result<Value> + Send + Sync,
{
    async fn call(&self, ctx: &mut TurnContext, args: &[Value]) -> anyhow::Result<Value> {
        (self.0)(ctx, args)
    }
}

/// Mapping from capability name to behavior. Shared read-only by the tree and
/// every in-flight turn.
#[derive(Default)]
pub struct Api {
    caps: HashMap<String, Arc<dyn Capability>>,
}

impl Api {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability under `name`. Last registration wins.
    pub fn register(mut self, name: impl Into<String>, cap: impl Capability + 'static) -> Self {
        self.caps.insert(name.into(), Arc::new(cap));
        self
    }

    /// Registers a plain synchronous closure as a capability.
    pub fn register_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut TurnContext, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(name, FnCapability(f))
    }

    /// True when `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.caps.contains_key(name)
    }

    /// Invokes a registered capability; unknown names are an error.
    pub async fn invoke(
        &self,
        name: &str,
        ctx: &mut TurnContext,
        args: &[Value],
    ) -> Result<Value, ScenarioError> {
        let cap = self
            .caps
            .get(name)
            .ok_or_else(|| ScenarioError::UnknownCapability(name.to_string()))?
            .clone();
        cap.call(ctx, args)
            .await
            .map_err(|source| ScenarioError::Capability {
                name: name.to_string(),
                source,
            })
    }

    /// Returns the capability name when `value` is exactly one `<% name %>`
    /// reference.
    pub(crate) fn deferred_name(value: &Value) -> Option<&str> {
        match value {
            Value::String(s) => DEFERRED_RE
                .captures(s)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str()),
            _ => None,
        }
    }
}
