//! The validated scenario tree and path-based addressing.

use crate::api::Api;
use crate::error::ScenarioError;
use crate::node::ScenarioNode;
use crate::validator::Validator;
use crate::wrapper::ScenarioWrapper;
use serde_json::Value;
use std::sync::Arc;

/// The immutable conversation definition: a validated tree of named nodes
/// plus the capability table its deferred calls resolve against.
pub struct Scenario {
    api: Arc<Api>,
    root: ScenarioNode,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("root", &self.root).finish()
    }
}

impl Scenario {
    /// Validates `definition` and builds the typed tree. Fails with the
    /// offending definition path on any schema violation.
    pub fn new(api: Arc<Api>, definition: &Value) -> Result<Self, ScenarioError> {
        Validator::new(&api).validate(definition)?;
        let root = ScenarioNode::from_value("scenario", definition)?;
        Ok(Self { api, root })
    }

    pub fn api(&self) -> &Arc<Api> {
        &self.api
    }

    pub fn root_node(&self) -> &ScenarioNode {
        &self.root
    }

    /// Wrapper for the root node, at its canonical path.
    pub fn root(&self) -> ScenarioWrapper<'_> {
        ScenarioWrapper::new(&self.api, &self.root, format!("/{}", self.root.name()))
    }

    /// True when `wrapper` points at the root node.
    pub fn is_root(&self, wrapper: &ScenarioWrapper<'_>) -> bool {
        std::ptr::eq(wrapper.node(), &self.root)
    }

    /// Resolves a `/`-separated path of node names. One leading occurrence
    /// of the root's own name is stripped, so `/`, `/<root>` and `/<root>/x`
    /// all address from the root. Matching is by child *name*, never by the
    /// routing pattern that selects the child during dispatch.
    pub fn resolve(&self, path: &str) -> Result<ScenarioWrapper<'_>, ScenarioError> {
        let root_prefix = format!("/{}", self.root.name());
        let rest = match path.strip_prefix(root_prefix.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        };

        let mut node = &self.root;
        let mut current = root_prefix;

        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            match node.children().find(|child| child.name() == segment) {
                Some(child) => {
                    current.push('/');
                    current.push_str(child.name());
                    node = child;
                }
                None => {
                    return Err(ScenarioError::PathNotFound {
                        segment: segment.to_string(),
                        path: current,
                    });
                }
            }
        }

        Ok(ScenarioWrapper::new(&self.api, node, current))
    }
}
