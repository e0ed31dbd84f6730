//! Action registry: plugin name -> action name -> handler
//!
//! Built once at process start. [`Registry`] only hands out shared
//! references, so the lookup table is read-only after initialization.

use crate::action::{ActionReport, DynAction};
use crate::error::{CloudError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

type ActionTable = BTreeMap<String, Arc<dyn DynAction>>;

/// Collects handlers before the registry is frozen
#[derive(Default)]
pub struct RegistryBuilder {
    plugins: BTreeMap<String, ActionTable>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `action` of `plugin` to a handler; a later registration replaces an earlier one
    pub fn register(
        mut self,
        plugin: impl Into<String>,
        action: impl Into<String>,
        handler: impl DynAction + 'static,
    ) -> Self {
        let plugin = plugin.into();
        let action = action.into();
        tracing::debug!(%plugin, %action, "registered action");
        self.plugins
            .entry(plugin)
            .or_default()
            .insert(action, Arc::new(handler));
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            plugins: self.plugins,
        }
    }
}

/// Read-only lookup table of every available action
pub struct Registry {
    plugins: BTreeMap<String, ActionTable>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up the handler bound to `plugin` / `action`
    pub fn action(&self, plugin: &str, action: &str) -> Result<Arc<dyn DynAction>> {
        let actions = self
            .plugins
            .get(plugin)
            .ok_or_else(|| CloudError::PluginNotFound(plugin.to_string()))?;

        actions
            .get(action)
            .cloned()
            .ok_or_else(|| CloudError::ActionNotFound {
                plugin: plugin.to_string(),
                action: action.to_string(),
            })
    }

    /// Look up and invoke in one step; lookup misses become a failed report
    pub async fn invoke(&self, plugin: &str, action: &str, raw: &str) -> ActionReport {
        match self.action(plugin, action) {
            Ok(handler) => {
                tracing::info!(plugin, action, "invoking action");
                handler.invoke(raw).await
            }
            Err(err) => ActionReport::failed(err),
        }
    }

    /// Plugin names with their action names, both sorted
    pub fn plugins(&self) -> Vec<(&str, Vec<&str>)> {
        self.plugins
            .iter()
            .map(|(plugin, actions)| {
                (
                    plugin.as_str(),
                    actions.keys().map(String::as_str).collect(),
                )
            })
            .collect()
    }
}
