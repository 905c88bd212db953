//! Shared application state for the Buildcast server.
//!
//! [`AppState`] maps each configured build target name to the handle of
//! its session controller. It is built once at startup and never mutated
//! afterwards, so handlers read it without locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use buildcast_core::{spawn_controller, BuildcastConfig, ControllerHandle, ProcessLauncher};
use tracing::info;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    targets: BTreeMap<String, ControllerHandle>,
}

impl AppState {
    /// Create a state with no targets.
    pub const fn new() -> Self {
        Self {
            targets: BTreeMap::new(),
        }
    }

    /// Spawn one session controller per configured target.
    ///
    /// Must be called from within a Tokio runtime. Controller tasks are
    /// detached; they run for as long as the state holds their handles.
    pub fn from_config(config: &BuildcastConfig, launcher: &Arc<dyn ProcessLauncher>) -> Self {
        let mut state = Self::new();
        for target in &config.targets {
            let command = target.build_command();
            info!(
                target_name = target.name,
                program = command.program,
                args = ?command.args,
                "registering build target"
            );
            let (handle, _task) = spawn_controller(target.name.clone(), command, Arc::clone(launcher));
            state.insert(handle);
        }
        state
    }

    /// Register a controller under its target name.
    pub fn insert(&mut self, handle: ControllerHandle) {
        self.targets.insert(handle.target().to_owned(), handle);
    }

    /// Look up the controller for a target.
    pub fn target(&self, name: &str) -> Option<&ControllerHandle> {
        self.targets.get(name)
    }

    /// Configured target names in sorted order.
    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Number of configured targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no targets are configured.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
