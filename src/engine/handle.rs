use tracing::{info, warn};

use crate::backend;
use crate::config::EngineConfig;

use super::Engine;

/// A loaded-or-absent engine.
///
/// Construction never fails: when the engine cannot come up, the handle
/// remembers why and every later run degrades to an empty result instead of
/// crashing the process. The handle is deliberately not `Clone`; one value
/// owns the engine, so "at most one engine per process" falls out of
/// ordinary ownership rather than a global flag.
pub struct EngineHandle {
    state: HandleState,
}

enum HandleState {
    Loaded(Box<dyn Engine>),
    Absent { engine: String, reason: String },
}

impl EngineHandle {
    /// Wrap an already constructed engine.
    pub fn from_engine(engine: Box<dyn Engine>) -> Self {
        Self {
            state: HandleState::Loaded(engine),
        }
    }

    /// A handle whose engine never came up.
    pub fn absent(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            state: HandleState::Absent {
                engine: engine.into(),
                reason: reason.into(),
            },
        }
    }

    /// Whether a live engine sits behind this handle.
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, HandleState::Loaded(_))
    }

    /// The engine, when loaded.
    pub fn engine(&self) -> Option<&dyn Engine> {
        match &self.state {
            HandleState::Loaded(engine) => Some(engine.as_ref()),
            HandleState::Absent { .. } => None,
        }
    }

    /// Why the engine is absent, when it is.
    pub fn absence_reason(&self) -> Option<&str> {
        match &self.state {
            HandleState::Loaded(_) => None,
            HandleState::Absent { reason, .. } => Some(reason),
        }
    }

    /// Identifier for diagnostics, valid in both states.
    pub fn engine_id(&self) -> &str {
        match &self.state {
            HandleState::Loaded(engine) => engine.id(),
            HandleState::Absent { engine, .. } => engine,
        }
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            HandleState::Loaded(engine) => f
                .debug_struct("EngineHandle")
                .field("state", &"loaded")
                .field("engine", &engine.id())
                .finish(),
            HandleState::Absent { engine, reason } => f
                .debug_struct("EngineHandle")
                .field("state", &"absent")
                .field("engine", engine)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Bring up the engine described by `config`.
///
/// Initialization failures do not propagate: they are logged with the full
/// cause and folded into an absent [`EngineHandle`], so a missing model or an
/// exhausted accelerator downgrades the run instead of aborting the caller.
pub fn initialize(config: EngineConfig) -> EngineHandle {
    let engine_id = config.model.clone();
    info!(engine = %engine_id, "initializing engine");
    match backend::load(&config) {
        Ok(engine) => {
            info!(engine = %engine.id(), "engine initialized");
            EngineHandle::from_engine(engine)
        }
        Err(error) => {
            warn!(
                engine = %engine_id,
                error = %error,
                "engine initialization failed; continuing without a model"
            );
            EngineHandle::absent(engine_id, error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_handle_accessors() {
        let handle = EngineHandle::absent("some/model", "weights not found");
        assert!(!handle.is_loaded());
        assert!(handle.engine().is_none());
        assert_eq!(handle.absence_reason(), Some("weights not found"));
        assert_eq!(handle.engine_id(), "some/model");
    }

    #[test]
    fn test_initialize_degrades_on_bad_config() {
        // An empty model id is rejected before any artifact resolution, so
        // this exercises the degraded path without touching the network.
        let config = EngineConfig {
            model: String::new(),
            ..EngineConfig::default()
        };
        let handle = initialize(config);
        assert!(!handle.is_loaded());
        assert!(handle.absence_reason().unwrap().contains("model"));
    }

    #[test]
    fn test_initialize_degrades_on_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::new(dir.path().to_str().unwrap());
        let handle = initialize(config);
        assert!(!handle.is_loaded());
    }
}
