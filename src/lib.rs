//! TFM — a dual-pane, keyboard-driven terminal file manager with a
//! polymorphic local/S3/SFTP/archive path layer.
//!
//! This crate is the core engine: path/backend abstraction, metadata
//! cache, background task/batch engines, pane/dialog/input model,
//! configuration, persistent state, and file-association dispatch. The
//! terminal rendering and key-decoding backend is an external
//! collaborator against the seams in `render`.

pub mod batch;
pub mod cache;
pub mod config;
pub mod dialog;
pub mod error;
pub mod exec;
pub mod input;
pub mod pane;
pub mod path;
pub mod render;
pub mod state;
pub mod tasks;
pub mod util;

/// Process-wide services wired together at startup, passed to
/// constructors rather than reached for as globals (§9: "Initialization
/// order: config → log sink → state store → cache → panes → dialog
/// stack").
pub struct AppContext {
    pub config: config::Config,
    pub state: state::StateStore,
    pub cache: std::sync::Arc<cache::MetadataCache>,
    pub registry: std::sync::Arc<path::registry::BackendRegistry>,
}

impl AppContext {
    pub fn new(
        config: config::Config,
        state: state::StateStore,
        cache: std::sync::Arc<cache::MetadataCache>,
        registry: std::sync::Arc<path::registry::BackendRegistry>,
    ) -> Self {
        AppContext { config, state, cache, registry }
    }
}
