//! lamina-export: Pipeline script writers and replay (sans-IO)
//!
//! Turns the visible layers of an edit session into a script that
//! reproduces them, and parses native scripts back into a [`Recipe`]
//! that can be replayed through any [`ImageOps`](lamina_pipeline::ImageOps)
//! backend.

pub mod recipe;
pub mod script;

pub use recipe::{Recipe, ScriptError, ScriptErrorKind};
pub use script::{
    ExportAdvisory, ExportOptions, ExportedScript, ScriptDialect, export, export_layers,
};
