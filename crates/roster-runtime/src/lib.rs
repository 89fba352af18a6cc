#![deny(warnings)]

//! Generation runtime: drives the generators into a record store.
//!
//! [`Engine::generate_and_persist`] is the single entry point. Single mode
//! writes one row per insert; bulk mode buffers rows and flushes every
//! `batch_size`, reconciling store identities back onto the preview.

pub mod config;
mod engine;

pub use config::{RuntimeConfig, RuntimeConfigError};
pub use engine::{
    Engine, GenerationError, GenerationRequest, GenerationSummary, InsertMode, PreviewEntry,
    DEFAULT_BATCH_SIZE, PREVIEW_LEN,
};
