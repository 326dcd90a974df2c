// src/host/mod.rs

// --- Host-side protocol engine ---
pub mod config;
pub mod engine;
pub mod port;
pub mod sample_log;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod mock;

pub use config::EngineConfig;
pub use engine::Engine;
pub use port::{Phase, PortEngine};
pub use sample_log::{RawSample, SampleLog, SAMPLE_LOG_DEPTH};
pub use snapshot::{PortSnapshot, PortStatus};
