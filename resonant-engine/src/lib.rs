//! The top-level context crate: wires `resonant-mixer`, `resonant-channel`
//! and `resonant-assets` into the pull API and control API described in
//! spec §6, plus the `serde`-driven engine configuration.

pub mod config;
pub mod engine;
pub mod pipeline;
pub mod registry;
pub mod sounds;

pub use config::{EngineConfig, OutputChannels, OutputConfig};
pub use engine::{Engine, PlayOptions, PlaySource};
pub use registry::Registry;
pub use sounds::SoundBank;
