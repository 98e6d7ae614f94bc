//! The Amplimix-style mixer (spec §4.C): a fixed pool of mix layers, each
//! an independent play-state machine driving a resample-then-pipeline
//! chain, accumulated into one output bus per tick.

pub mod command;
pub mod config;
pub mod layer;
pub mod mixer;
pub mod source;

pub use command::MixEvent;
pub use config::{MixerConfig, LAYER_COUNT, PLAY_SPEED_SMOOTHING};
pub use layer::{LayerIndex, PlayState};
pub use mixer::{Mixer, PlayParams};
pub use source::{LayerSource, PreloadedSource, StreamingSource};
