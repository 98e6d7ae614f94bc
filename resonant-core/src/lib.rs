//! Shared foundation for the resonant spatial audio runtime: error kinds,
//! math, object ids, `SoundFormat` and the `Fader` interface.

pub mod error;
pub mod fader;
pub mod format;
pub mod ids;
pub mod math;

pub use error::{Error, Result};
pub use format::{SampleType, SoundFormat};
