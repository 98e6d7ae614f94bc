//! Decoder/HRIR sampler collaborator interfaces and the `.amir`/`.ampk`
//! resource formats (spec §2, §6).

pub mod decoder;
pub mod hrir;
pub mod loader;
pub mod package;
pub mod resample;

pub use decoder::{Decoder, WavDecoder};
pub use hrir::{HrirSet, HrirVertex, Sampler};
pub use loader::{AssetLoader, DecodedAsset};
pub use package::Package;
