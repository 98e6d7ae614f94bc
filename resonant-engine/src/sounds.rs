//! Maps a `SoundId` to decoded audio and hands the mixer a ready-to-play
//! [`PlayParams`], implementing [`resonant_channel::SoundSourceFactory`].
//! Every registered sound plays through the same pipeline shape (the
//! configured one, or [`crate::pipeline::default_stereo_pipeline`]);
//! per-sound DSP graphs are a `pipeline.file` concern this crate doesn't
//! parse (spec §1 Non-goals keeps bank/pipeline file formats out of
//! scope, §6 only requires the path be accepted).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use resonant_assets::DecodedAsset;
use resonant_channel::SoundSourceFactory;
use resonant_core::ids::SoundId;
use resonant_dsp::{LayerParams, Pipeline};
use resonant_mixer::{PlayParams, PreloadedSource};

#[derive(Default)]
pub struct SoundBank {
    assets: RwLock<HashMap<SoundId, DecodedAsset>>,
    pipeline: RwLock<Option<Arc<Pipeline>>>,
}

impl SoundBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: SoundId, asset: DecodedAsset) {
        self.assets.write().insert(id, asset);
    }

    pub fn unregister(&self, id: SoundId) {
        self.assets.write().remove(&id);
    }

    pub fn set_pipeline(&self, pipeline: Arc<Pipeline>) {
        *self.pipeline.write() = Some(pipeline);
    }

    fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.read().clone().unwrap_or_else(crate::pipeline::default_stereo_pipeline)
    }
}

impl SoundSourceFactory for SoundBank {
    fn create(&self, sound: SoundId, gain: f32, pan: f32, pitch: f32, looping: bool) -> Option<PlayParams> {
        let asset = self.assets.read().get(&sound)?.clone();
        Some(PlayParams {
            source: Box::new(PreloadedSource::new(asset.channels, asset.format.sample_rate)),
            pipeline: self.pipeline(),
            end: None,
            looping,
            loop_budget: 0,
            gain,
            pan,
            pitch,
            spatial: LayerParams::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::{SampleType, SoundFormat};

    fn mono_asset() -> DecodedAsset {
        DecodedAsset { format: SoundFormat::new(48_000, 1, SampleType::Float32, 32), channels: vec![Arc::from(vec![0.0f32; 32])] }
    }

    #[test]
    fn unregistered_sound_yields_no_play_params() {
        let bank = SoundBank::new();
        assert!(bank.create(SoundId(1), 1.0, 0.0, 1.0, false).is_none());
    }

    #[test]
    fn registered_sound_produces_play_params() {
        let bank = SoundBank::new();
        bank.register(SoundId(1), mono_asset());
        let params = bank.create(SoundId(1), 0.5, -0.2, 1.0, true).unwrap();
        assert_eq!(params.gain, 0.5);
        assert!(params.looping);
    }
}
