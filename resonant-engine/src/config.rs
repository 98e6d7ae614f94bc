//! Engine configuration (spec §6 "Configuration options"), a
//! `serde`-deserializable struct the way `asset-manager` and
//! `engine-core::world_loader` load their own config/world files from
//! TOML or JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputChannels {
    Mono,
    Stereo,
}

impl OutputChannels {
    pub fn count(self) -> u16 {
        match self {
            OutputChannels::Mono => 1,
            OutputChannels::Stereo => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Int16,
    Float32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub buffer_size: usize,
    pub frequency: u32,
    pub channels: OutputChannels,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { buffer_size: 1024, frequency: 48_000, channels: OutputChannels::Stereo, format: OutputFormat::Float32 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub output: OutputConfig,
    pub driver_name: String,
    /// Path to a pipeline definition file. A missing or empty path falls
    /// back to the built-in default stereo spatial pipeline.
    pub pipeline_file: Option<String>,
    pub buses_file: Option<String>,
    /// Maximum number of channels holding a real mixer layer at once
    /// (spec §4.D virtualisation top-K).
    pub max_real_channels: usize,
    pub play_speed_smoothing: f32,
    pub master_gain: f32,
    pub sound_speed: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            driver_name: "default".to_string(),
            pipeline_file: None,
            buses_file: None,
            max_real_channels: 64,
            play_speed_smoothing: resonant_mixer::PLAY_SPEED_SMOOTHING,
            master_gain: 1.0,
            sound_speed: 343.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.output.frequency, config.output.frequency);
        assert_eq!(back.output.channels, config.output.channels);
        assert_eq!(back.max_real_channels, config.max_real_channels);
    }

    #[test]
    fn partial_json_fills_missing_fields_from_defaults() {
        let partial: EngineConfig = serde_json::from_str(r#"{"driver_name": "cpal"}"#).unwrap();
        assert_eq!(partial.driver_name, "cpal");
        assert_eq!(partial.output.frequency, 48_000);
    }

    #[test]
    fn output_channels_count_matches_enum_variant() {
        assert_eq!(OutputChannels::Mono.count(), 1);
        assert_eq!(OutputChannels::Stereo.count(), 2);
    }
}
