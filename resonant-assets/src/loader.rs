//! Caches decoded asset data behind an LRU eviction policy, grounded on
//! `asset-manager::loader::AssetLoader` (package-backed `LruCache` keyed by
//! asset name, storing `(size_bytes, Arc<Blob>)` so multiple sound
//! instances referencing the same asset share one decoded allocation).
//!
//! Decoded PCM is kept as `Arc<[f32]>` per channel rather than the
//! teacher's single interleaved `Arc<SfxBlob>` blob, resolving the "should
//! preloaded chunks be shared across instances" open question: cloning an
//! `Arc<[f32]>` is the sharing mechanism, and identity (`Arc::ptr_eq`) is
//! what a caller checks to confirm no second decode happened.

use std::sync::{Arc, Mutex};

use lru::LruCache;

use resonant_core::{Error, Result, SoundFormat};

use crate::decoder::Decoder;
use crate::package::Package;
use crate::resample::resample_planar;

#[derive(Clone)]
pub struct DecodedAsset {
    pub format: SoundFormat,
    pub channels: Vec<Arc<[f32]>>,
}

struct CacheEntry {
    size_bytes: usize,
    asset: DecodedAsset,
}

/// Package-backed, LRU-evicted decoded-asset cache.
pub struct AssetLoader {
    package: Package,
    cache: Mutex<LruCache<String, CacheEntry>>,
    memory_budget_bytes: usize,
}

fn interleave_to_planar(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels.max(1);
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for (i, s) in samples.iter().enumerate() {
        planar[i % channels].push(*s);
    }
    planar
}

impl AssetLoader {
    pub fn new(package: Package, memory_budget_bytes: usize) -> Self {
        Self {
            package,
            cache: Mutex::new(LruCache::unbounded()),
            memory_budget_bytes,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.package.names().map(|s| s.to_string()).collect()
    }

    /// Loads and decodes `name`, applying `decoder_factory` to the raw
    /// package bytes and resampling to `target_sample_rate` if given.
    /// Returns a cheap clone of the cached `Arc<[f32]>` channels on repeat
    /// calls instead of re-decoding.
    pub fn load(
        &self,
        name: &str,
        decoder_factory: impl FnOnce(&[u8]) -> Result<Box<dyn Decoder>>,
        target_sample_rate: Option<u32>,
    ) -> Result<DecodedAsset> {
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.get(name) {
                return Ok(entry.asset.clone());
            }
        }

        let bytes = self.package.read(name)?;
        let mut decoder = decoder_factory(&bytes)?;
        let format = decoder.format();
        let interleaved = decoder.decode_all()?;
        let mut planar = interleave_to_planar(&interleaved, format.channel_count as usize);

        if let Some(target) = target_sample_rate {
            if target != format.sample_rate {
                planar = resample_planar(&planar, format.sample_rate, target)?;
            }
        }

        let channels: Vec<Arc<[f32]>> = planar.into_iter().map(Arc::from).collect();
        let size_bytes = channels.iter().map(|c| c.len() * std::mem::size_of::<f32>()).sum();
        let asset = DecodedAsset { format, channels };

        self.insert_and_evict(name.to_string(), size_bytes, asset.clone());
        Ok(asset)
    }

    fn insert_and_evict(&self, key: String, size_bytes: usize, asset: DecodedAsset) {
        let mut cache = self.cache.lock().unwrap();
        cache.put(key, CacheEntry { size_bytes, asset });

        let mut total: usize = cache.iter().map(|(_, e)| e.size_bytes).sum();
        while total > self.memory_budget_bytes {
            match cache.pop_lru() {
                Some((_, evicted)) => total = total.saturating_sub(evicted.size_bytes),
                None => break,
            }
        }
    }

    pub fn evict(&self, name: &str) -> Result<()> {
        let mut cache = self.cache.lock().unwrap();
        cache.pop(name).map(|_| ()).ok_or_else(|| Error::ResourceNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::WavDecoder;
    use crate::package::build_uncompressed;

    fn wav_bytes(samples: &[i16]) -> Vec<u8> {
        let data_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&48_000u32.to_le_bytes());
        buf.extend_from_slice(&(48_000u32 * 2).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(data_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&data_bytes);
        buf
    }

    #[test]
    fn repeated_load_shares_arc_storage() {
        let wav = wav_bytes(&[0, 100, 200, 300]);
        let pkg_bytes = build_uncompressed(&[("beep.wav", &wav)]);
        let pkg = Package::from_bytes(pkg_bytes).unwrap();
        let loader = AssetLoader::new(pkg, 1024 * 1024);

        let factory = |bytes: &[u8]| -> Result<Box<dyn Decoder>> { Ok(Box::new(WavDecoder::from_bytes(bytes)?)) };

        let a = loader.load("beep.wav", factory, None).unwrap();
        let b = loader.load("beep.wav", factory, None).unwrap();
        assert!(Arc::ptr_eq(&a.channels[0], &b.channels[0]));
    }

    #[test]
    fn eviction_under_pressure_frees_entries() {
        let wav = wav_bytes(&[0; 1000]);
        let pkg_bytes = build_uncompressed(&[("a.wav", &wav), ("b.wav", &wav)]);
        let pkg = Package::from_bytes(pkg_bytes).unwrap();
        let loader = AssetLoader::new(pkg, 64); // tiny budget forces eviction

        let factory = |bytes: &[u8]| -> Result<Box<dyn Decoder>> { Ok(Box::new(WavDecoder::from_bytes(bytes)?)) };
        loader.load("a.wav", factory, None).unwrap();
        loader.load("b.wav", factory, None).unwrap();

        let mut cache = loader.cache.lock().unwrap();
        assert!(cache.len() <= 1, "tiny budget should have evicted the older entry");
        drop(cache);
    }
}
