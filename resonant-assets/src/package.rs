//! `.ampk` package format: a flat, optionally-compressed archive of named
//! assets. Parsing follows the same manual fixed-layout style
//! `asset-manager::sfx.rs` uses for `SFX1`, and the mmap-first, file-fallback
//! opening strategy from `asset-manager::asset_pkg::AssetPkg::open` — the
//! on-disk shape here is the spec's own (flat name/offset/size descriptors,
//! no bincode envelope, no content hash), but the approach to holding the
//! backing bytes without committing to always mmap is the teacher's.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use resonant_core::{Error, Result};

const AMPK_MAGIC: &[u8; 4] = b"AMPK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
}

#[derive(Debug, Clone)]
struct ItemDescriptor {
    offset: u64,
    size: u64,
}

enum Backing {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mmap(m) => &m[..],
            Backing::Owned(v) => &v[..],
        }
    }
}

/// An opened `.ampk` package. Payload bytes are sliced directly out of the
/// backing buffer (mmap'd when possible), matching `AssetPkg`'s zero-copy
/// read path.
pub struct Package {
    backing: Backing,
    compression: Compression,
    items: HashMap<String, ItemDescriptor>,
    payload_start: usize,
}

impl Package {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::ResourceNotFound(format!("{}: {e}", path.display())))?;

        let backing = match unsafe { Mmap::map(&file) } {
            Ok(m) => Backing::Mmap(m),
            Err(_) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| Error::ResourceNotFound(format!("{}: {e}", path.display())))?;
                Backing::Owned(bytes)
            }
        };

        Self::from_backing(backing)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_backing(Backing::Owned(bytes))
    }

    fn from_backing(backing: Backing) -> Result<Self> {
        let bytes = backing.bytes();
        if bytes.len() < 15 {
            return Err(Error::InvalidParameter("ampk: file too small".into()));
        }
        if &bytes[0..4] != AMPK_MAGIC {
            return Err(Error::InvalidParameter("ampk: bad magic".into()));
        }
        let _version = u16::from_le_bytes([bytes[4], bytes[5]]);
        let compression = match bytes[6] {
            0 => Compression::None,
            1 => Compression::Zlib,
            other => return Err(Error::Unsupported(format!("ampk: compression flag {other}"))),
        };
        let item_count = u64::from_le_bytes(bytes[7..15].try_into().unwrap()) as usize;

        let mut cursor = 15usize;
        let mut items = HashMap::with_capacity(item_count);
        for _ in 0..item_count {
            if cursor + 4 > bytes.len() {
                return Err(Error::InvalidParameter("ampk: truncated descriptor".into()));
            }
            let name_len = u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()) as usize;
            cursor += 4;
            if cursor + name_len + 16 > bytes.len() {
                return Err(Error::InvalidParameter("ampk: truncated descriptor".into()));
            }
            let name = std::str::from_utf8(&bytes[cursor..cursor + name_len])
                .map_err(|_| Error::InvalidParameter("ampk: non-utf8 name".into()))?
                .to_string();
            cursor += name_len;
            let offset = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
            cursor += 8;
            let size = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
            cursor += 8;
            items.insert(name, ItemDescriptor { offset, size });
        }

        for item in items.values() {
            let end = cursor as u64 + item.offset + item.size;
            if end > bytes.len() as u64 {
                return Err(Error::InvalidParameter("ampk: item out of bounds".into()));
            }
        }

        Ok(Self { backing, compression, items, payload_start: cursor })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(|s| s.as_str())
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let item = self
            .items
            .get(name)
            .ok_or_else(|| Error::ResourceNotFound(name.to_string()))?;
        let start = self.payload_start + item.offset as usize;
        let end = start + item.size as usize;
        let raw = &self.backing.bytes()[start..end];

        match self.compression {
            Compression::None => Ok(raw.to_vec()),
            Compression::Zlib => Err(Error::Unsupported("ampk: zlib decompression not linked in".into())),
        }
    }
}

/// Builds an uncompressed `.ampk` archive in memory from `(name, bytes)`
/// pairs, in the exact layout [`Package::from_bytes`] parses.
pub fn build_uncompressed(items: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(AMPK_MAGIC);
    out.extend_from_slice(&1u16.to_le_bytes());
    out.push(0); // Compression::None
    out.extend_from_slice(&(items.len() as u64).to_le_bytes());

    let mut payload = Vec::new();
    for (name, bytes) in items {
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        payload.extend_from_slice(bytes);
    }
    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multiple_items() {
        let bytes = build_uncompressed(&[("a.wav", b"hello"), ("b.wav", b"world!!")]);
        let pkg = Package::from_bytes(bytes).unwrap();
        assert_eq!(pkg.read("a.wav").unwrap(), b"hello");
        assert_eq!(pkg.read("b.wav").unwrap(), b"world!!");
        assert_eq!(pkg.names().count(), 2);
    }

    #[test]
    fn missing_item_is_resource_not_found() {
        let bytes = build_uncompressed(&[("a.wav", b"hello")]);
        let pkg = Package::from_bytes(bytes).unwrap();
        assert!(matches!(pkg.read("missing.wav"), Err(Error::ResourceNotFound(_))));
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(Package::from_bytes(vec![0u8; 20]).is_err());
    }
}
