//! `AudioBuffer` — the planar, SIMD-aligned sample container described in
//! spec §4.A. Every channel lives in one contiguous allocation, aligned to
//! [`SIMD_ALIGNMENT`] bytes, with each channel's span padded up to a whole
//! number of [`SIMD_BLOCK_SIZE`]-frame blocks so vectorised mixer/pipeline
//! loops never need per-lane tail handling.
//!
//! Modeled after the planar buffer plumbing in `resonance-cxx`/
//! `resonance-audio-engine::renderer::process_output_planar`, which already
//! threads `&mut [&mut [f32]]` per-channel slices through the spatializer —
//! here that shape becomes the crate's core owned type instead of a
//! borrowed view over someone else's allocation.

use std::alloc::{alloc, alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use resonant_core::{Error, Result};

/// Byte alignment guaranteed for the start of every channel's data.
/// 32 bytes covers AVX (256-bit) vector loads; SSE/NEON callers get a
/// stricter-than-needed guarantee for free.
pub const SIMD_ALIGNMENT: usize = 32;

/// Frames per SIMD processing block (8 `f32` lanes = 256 bits).
pub const SIMD_BLOCK_SIZE: usize = 8;

/// Rounds `frames` up to the next multiple of [`SIMD_BLOCK_SIZE`].
pub fn align_up_frames(frames: usize) -> usize {
    let block = SIMD_BLOCK_SIZE;
    (frames + block - 1) / block * block
}

struct AlignedStorage {
    ptr: NonNull<f32>,
    len: usize,
    layout: Layout,
}

impl AlignedStorage {
    fn new(len: usize, zeroed: bool) -> Result<Self> {
        if len == 0 {
            return Ok(Self { ptr: NonNull::dangling(), len: 0, layout: Layout::new::<f32>() });
        }

        let layout = Layout::from_size_align(len * std::mem::size_of::<f32>(), SIMD_ALIGNMENT)
            .map_err(|_| Error::OutOfMemory)?;

        let raw = unsafe { if zeroed { alloc_zeroed(layout) } else { alloc(layout) } };
        let ptr = NonNull::new(raw as *mut f32).ok_or(Error::OutOfMemory)?;

        Ok(Self { ptr, len, layout })
    }

    fn as_slice(&self) -> &[f32] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedStorage {
    fn drop(&mut self) {
        if self.len != 0 {
            unsafe { dealloc(self.ptr.as_ptr() as *mut u8, self.layout) };
        }
    }
}

// Safety: `AlignedStorage` has unique ownership of its allocation and no
// interior mutability is exposed without `&mut self` on the owning buffer.
unsafe impl Send for AlignedStorage {}
unsafe impl Sync for AlignedStorage {}

/// Planar multi-channel float audio buffer (spec §3/§4.A).
pub struct AudioBuffer {
    storage: AlignedStorage,
    frame_count: usize,
    channel_count: usize,
    padded_frame_count: usize,
}

impl AudioBuffer {
    /// Creates a buffer with `frame_count` usable frames across
    /// `channel_count` channels, zero-initialized.
    pub fn new(frame_count: usize, channel_count: usize) -> Result<Self> {
        let padded_frame_count = align_up_frames(frame_count);
        let storage = AlignedStorage::new(padded_frame_count * channel_count, true)?;
        Ok(Self { storage, frame_count, channel_count, padded_frame_count })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Per-channel capacity rounded up to a whole number of SIMD blocks.
    pub fn padded_frame_count(&self) -> usize {
        self.padded_frame_count
    }

    fn channel_range(&self, channel: usize) -> std::ops::Range<usize> {
        let start = channel * self.padded_frame_count;
        start..start + self.padded_frame_count
    }

    /// Returns the full (padded) storage for one channel, aligned to
    /// [`SIMD_ALIGNMENT`]. Only the first `frame_count()` samples are
    /// meaningful; the rest is the SIMD tail padding.
    pub fn channel_storage(&self, channel: usize) -> &[f32] {
        &self.storage.as_slice()[self.channel_range(channel)]
    }

    pub fn channel_storage_mut(&mut self, channel: usize) -> &mut [f32] {
        let range = self.channel_range(channel);
        &mut self.storage.as_mut_slice()[range]
    }

    /// Returns the usable (unpadded) span for one channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channel_storage(channel)[..self.frame_count]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let n = self.frame_count;
        &mut self.channel_storage_mut(channel)[..n]
    }

    /// Zero-fills every channel (including padding).
    pub fn clear(&mut self) {
        self.storage.as_mut_slice().fill(0.0);
    }

    /// Deep copy; fails with [`Error::OutOfMemory`] on allocation failure.
    pub fn try_clone(&self) -> Result<Self> {
        let mut storage = AlignedStorage::new(self.storage.len, false)?;
        storage.as_mut_slice().copy_from_slice(self.storage.as_slice());
        Ok(Self {
            storage,
            frame_count: self.frame_count,
            channel_count: self.channel_count,
            padded_frame_count: self.padded_frame_count,
        })
    }

    /// Copies `frames` samples per channel from `src` (starting at
    /// `src_offset`) into `dst` (starting at `dst_offset`). Requires
    /// identical channel counts; clips silently to the destination's frame
    /// count, matching spec §4.A ("clips on the destination frame count").
    pub fn copy(src: &AudioBuffer, src_offset: usize, dst: &mut AudioBuffer, dst_offset: usize, frames: usize) {
        assert_eq!(src.channel_count, dst.channel_count, "AudioBuffer::copy requires matching channel counts");

        let copyable = frames
            .min(src.frame_count.saturating_sub(src_offset))
            .min(dst.frame_count.saturating_sub(dst_offset));

        for ch in 0..dst.channel_count {
            let s = &src.channel(ch)[src_offset..src_offset + copyable];
            let d = &mut dst.channel_mut(ch)[dst_offset..dst_offset + copyable];
            d.copy_from_slice(s);
        }
    }

    fn assert_same_shape(&self, other: &AudioBuffer) {
        assert_eq!(self.frame_count, other.frame_count, "AudioBuffer shape mismatch");
        assert_eq!(self.channel_count, other.channel_count, "AudioBuffer shape mismatch");
    }

    pub fn add_assign(&mut self, other: &AudioBuffer) {
        self.assert_same_shape(other);
        for ch in 0..self.channel_count {
            let o = other.channel(ch).to_vec();
            let d = self.channel_mut(ch);
            for (a, b) in d.iter_mut().zip(o.iter()) {
                *a += *b;
            }
        }
    }

    pub fn sub_assign(&mut self, other: &AudioBuffer) {
        self.assert_same_shape(other);
        for ch in 0..self.channel_count {
            let o = other.channel(ch).to_vec();
            let d = self.channel_mut(ch);
            for (a, b) in d.iter_mut().zip(o.iter()) {
                *a -= *b;
            }
        }
    }

    pub fn mul_assign_buffer(&mut self, other: &AudioBuffer) {
        self.assert_same_shape(other);
        for ch in 0..self.channel_count {
            let o = other.channel(ch).to_vec();
            let d = self.channel_mut(ch);
            for (a, b) in d.iter_mut().zip(o.iter()) {
                *a *= *b;
            }
        }
    }

    pub fn mul_assign_scalar(&mut self, scalar: f32) {
        self.storage.as_mut_slice().iter_mut().for_each(|s| *s *= scalar);
    }
}

impl std::ops::AddAssign<&AudioBuffer> for AudioBuffer {
    fn add_assign(&mut self, rhs: &AudioBuffer) {
        AudioBuffer::add_assign(self, rhs);
    }
}

impl std::ops::SubAssign<&AudioBuffer> for AudioBuffer {
    fn sub_assign(&mut self, rhs: &AudioBuffer) {
        AudioBuffer::sub_assign(self, rhs);
    }
}

impl std::ops::MulAssign<&AudioBuffer> for AudioBuffer {
    fn mul_assign(&mut self, rhs: &AudioBuffer) {
        AudioBuffer::mul_assign_buffer(self, rhs);
    }
}

impl std::ops::MulAssign<f32> for AudioBuffer {
    fn mul_assign(&mut self, rhs: f32) {
        AudioBuffer::mul_assign_scalar(self, rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_aligned_and_sized() {
        let buf = AudioBuffer::new(100, 2).unwrap();
        for ch in 0..2 {
            let storage = buf.channel_storage(ch);
            let addr = storage.as_ptr() as usize;
            assert_eq!(addr % SIMD_ALIGNMENT, 0);
            assert!(storage.len() >= buf.frame_count());
            assert_eq!(storage.len() % SIMD_BLOCK_SIZE, 0);
        }
    }

    #[test]
    fn clear_zeroes_all_channels() {
        let mut buf = AudioBuffer::new(16, 2).unwrap();
        buf.channel_mut(0).fill(1.0);
        buf.channel_mut(1).fill(-1.0);
        buf.clear();
        assert!(buf.channel(0).iter().all(|&s| s == 0.0));
        assert!(buf.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn try_clone_is_deep_and_equal() {
        let mut buf = AudioBuffer::new(10, 2).unwrap();
        buf.channel_mut(0).fill(0.5);
        let clone = buf.try_clone().unwrap();
        assert_eq!(buf.channel(0), clone.channel(0));
        assert_eq!(buf.channel(1), clone.channel(1));
        assert_ne!(buf.channel_storage(0).as_ptr(), clone.channel_storage(0).as_ptr());
    }

    #[test]
    fn copy_round_trips() {
        let mut src = AudioBuffer::new(8, 1).unwrap();
        src.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let mut dst = AudioBuffer::new(8, 1).unwrap();
        AudioBuffer::copy(&src, 0, &mut dst, 0, 8);
        assert_eq!(src.channel(0), dst.channel(0));
    }

    #[test]
    fn copy_clips_to_destination_frame_count() {
        let mut src = AudioBuffer::new(8, 1).unwrap();
        src.channel_mut(0).fill(1.0);
        let mut dst = AudioBuffer::new(4, 1).unwrap();
        AudioBuffer::copy(&src, 0, &mut dst, 0, 8);
        assert_eq!(dst.channel(0), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn arithmetic_operators_work_elementwise() {
        let mut a = AudioBuffer::new(4, 1).unwrap();
        a.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let mut b = AudioBuffer::new(4, 1).unwrap();
        b.channel_mut(0).copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        a += &b;
        assert_eq!(a.channel(0), [2.0, 3.0, 4.0, 5.0]);

        a -= &b;
        assert_eq!(a.channel(0), [1.0, 2.0, 3.0, 4.0]);

        a *= 2.0;
        assert_eq!(a.channel(0), [2.0, 4.0, 6.0, 8.0]);

        a *= &b;
        assert_eq!(a.channel(0), [2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn zero_frame_buffer_is_valid() {
        let buf = AudioBuffer::new(0, 2).unwrap();
        assert_eq!(buf.frame_count(), 0);
        assert_eq!(buf.channel(0).len(), 0);
    }
}
