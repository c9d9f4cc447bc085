//! Exclusive CPU mapping of a hardware frame buffer.

use std::marker::PhantomData;
use std::ptr::NonNull;

use tracing::warn;

use crate::renderer::device::HardwareBuffer;
use crate::renderer::types::MapMode;

/// Borrowed view of a hardware buffer that can be mapped into CPU memory
/// one mapping at a time.
///
/// The buffer is unlocked when the view is dropped, even if `unmap` was
/// never called.
pub struct MappedFrameBuffer<'a, B: HardwareBuffer> {
    buffer: &'a B,
    byte_len: usize,
    mode: MapMode,
}

/// Bytes of a mapped buffer, valid while the mapping is held.
pub struct MappedPlane<'m> {
    data: NonNull<u8>,
    len: usize,
    stride: usize,
    byte_len: usize,
    mode: MapMode,
    _mapping: PhantomData<&'m mut ()>,
}

impl<'a, B: HardwareBuffer> MappedFrameBuffer<'a, B> {
    pub fn new(buffer: &'a B, byte_len: usize) -> Self {
        Self {
            buffer,
            byte_len,
            mode: MapMode::NotMapped,
        }
    }

    pub fn map_mode(&self) -> MapMode {
        self.mode
    }

    /// Declared size of the buffer contents in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Lock the buffer for CPU access.
    ///
    /// Returns `None` if already mapped, if `mode` is `NotMapped`, or if the
    /// lock fails.
    pub fn map(&mut self, mode: MapMode) -> Option<MappedPlane<'_>> {
        if self.mode != MapMode::NotMapped || mode == MapMode::NotMapped {
            return None;
        }

        let plane = match self.buffer.lock_2d() {
            Ok(plane) => plane,
            Err(e) => {
                warn!("Failed to lock camera frame buffer: {e}");
                return None;
            }
        };
        self.mode = mode;
        Some(MappedPlane {
            data: plane.data,
            len: plane.len,
            stride: plane.stride,
            byte_len: self.byte_len,
            mode,
            _mapping: PhantomData,
        })
    }

    /// Unlock the buffer. No-op when not mapped; a failed unlock leaves the
    /// mapping in place.
    pub fn unmap(&mut self) {
        if self.mode == MapMode::NotMapped {
            return;
        }
        if let Err(e) = self.buffer.unlock_2d() {
            warn!("Failed to unlock camera frame buffer: {e}");
            return;
        }
        self.mode = MapMode::NotMapped;
    }
}

impl<B: HardwareBuffer> Drop for MappedFrameBuffer<'_, B> {
    fn drop(&mut self) {
        self.unmap();
    }
}

impl MappedPlane<'_> {
    /// Mapped bytes.
    pub fn data(&self) -> &[u8] {
        // SAFETY: `HardwareBuffer` guarantees `len` valid bytes until unlock,
        // and unlocking needs the `&mut` borrow this plane holds.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// Mapped bytes for writing, when the map mode allows it.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        if !self.mode.is_writable() {
            return None;
        }
        // SAFETY: as in `data`; `&mut self` makes this the only live slice.
        Some(unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.len) })
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Declared size of the frame contents in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::software::{SoftwareDevice, SoftwareFrameBuffer};
    use crate::renderer::types::{Size, TextureFormat};

    fn nv12_buffer() -> SoftwareFrameBuffer {
        let device = SoftwareDevice::new();
        SoftwareFrameBuffer::filled(&device, Size::new(4, 2), TextureFormat::Nv12, 0x40)
    }

    #[test]
    fn maps_buffer_with_requested_mode() {
        let buffer = nv12_buffer();
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        {
            let plane = mapped.map(MapMode::ReadOnly).unwrap();
            assert_eq!(plane.data().len(), 12);
            assert_eq!(plane.data()[0], 0x40);
            assert_eq!(plane.stride(), 4);
            assert_eq!(plane.byte_len(), 12);
        }
        assert_eq!(mapped.map_mode(), MapMode::ReadOnly);
        assert!(buffer.is_locked());
    }

    #[test]
    fn rejects_second_map_while_mapped() {
        let buffer = nv12_buffer();
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        assert!(mapped.map(MapMode::ReadOnly).is_some());
        assert!(mapped.map(MapMode::ReadOnly).is_none());
        assert_eq!(buffer.lock_count(), 1);
    }

    #[test]
    fn rejects_not_mapped_mode() {
        let buffer = nv12_buffer();
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        assert!(mapped.map(MapMode::NotMapped).is_none());
        assert_eq!(buffer.lock_count(), 0);
    }

    #[test]
    fn unmap_is_idempotent() {
        let buffer = nv12_buffer();
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        mapped.map(MapMode::ReadOnly);
        mapped.unmap();
        mapped.unmap();
        assert_eq!(mapped.map_mode(), MapMode::NotMapped);
        assert!(!buffer.is_locked());
    }

    #[test]
    fn can_remap_after_unmap() {
        let buffer = nv12_buffer();
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        mapped.map(MapMode::ReadOnly);
        mapped.unmap();
        assert!(mapped.map(MapMode::ReadWrite).is_some());
        assert_eq!(buffer.lock_count(), 2);
    }

    #[test]
    fn drop_unlocks_forgotten_mapping() {
        let buffer = nv12_buffer();
        {
            let mut mapped = MappedFrameBuffer::new(&buffer, 12);
            mapped.map(MapMode::ReadOnly);
            assert!(buffer.is_locked());
        }
        assert!(!buffer.is_locked());
    }

    #[test]
    fn read_only_plane_refuses_writes() {
        let buffer = nv12_buffer();
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        let mut plane = mapped.map(MapMode::ReadOnly).unwrap();
        assert!(plane.data_mut().is_none());
    }

    #[test]
    fn writable_plane_updates_buffer() {
        let buffer = nv12_buffer();
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        {
            let mut plane = mapped.map(MapMode::WriteOnly).unwrap();
            plane.data_mut().unwrap()[0] = 0xEE;
        }
        mapped.unmap();
        assert_eq!(buffer.read_bytes()[0], 0xEE);
    }

    #[test]
    fn failed_lock_leaves_buffer_unmapped() {
        let buffer = nv12_buffer();
        buffer.fail_lock(true);
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        assert!(mapped.map(MapMode::ReadOnly).is_none());
        assert_eq!(mapped.map_mode(), MapMode::NotMapped);
    }

    #[test]
    fn failed_unlock_keeps_mapping() {
        let buffer = nv12_buffer();
        let mut mapped = MappedFrameBuffer::new(&buffer, 12);
        mapped.map(MapMode::ReadOnly);
        buffer.fail_unlock(true);
        mapped.unmap();
        assert_eq!(mapped.map_mode(), MapMode::ReadOnly);

        buffer.fail_unlock(false);
        mapped.unmap();
        assert_eq!(mapped.map_mode(), MapMode::NotMapped);
    }
}
