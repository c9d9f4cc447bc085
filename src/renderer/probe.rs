//! Probe tap: opt-in, non-consuming inspection of frames in flight.
//!
//! Subscribers reference-count the tap. While active, every submitted
//! buffer is wrapped in a read-only [`ProbedFrame`] and handed to the
//! delivery callback on the producer thread before it is queued. The frame
//! format is detected from the first buffer and never re-detected; if the
//! format cannot be probed, probing stays off for the rest of the session.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::renderer::device::{HardwareBuffer, Texture};
use crate::renderer::error::{RendererError, Result};
use crate::renderer::mapped::{MappedFrameBuffer, MappedPlane};
use crate::renderer::types::{MapMode, PixelFormat, Size};

/// Outcome of frame format detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFormat {
    /// No buffer has been inspected yet.
    Unknown,
    Detected { format: PixelFormat, byte_len: usize },
    /// Buffers cannot be probed; detection is not retried.
    PermanentlyInvalid,
}

pub struct ProbeTap {
    subscribers: AtomicU32,
    format: Mutex<ProbeFormat>,
}

impl ProbeTap {
    pub fn new() -> Self {
        Self {
            subscribers: AtomicU32::new(0),
            format: Mutex::new(ProbeFormat::Unknown),
        }
    }

    /// Register a subscriber.
    pub fn enable(&self) {
        self.subscribers.fetch_add(1, Ordering::AcqRel);
    }

    /// Unregister a subscriber. Unbalanced calls are ignored.
    pub fn disable(&self) {
        let result = self
            .subscribers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if result.is_err() {
            warn!("Probe disabled more often than enabled");
            debug_assert!(result.is_ok(), "unbalanced probe disable");
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscribers.load(Ordering::Acquire) > 0
    }

    pub fn subscriber_count(&self) -> u32 {
        self.subscribers.load(Ordering::Acquire)
    }

    pub fn format(&self) -> ProbeFormat {
        *self.format.lock()
    }

    /// Inspect `buffer` and, if its format is probeable, deliver a snapshot.
    ///
    /// Returns whether a snapshot was delivered. The buffer is only
    /// borrowed; the caller still owns it afterwards.
    pub fn on_buffer<B, F>(&self, buffer: &B, frame_size: Size, deliver: F) -> bool
    where
        B: HardwareBuffer,
        F: FnOnce(&mut ProbedFrame<'_, B>),
    {
        let state = {
            let mut format = self.format.lock();
            if *format == ProbeFormat::Unknown {
                *format = match detect_format(buffer) {
                    Ok((pixel_format, byte_len)) => {
                        debug!("Probe format detected: {pixel_format}, {byte_len} bytes");
                        ProbeFormat::Detected {
                            format: pixel_format,
                            byte_len,
                        }
                    }
                    Err(e) => {
                        warn!("Disabling frame probe for this session: {e}");
                        ProbeFormat::PermanentlyInvalid
                    }
                };
            }
            *format
        };

        let ProbeFormat::Detected { format, byte_len } = state else {
            return false;
        };
        let mut frame = ProbedFrame {
            mapped: MappedFrameBuffer::new(buffer, byte_len),
            size: frame_size,
            format,
        };
        deliver(&mut frame);
        true
    }
}

impl Default for ProbeTap {
    fn default() -> Self {
        Self::new()
    }
}

/// Determine the probe pixel format and byte length of a buffer.
fn detect_format<B: HardwareBuffer>(buffer: &B) -> Result<(PixelFormat, usize)> {
    let texture = buffer.texture()?;
    let desc = texture.desc();
    let format = PixelFormat::from_texture_format(desc.format).ok_or_else(|| {
        RendererError::Query(format!("unsupported camera probe format {:?}", desc.format))
    })?;
    let byte_len = buffer.contiguous_length()?;
    Ok((format, byte_len))
}

/// Read-only snapshot of a buffer in flight, valid during delivery only.
pub struct ProbedFrame<'a, B: HardwareBuffer> {
    mapped: MappedFrameBuffer<'a, B>,
    size: Size,
    format: PixelFormat,
}

impl<B: HardwareBuffer> ProbedFrame<'_, B> {
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Size of the frame contents in bytes.
    pub fn byte_len(&self) -> usize {
        self.mapped.byte_len()
    }

    pub fn map_mode(&self) -> MapMode {
        self.mapped.map_mode()
    }

    /// Map the frame for reading. Write modes are refused; the frame is
    /// still travelling to the renderer.
    pub fn map(&mut self, mode: MapMode) -> Option<MappedPlane<'_>> {
        if mode.is_writable() {
            return None;
        }
        self.mapped.map(mode)
    }

    pub fn unmap(&mut self) {
        self.mapped.unmap();
    }
}
