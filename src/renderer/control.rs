//! Renderer control: hands camera buffers from the capture thread to the
//! presentation thread.
//!
//! The capture thread calls [`RendererControl::submit_buffer`]; the
//! presentation thread polls [`RendererControl::render`] once per tick.
//! Neither call blocks: a full queue drops the newest buffer and an empty
//! queue makes `render` return `false`. After every render the control asks
//! the capture side for the next buffer through the "buffer requested"
//! callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use crate::diagnostics::stats::{PipelineSnapshot, PipelineStats};
use crate::renderer::blitter::Blitter;
use crate::renderer::device::{HardwareBuffer, Texture, TextureOf};
use crate::renderer::error::Result;
use crate::renderer::probe::{ProbeFormat, ProbeTap, ProbedFrame};
use crate::renderer::queue::RingQueue;
use crate::renderer::types::Size;
use crate::settings::types::RendererSettings;

/// Callback fired when the renderer wants another buffer.
pub type BufferRequestedCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving probe snapshots on the capture thread.
pub type FrameProbedCallback<B> = Arc<dyn Fn(&mut ProbedFrame<'_, B>) + Send + Sync>;

pub struct RendererControl<B: HardwareBuffer> {
    queue: RingQueue<B>,
    probe: ProbeTap,
    /// Only touched by the presentation thread; the lock is uncontended.
    blitter: Mutex<Option<Blitter<B::Device>>>,
    surface_attached: AtomicBool,
    frame_size: Mutex<Size>,
    buffer_requested: RwLock<Vec<BufferRequestedCallback>>,
    frame_probed: RwLock<Vec<FrameProbedCallback<B>>>,
    stats: PipelineStats,
}

impl<B: HardwareBuffer> RendererControl<B> {
    pub fn new(settings: &RendererSettings) -> Self {
        Self {
            queue: RingQueue::new(),
            probe: ProbeTap::new(),
            blitter: Mutex::new(None),
            surface_attached: AtomicBool::new(settings.surface_attached),
            frame_size: Mutex::new(settings.frame_size),
            buffer_requested: RwLock::new(Vec::new()),
            frame_probed: RwLock::new(Vec::new()),
            stats: PipelineStats::new(),
        }
    }

    /// Register a callback for "buffer requested".
    ///
    /// Fires on the presentation thread after every `render`, and on the
    /// capture thread when a buffer is drained with no surface attached.
    pub fn on_buffer_requested(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.buffer_requested.write().push(Arc::new(callback));
    }

    /// Register a probe subscriber callback. Fires on the capture thread
    /// while the probe is enabled.
    pub fn on_frame_probed(
        &self,
        callback: impl Fn(&mut ProbedFrame<'_, B>) + Send + Sync + 'static,
    ) {
        let callback: FrameProbedCallback<B> = Arc::new(callback);
        self.frame_probed.write().push(callback);
    }

    /// Present the oldest queued buffer on `target`.
    ///
    /// Returns `Ok(false)` when there was nothing to show. An error means the
    /// blitter could not be created for this device and target, which is
    /// not expected to recover.
    pub fn render(&self, target: &TextureOf<B>) -> Result<bool> {
        let Some(buffer) = self.queue.dequeue() else {
            self.stats.record_idle_poll();
            self.request_buffer();
            return Ok(false);
        };

        let source = match buffer.texture() {
            Ok(texture) => texture,
            Err(e) => {
                warn!("Aborting rendering of camera frame: {e}");
                self.request_buffer();
                return Ok(false);
            }
        };
        let device = source.device();

        let mut slot = self.blitter.lock();
        let blitter = match slot.take() {
            Some(blitter) if blitter.matches(&device, target) => blitter,
            stale => {
                // Release the old pipeline before building its replacement
                drop(stale);
                let blitter = Blitter::new(device, target.clone()).map_err(|e| {
                    error!("Failed to create video blitter: {e}");
                    e
                })?;
                self.stats.record_blitter_build();
                blitter
            }
        };
        let blitter = slot.insert(blitter);

        if let Err(e) = blitter.blit(&source) {
            warn!("Failed to blit camera frame: {e}");
            self.stats.record_blit_failure();
        }
        drop(slot);
        drop(buffer);

        self.stats.record_render();
        self.request_buffer();
        Ok(true)
    }

    /// Hand a buffer from the capture source to the renderer.
    ///
    /// Probes the buffer first when the probe is enabled. If the queue is
    /// full the buffer is dropped. Without an attached surface the oldest
    /// buffer is drained right away so the source keeps delivering.
    pub fn submit_buffer(&self, buffer: B) {
        self.stats.record_submit();

        if self.probe.is_active() {
            self.probe_buffer(&buffer);
        }

        if let Err(dropped) = self.queue.enqueue(buffer) {
            trace!("Frame queue full, dropping newest buffer");
            self.stats.record_drop();
            drop(dropped);
            return;
        }

        if !self.has_surface() {
            drop(self.queue.dequeue());
            self.request_buffer();
        }
    }

    /// Release every queued buffer. The cached blitter is kept.
    ///
    /// Must not race with `render`; the caller stops presentation first.
    pub fn discard(&self) {
        debug!("Discarding {} queued camera buffers", self.queue.len());
        self.queue.clear();
    }

    /// Add a probe subscriber.
    pub fn enable_probe(&self) {
        self.probe.enable();
    }

    /// Remove a probe subscriber.
    pub fn disable_probe(&self) {
        self.probe.disable();
    }

    pub fn is_probe_active(&self) -> bool {
        self.probe.is_active()
    }

    pub fn probe_format(&self) -> ProbeFormat {
        self.probe.format()
    }

    pub fn attach_surface(&self) {
        self.surface_attached.store(true, Ordering::Release);
    }

    pub fn detach_surface(&self) {
        self.surface_attached.store(false, Ordering::Release);
    }

    pub fn has_surface(&self) -> bool {
        self.surface_attached.load(Ordering::Acquire)
    }

    /// Size reported for probed frames.
    pub fn frame_size(&self) -> Size {
        *self.frame_size.lock()
    }

    pub fn set_frame_size(&self, size: Size) {
        *self.frame_size.lock() = size;
    }

    /// Number of buffers waiting to be rendered.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn has_blitter(&self) -> bool {
        self.blitter.lock().is_some()
    }

    pub fn diagnostics(&self) -> PipelineSnapshot {
        self.stats.snapshot()
    }

    fn probe_buffer(&self, buffer: &B) {
        let size = self.frame_size();
        let listeners = self.frame_probed.read().clone();
        let delivered = self.probe.on_buffer(buffer, size, |frame| {
            for listener in &listeners {
                listener(&mut *frame);
                frame.unmap();
            }
        });
        if delivered {
            self.stats.record_probe();
        }
    }

    fn request_buffer(&self) {
        let callbacks = self.buffer_requested.read().clone();
        for callback in &callbacks {
            callback();
        }
    }
}

impl<B: HardwareBuffer> Default for RendererControl<B> {
    fn default() -> Self {
        Self::new(&RendererSettings::default())
    }
}

impl<B: HardwareBuffer> Drop for RendererControl<B> {
    fn drop(&mut self) {
        self.queue.clear();
        self.blitter.get_mut().take();
    }
}
