//! Software video backend: runs the renderer without a GPU.
//!
//! Textures are plain byte vectors, the video processor converts NV12,
//! YUY2, RGBA or BGRA sources into RGBA/BGRA targets on the CPU and scales
//! with `fast_image_resize` when sizes differ. Faults can be injected per
//! device and every pipeline object creation is counted, which makes this
//! backend the test double for the blitter and the renderer control.

use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use parking_lot::Mutex;

use crate::renderer::device::{GpuDevice, HardwareBuffer, LockedPlane, Texture, VideoDevice};
use crate::renderer::error::{RendererError, Result};
use crate::renderer::types::{nv12_chroma_len, ContentDesc, Size, TextureDesc, TextureFormat};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Operations that should fail on a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub video_unavailable: bool,
    pub open_shared: bool,
    pub enumerator: bool,
    pub processor: bool,
    pub output_view: bool,
    pub input_view: bool,
    pub blit: bool,
}

/// How many pipeline objects a device has created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftwareCounts {
    pub shared_opens: usize,
    pub enumerators: usize,
    pub processors: usize,
    pub output_views: usize,
    pub input_views: usize,
    pub blits: usize,
}

#[derive(Default)]
struct Counters {
    shared_opens: AtomicUsize,
    enumerators: AtomicUsize,
    processors: AtomicUsize,
    output_views: AtomicUsize,
    input_views: AtomicUsize,
    blits: AtomicUsize,
}

struct DeviceInner {
    id: u64,
    faults: Mutex<FaultPlan>,
    counters: Counters,
}

/// CPU-backed device handle. Clones refer to the same device.
#[derive(Clone)]
pub struct SoftwareDevice {
    inner: Arc<DeviceInner>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                id: next_id(),
                faults: Mutex::new(FaultPlan::default()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Replace the set of failing operations.
    pub fn set_faults(&self, plan: FaultPlan) {
        *self.inner.faults.lock() = plan;
    }

    pub fn counts(&self) -> SoftwareCounts {
        let c = &self.inner.counters;
        SoftwareCounts {
            shared_opens: c.shared_opens.load(Ordering::Relaxed),
            enumerators: c.enumerators.load(Ordering::Relaxed),
            processors: c.processors.load(Ordering::Relaxed),
            output_views: c.output_views.load(Ordering::Relaxed),
            input_views: c.input_views.load(Ordering::Relaxed),
            blits: c.blits.load(Ordering::Relaxed),
        }
    }

    /// Create a zero-filled texture.
    pub fn create_texture(&self, desc: TextureDesc, shareable: bool) -> SoftwareTexture {
        self.create_texture_with_data(desc, Vec::new(), shareable)
    }

    /// Create a texture with initial contents, padded or truncated to the
    /// size its description requires.
    pub fn create_texture_with_data(
        &self,
        desc: TextureDesc,
        mut data: Vec<u8>,
        shareable: bool,
    ) -> SoftwareTexture {
        data.resize(desc.format.byte_len(desc.width, desc.height), 0);
        SoftwareTexture::from_parts(self.clone(), desc, Arc::new(Mutex::new(data)), shareable)
    }

    fn faults(&self) -> FaultPlan {
        *self.inner.faults.lock()
    }

    fn counters(&self) -> &Counters {
        &self.inner.counters
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for SoftwareDevice {
    type Texture = SoftwareTexture;
    type SharedHandle = SoftwareSharedHandle;
    type Video = SoftwareVideo;

    fn same_device(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn open_shared_texture(&self, handle: &SoftwareSharedHandle) -> Result<SoftwareTexture> {
        if self.faults().open_shared {
            return Err(RendererError::OpenSharedResource(
                "injected failure".to_string(),
            ));
        }
        self.counters().shared_opens.fetch_add(1, Ordering::Relaxed);
        Ok(SoftwareTexture::from_parts(
            self.clone(),
            handle.desc,
            Arc::clone(&handle.pixels),
            true,
        ))
    }

    fn video_device(&self) -> Result<SoftwareVideo> {
        if self.faults().video_unavailable {
            return Err(RendererError::VideoInterface(format!(
                "device {} has no video processor",
                self.id()
            )));
        }
        Ok(SoftwareVideo {
            device: self.clone(),
        })
    }
}

struct TextureInner {
    id: u64,
    desc: TextureDesc,
    device: SoftwareDevice,
    pixels: Arc<Mutex<Vec<u8>>>,
    shareable: bool,
}

/// CPU-backed texture handle. Clones refer to the same texture; textures
/// opened from a shared handle alias the same pixels.
#[derive(Clone)]
pub struct SoftwareTexture {
    inner: Arc<TextureInner>,
}

impl SoftwareTexture {
    fn from_parts(
        device: SoftwareDevice,
        desc: TextureDesc,
        pixels: Arc<Mutex<Vec<u8>>>,
        shareable: bool,
    ) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                id: next_id(),
                desc,
                device,
                pixels,
                shareable,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Copy of the texture contents. Blocks while the texture is locked.
    pub fn read_pixels(&self) -> Vec<u8> {
        self.inner.pixels.lock().clone()
    }

    /// Overwrite the texture contents (truncated to the texture size).
    pub fn write_pixels(&self, data: &[u8]) {
        let mut pixels = self.inner.pixels.lock();
        let len = pixels.len().min(data.len());
        pixels[..len].copy_from_slice(&data[..len]);
    }

    fn aliases(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner.pixels, &other.inner.pixels)
    }
}

impl Texture for SoftwareTexture {
    type Device = SoftwareDevice;

    fn desc(&self) -> TextureDesc {
        self.inner.desc
    }

    fn device(&self) -> SoftwareDevice {
        self.inner.device.clone()
    }

    fn shared_handle(&self) -> Result<SoftwareSharedHandle> {
        if !self.inner.shareable {
            return Err(RendererError::SharedHandle(format!(
                "texture {} was not created shareable",
                self.inner.id
            )));
        }
        Ok(SoftwareSharedHandle {
            desc: self.inner.desc,
            pixels: Arc::clone(&self.inner.pixels),
        })
    }

    fn same_resource(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Cross-device reference to a software texture's pixels.
pub struct SoftwareSharedHandle {
    desc: TextureDesc,
    pixels: Arc<Mutex<Vec<u8>>>,
}

/// Video processing interface of a [`SoftwareDevice`].
pub struct SoftwareVideo {
    device: SoftwareDevice,
}

pub struct SoftwareEnumerator {
    content: ContentDesc,
}

pub struct SoftwareProcessor {
    content: ContentDesc,
    rate_conversion_index: u32,
}

impl SoftwareProcessor {
    pub fn content(&self) -> &ContentDesc {
        &self.content
    }

    pub fn rate_conversion_index(&self) -> u32 {
        self.rate_conversion_index
    }
}

pub struct SoftwareInputView {
    source: SoftwareTexture,
}

pub struct SoftwareOutputView {
    target: SoftwareTexture,
}

impl VideoDevice for SoftwareVideo {
    type Texture = SoftwareTexture;
    type Enumerator = SoftwareEnumerator;
    type Processor = SoftwareProcessor;
    type InputView = SoftwareInputView;
    type OutputView = SoftwareOutputView;

    fn create_processor_enumerator(&self, desc: &ContentDesc) -> Result<SoftwareEnumerator> {
        if self.device.faults().enumerator {
            return Err(RendererError::Enumerator("injected failure".to_string()));
        }
        if desc.input_size.is_empty() || desc.output_size.is_empty() {
            return Err(RendererError::Enumerator(format!(
                "empty content size {} -> {}",
                desc.input_size, desc.output_size
            )));
        }
        self.device
            .counters()
            .enumerators
            .fetch_add(1, Ordering::Relaxed);
        Ok(SoftwareEnumerator { content: *desc })
    }

    fn create_processor(
        &self,
        enumerator: &SoftwareEnumerator,
        rate_conversion_index: u32,
    ) -> Result<SoftwareProcessor> {
        if self.device.faults().processor {
            return Err(RendererError::Processor("injected failure".to_string()));
        }
        self.device
            .counters()
            .processors
            .fetch_add(1, Ordering::Relaxed);
        Ok(SoftwareProcessor {
            content: enumerator.content,
            rate_conversion_index,
        })
    }

    fn create_output_view(
        &self,
        target: &SoftwareTexture,
        _enumerator: &SoftwareEnumerator,
    ) -> Result<SoftwareOutputView> {
        if self.device.faults().output_view {
            return Err(RendererError::OutputView("injected failure".to_string()));
        }
        match target.desc().format {
            TextureFormat::Rgba8Typeless | TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm => {}
            other => {
                return Err(RendererError::OutputView(format!(
                    "cannot render into {other:?} texture"
                )))
            }
        }
        self.device
            .counters()
            .output_views
            .fetch_add(1, Ordering::Relaxed);
        Ok(SoftwareOutputView {
            target: target.clone(),
        })
    }

    fn create_input_view(
        &self,
        source: &SoftwareTexture,
        _enumerator: &SoftwareEnumerator,
    ) -> Result<SoftwareInputView> {
        if self.device.faults().input_view {
            return Err(RendererError::InputView("injected failure".to_string()));
        }
        self.device
            .counters()
            .input_views
            .fetch_add(1, Ordering::Relaxed);
        Ok(SoftwareInputView {
            source: source.clone(),
        })
    }

    fn blit(
        &self,
        _processor: &SoftwareProcessor,
        output: &SoftwareOutputView,
        input: &SoftwareInputView,
    ) -> Result<()> {
        if self.device.faults().blit {
            return Err(RendererError::Blit("injected failure".to_string()));
        }
        if input.source.aliases(&output.target) {
            return Err(RendererError::Blit(
                "source and target share the same surface".to_string(),
            ));
        }

        let source_desc = input.source.desc();
        let rgba = {
            let pixels = input
                .source
                .inner
                .pixels
                .try_lock()
                .ok_or_else(|| RendererError::Blit("source texture is locked".to_string()))?;
            to_rgba(&pixels, source_desc)?
        };

        let target_desc = output.target.desc();
        let scaled = if source_desc.size() == target_desc.size() {
            rgba
        } else {
            resize_rgba(rgba, source_desc.size(), target_desc.size())?
        };
        let packed = match target_desc.format {
            TextureFormat::Bgra8Unorm => swap_red_blue(scaled),
            _ => scaled,
        };

        let mut target = output
            .target
            .inner
            .pixels
            .try_lock()
            .ok_or_else(|| RendererError::Blit("target texture is locked".to_string()))?;
        if target.len() != packed.len() {
            return Err(RendererError::Blit(format!(
                "target holds {} bytes, converted frame has {}",
                target.len(),
                packed.len()
            )));
        }
        target.copy_from_slice(&packed);
        self.device.counters().blits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Convert a texture's contents to tightly packed RGBA.
fn to_rgba(data: &[u8], desc: TextureDesc) -> Result<Vec<u8>> {
    let width = desc.width as usize;
    let height = desc.height as usize;
    let rgba = match desc.format {
        TextureFormat::Rgba8Typeless | TextureFormat::Rgba8Unorm => {
            data.get(..width * height * 4).map(<[u8]>::to_vec).unwrap_or_default()
        }
        TextureFormat::Bgra8Unorm => data
            .get(..width * height * 4)
            .map(|bgra| swap_red_blue(bgra.to_vec()))
            .unwrap_or_default(),
        TextureFormat::Nv12 => convert_nv12_to_rgba(data, width, height),
        TextureFormat::Yuy2 if width % 2 != 0 => {
            return Err(RendererError::Blit(format!(
                "YUY2 source width {width} is not even"
            )))
        }
        TextureFormat::Yuy2 => convert_yuy2_to_rgba(data, width, height),
    };
    if rgba.is_empty() {
        return Err(RendererError::Blit(format!(
            "{:?} source of {} holds only {} bytes",
            desc.format,
            desc.size(),
            data.len()
        )));
    }
    Ok(rgba)
}

fn resize_rgba(rgba: Vec<u8>, from: Size, to: Size) -> Result<Vec<u8>> {
    let src = Image::from_vec_u8(from.width, from.height, rgba, PixelType::U8x4)
        .map_err(|e| RendererError::Blit(format!("invalid source image: {e}")))?;
    let mut dst = Image::new(to.width, to.height, PixelType::U8x4);
    Resizer::new()
        .resize(
            &src,
            &mut dst,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )
        .map_err(|e| RendererError::Blit(format!("resize failed: {e}")))?;
    Ok(dst.buffer().to_vec())
}

fn swap_red_blue(mut pixels: Vec<u8>) -> Vec<u8> {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    pixels
}

/// Bytes per row of a tightly packed texture.
fn row_pitch(desc: TextureDesc) -> usize {
    let width = desc.width as usize;
    match desc.format {
        TextureFormat::Rgba8Typeless | TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm => {
            width * 4
        }
        TextureFormat::Nv12 => width,
        TextureFormat::Yuy2 => width * 2,
    }
}

/// Convert NV12 planar data to RGBA.
///
/// NV12 stores a full-resolution Y plane followed by an interleaved UV plane
/// at half resolution in both dimensions, rounded up for odd sizes. Uses
/// BT.601 conversion with fixed-point integer arithmetic (<<8). Alpha is
/// opaque.
pub fn convert_nv12_to_rgba(nv12: &[u8], width: usize, height: usize) -> Vec<u8> {
    let luma_len = width * height;
    let expected = luma_len + nv12_chroma_len(width, height);
    if nv12.len() < expected || width == 0 || height == 0 {
        return Vec::new();
    }

    let y_plane = &nv12[..luma_len];
    let uv_plane = &nv12[luma_len..expected];
    let uv_stride = width.div_ceil(2) * 2;

    let mut rgba = vec![0u8; luma_len * 4];
    for row in 0..height {
        for col in 0..width {
            let y = y_plane[row * width + col] as i32;
            let uv_index = (row / 2) * uv_stride + (col / 2) * 2;
            let u = uv_plane[uv_index] as i32 - 128;
            let v = uv_plane[uv_index + 1] as i32 - 128;

            let base = (row * width + col) * 4;
            rgba[base] = ((y * 256 + 359 * v) >> 8).clamp(0, 255) as u8;
            rgba[base + 1] = ((y * 256 - 88 * u - 183 * v) >> 8).clamp(0, 255) as u8;
            rgba[base + 2] = ((y * 256 + 454 * u) >> 8).clamp(0, 255) as u8;
            rgba[base + 3] = 255;
        }
    }
    rgba
}

/// Convert YUY2 (YUYV) packed data to RGBA. Odd widths yield an empty
/// vector; a pixel pair shares one chroma sample.
pub fn convert_yuy2_to_rgba(yuy2: &[u8], width: usize, height: usize) -> Vec<u8> {
    let expected = width * height * 2;
    if yuy2.len() < expected || width == 0 || height == 0 || width % 2 != 0 {
        return Vec::new();
    }

    let mut rgba = vec![0u8; width * height * 4];
    for i in 0..(width * height / 2) {
        let y0 = yuy2[i * 4] as i32;
        let u = yuy2[i * 4 + 1] as i32 - 128;
        let y1 = yuy2[i * 4 + 2] as i32;
        let v = yuy2[i * 4 + 3] as i32 - 128;

        let base = i * 8;
        for (offset, y) in [(0, y0), (4, y1)] {
            rgba[base + offset] = ((y * 256 + 359 * v) >> 8).clamp(0, 255) as u8;
            rgba[base + offset + 1] = ((y * 256 - 88 * u - 183 * v) >> 8).clamp(0, 255) as u8;
            rgba[base + offset + 2] = ((y * 256 + 454 * u) >> 8).clamp(0, 255) as u8;
            rgba[base + offset + 3] = 255;
        }
    }
    rgba
}

/// Camera frame buffer backed by a software texture.
pub struct SoftwareFrameBuffer {
    texture: SoftwareTexture,
    texture_output: bool,
    locked: AtomicBool,
    lock_count: AtomicUsize,
    fail_lock: AtomicBool,
    fail_unlock: AtomicBool,
    releases: Option<Arc<AtomicUsize>>,
}

impl SoftwareFrameBuffer {
    pub fn new(texture: SoftwareTexture) -> Self {
        Self {
            texture,
            texture_output: true,
            locked: AtomicBool::new(false),
            lock_count: AtomicUsize::new(0),
            fail_lock: AtomicBool::new(false),
            fail_unlock: AtomicBool::new(false),
            releases: None,
        }
    }

    /// Buffer whose every byte is `value`.
    pub fn filled(device: &SoftwareDevice, size: Size, format: TextureFormat, value: u8) -> Self {
        let desc = TextureDesc {
            width: size.width,
            height: size.height,
            format,
        };
        let data = vec![value; format.byte_len(size.width, size.height)];
        Self::new(device.create_texture_with_data(desc, data, false))
    }

    /// Buffer that reports no texture output, like system-memory samples.
    pub fn without_texture_output(mut self) -> Self {
        self.texture_output = false;
        self
    }

    /// Increment `counter` when the buffer is released.
    pub fn with_release_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.releases = Some(counter);
        self
    }

    pub fn software_texture(&self) -> &SoftwareTexture {
        &self.texture
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Number of successful `lock_2d` calls.
    pub fn lock_count(&self) -> usize {
        self.lock_count.load(Ordering::Relaxed)
    }

    /// Copy of the buffer contents. Blocks while the buffer is locked.
    pub fn read_bytes(&self) -> Vec<u8> {
        self.texture.read_pixels()
    }

    pub fn fail_lock(&self, fail: bool) {
        self.fail_lock.store(fail, Ordering::Relaxed);
    }

    pub fn fail_unlock(&self, fail: bool) {
        self.fail_unlock.store(fail, Ordering::Relaxed);
    }
}

// SAFETY: `lock_2d` holds the pixel mutex (its guard is forgotten) until
// `unlock_2d` or drop releases it, so the returned plane is exclusive and
// the vector cannot be reallocated meanwhile.
unsafe impl HardwareBuffer for SoftwareFrameBuffer {
    type Device = SoftwareDevice;

    fn texture(&self) -> Result<SoftwareTexture> {
        if !self.texture_output {
            return Err(RendererError::TextureUnavailable(
                "buffer lives in system memory".to_string(),
            ));
        }
        Ok(self.texture.clone())
    }

    fn contiguous_length(&self) -> Result<usize> {
        let desc = self.texture.desc();
        Ok(desc.format.byte_len(desc.width, desc.height))
    }

    fn lock_2d(&self) -> Result<LockedPlane> {
        if self.fail_lock.load(Ordering::Relaxed) {
            return Err(RendererError::Lock("injected failure".to_string()));
        }
        let mut pixels = self
            .texture
            .inner
            .pixels
            .try_lock()
            .ok_or_else(|| RendererError::Lock("buffer is already locked".to_string()))?;
        let len = pixels.len();
        let data = NonNull::new(pixels.as_mut_ptr())
            .ok_or_else(|| RendererError::Lock("buffer has no storage".to_string()))?;
        mem::forget(pixels);

        self.locked.store(true, Ordering::Release);
        self.lock_count.fetch_add(1, Ordering::Relaxed);
        Ok(LockedPlane {
            data,
            len,
            stride: row_pitch(self.texture.desc()),
        })
    }

    fn unlock_2d(&self) -> Result<()> {
        if self.fail_unlock.load(Ordering::Relaxed) {
            return Err(RendererError::Unlock("injected failure".to_string()));
        }
        if !self.locked.swap(false, Ordering::AcqRel) {
            return Err(RendererError::Unlock("buffer is not locked".to_string()));
        }
        // SAFETY: `locked` was set, so `lock_2d` forgot a guard of this mutex.
        unsafe { self.texture.inner.pixels.force_unlock() };
        Ok(())
    }
}

impl Drop for SoftwareFrameBuffer {
    fn drop(&mut self) {
        if self.locked.swap(false, Ordering::AcqRel) {
            // SAFETY: see `unlock_2d`.
            unsafe { self.texture.inner.pixels.force_unlock() };
        }
        if let Some(releases) = &self.releases {
            releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            width,
            height,
            format: TextureFormat::Rgba8Typeless,
        }
    }

    #[test]
    fn converts_nv12_grey_to_opaque_rgba() {
        let nv12 = vec![128, 128, 128, 128, 128, 128];
        let out = convert_nv12_to_rgba(&nv12, 2, 2);
        assert_eq!(out.len(), 16);
        for pixel in out.chunks(4) {
            assert_eq!(pixel, [128, 128, 128, 255]);
        }
    }

    #[test]
    fn nv12_undersized_buffer_returns_empty() {
        assert!(convert_nv12_to_rgba(&[0u8; 5], 2, 2).is_empty());
        assert!(convert_nv12_to_rgba(&[], 0, 0).is_empty());
    }

    #[test]
    fn converts_yuy2_white_pixel_pair() {
        let out = convert_yuy2_to_rgba(&[235, 128, 235, 128], 2, 1);
        assert_eq!(out, vec![235, 235, 235, 255, 235, 235, 235, 255]);
    }

    #[test]
    fn yuy2_undersized_buffer_returns_empty() {
        assert!(convert_yuy2_to_rgba(&[0u8; 3], 2, 1).is_empty());
    }

    #[test]
    fn converts_odd_sized_nv12() {
        let nv12 = vec![128u8; TextureFormat::Nv12.byte_len(3, 3)];
        let out = convert_nv12_to_rgba(&nv12, 3, 3);
        assert_eq!(out.len(), 36);
        for pixel in out.chunks(4) {
            assert_eq!(pixel, [128, 128, 128, 255]);
        }
    }

    #[test]
    fn nv12_with_half_sized_chroma_for_odd_width_returns_empty() {
        // 3x2 luma plus a chroma row sized for width 2
        assert!(convert_nv12_to_rgba(&[128u8; 9], 3, 2).is_empty());
    }

    #[test]
    fn yuy2_odd_width_returns_empty() {
        assert!(convert_yuy2_to_rgba(&[128u8; 6], 3, 1).is_empty());
    }

    #[test]
    fn blit_odd_sized_nv12_frame() {
        let device = SoftwareDevice::new();
        let video = device.video_device().unwrap();
        let frame = SoftwareFrameBuffer::filled(&device, Size::new(3, 2), TextureFormat::Nv12, 128);
        let source = frame.texture().unwrap();
        let target = device.create_texture(rgba(3, 2), true);

        let enumerator = video
            .create_processor_enumerator(&ContentDesc::progressive(Size::new(3, 2)))
            .unwrap();
        let processor = video.create_processor(&enumerator, 0).unwrap();
        let output = video.create_output_view(&target, &enumerator).unwrap();
        let input = video.create_input_view(&source, &enumerator).unwrap();
        video.blit(&processor, &output, &input).unwrap();

        for pixel in target.read_pixels().chunks(4) {
            assert_eq!(pixel, [128, 128, 128, 255]);
        }
    }

    #[test]
    fn blit_rejects_odd_width_yuy2_source() {
        let device = SoftwareDevice::new();
        let video = device.video_device().unwrap();
        let frame = SoftwareFrameBuffer::filled(&device, Size::new(3, 2), TextureFormat::Yuy2, 128);
        let source = frame.texture().unwrap();
        let target = device.create_texture(rgba(3, 2), true);

        let enumerator = video
            .create_processor_enumerator(&ContentDesc::progressive(Size::new(3, 2)))
            .unwrap();
        let processor = video.create_processor(&enumerator, 0).unwrap();
        let output = video.create_output_view(&target, &enumerator).unwrap();
        let input = video.create_input_view(&source, &enumerator).unwrap();

        let result = video.blit(&processor, &output, &input);
        assert!(matches!(result, Err(RendererError::Blit(_))));
        assert!(target.read_pixels().iter().all(|&b| b == 0));
        assert_eq!(device.counts().blits, 0);
    }

    #[test]
    fn same_device_compares_handles() {
        let device = SoftwareDevice::new();
        assert!(device.same_device(&device.clone()));
        assert!(!device.same_device(&SoftwareDevice::new()));
    }

    #[test]
    fn opened_shared_texture_aliases_pixels() {
        let owner = SoftwareDevice::new();
        let other = SoftwareDevice::new();
        let texture = owner.create_texture(rgba(1, 1), true);
        let opened = other
            .open_shared_texture(&texture.shared_handle().unwrap())
            .unwrap();

        opened.write_pixels(&[1, 2, 3, 4]);
        assert_eq!(texture.read_pixels(), vec![1, 2, 3, 4]);
        assert!(!opened.same_resource(&texture));
        assert!(opened.device().same_device(&other));
    }

    #[test]
    fn texture_data_is_padded_to_description() {
        let device = SoftwareDevice::new();
        let texture = device.create_texture_with_data(rgba(2, 1), vec![9], false);
        assert_eq!(texture.read_pixels(), vec![9, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn blit_scales_to_target_size() {
        let device = SoftwareDevice::new();
        let video = device.video_device().unwrap();
        let source = device.create_texture_with_data(rgba(2, 2), [200, 200, 200, 255].repeat(4), false);
        let target = device.create_texture(rgba(4, 4), true);

        let enumerator = video
            .create_processor_enumerator(&ContentDesc::progressive(Size::new(2, 2)))
            .unwrap();
        let processor = video.create_processor(&enumerator, 0).unwrap();
        let output = video.create_output_view(&target, &enumerator).unwrap();
        let input = video.create_input_view(&source, &enumerator).unwrap();
        video.blit(&processor, &output, &input).unwrap();

        let pixels = target.read_pixels();
        assert_eq!(pixels.len(), 64);
        for pixel in pixels.chunks(4) {
            assert!(pixel[..3].iter().all(|&c| c.abs_diff(200) <= 1), "{pixel:?}");
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn blit_into_bgra_target_swaps_channels() {
        let device = SoftwareDevice::new();
        let video = device.video_device().unwrap();
        let source = device.create_texture_with_data(rgba(1, 1), vec![10, 20, 30, 255], false);
        let target = device.create_texture(
            TextureDesc {
                width: 1,
                height: 1,
                format: TextureFormat::Bgra8Unorm,
            },
            false,
        );

        let enumerator = video
            .create_processor_enumerator(&ContentDesc::progressive(Size::new(1, 1)))
            .unwrap();
        let processor = video.create_processor(&enumerator, 0).unwrap();
        let output = video.create_output_view(&target, &enumerator).unwrap();
        let input = video.create_input_view(&source, &enumerator).unwrap();
        video.blit(&processor, &output, &input).unwrap();

        assert_eq!(target.read_pixels(), vec![30, 20, 10, 255]);
    }

    #[test]
    fn output_view_rejects_yuv_targets() {
        let device = SoftwareDevice::new();
        let video = device.video_device().unwrap();
        let enumerator = video
            .create_processor_enumerator(&ContentDesc::progressive(Size::new(2, 2)))
            .unwrap();
        let target = device.create_texture(
            TextureDesc {
                width: 2,
                height: 2,
                format: TextureFormat::Nv12,
            },
            true,
        );
        assert!(matches!(
            video.create_output_view(&target, &enumerator),
            Err(RendererError::OutputView(_))
        ));
    }

    #[test]
    fn enumerator_rejects_empty_content() {
        let device = SoftwareDevice::new();
        let video = device.video_device().unwrap();
        let result = video.create_processor_enumerator(&ContentDesc::progressive(Size::new(0, 4)));
        assert!(result.is_err());
    }

    #[test]
    fn lock_is_exclusive_until_unlock() {
        let device = SoftwareDevice::new();
        let buffer = SoftwareFrameBuffer::filled(&device, Size::new(2, 2), TextureFormat::Nv12, 1);

        let plane = buffer.lock_2d().unwrap();
        assert_eq!(plane.len, 6);
        assert_eq!(plane.stride, 2);
        assert!(buffer.lock_2d().is_err());

        buffer.unlock_2d().unwrap();
        assert!(buffer.unlock_2d().is_err());
        assert!(buffer.lock_2d().is_ok());
        buffer.unlock_2d().unwrap();
    }

    #[test]
    fn dropping_locked_buffer_releases_texture() {
        let device = SoftwareDevice::new();
        let buffer = SoftwareFrameBuffer::filled(&device, Size::new(2, 2), TextureFormat::Nv12, 7);
        let texture = buffer.software_texture().clone();
        buffer.lock_2d().unwrap();
        drop(buffer);
        assert_eq!(texture.read_pixels(), vec![7; 6]);
    }

    #[test]
    fn release_counter_tracks_drops() {
        let device = SoftwareDevice::new();
        let releases = Arc::new(AtomicUsize::new(0));
        let buffer = SoftwareFrameBuffer::filled(&device, Size::new(2, 2), TextureFormat::Nv12, 0)
            .with_release_counter(Arc::clone(&releases));
        drop(buffer);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn system_memory_buffer_has_no_texture() {
        let device = SoftwareDevice::new();
        let buffer = SoftwareFrameBuffer::filled(&device, Size::new(2, 2), TextureFormat::Nv12, 0)
            .without_texture_output();
        assert!(matches!(
            buffer.texture(),
            Err(RendererError::TextureUnavailable(_))
        ));
    }

    #[test]
    fn software_types_are_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        fn assert_send<T: Send>() {}
        assert_send_sync::<SoftwareDevice>();
        assert_send_sync::<SoftwareTexture>();
        assert_send::<SoftwareFrameBuffer>();
        assert_send::<SoftwareVideo>();
    }
}
