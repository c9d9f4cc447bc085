use std::ptr::NonNull;

use crate::renderer::error::Result;
use crate::renderer::types::{ContentDesc, TextureDesc};

/// Platform-agnostic GPU device contract.
///
/// Implementations are cheap, cloneable handles (like a COM pointer):
/// cloning shares the same underlying device and `same_device` compares
/// handle identity, not configuration.
pub trait GpuDevice: Clone + Send + Sync + 'static {
    /// Texture handle type created by this device.
    type Texture: Texture<Device = Self>;

    /// Cross-device reference to a texture's underlying surface.
    type SharedHandle;

    /// Video processing interface of this device.
    type Video: VideoDevice<Texture = Self::Texture>;

    /// Whether `other` refers to the same device.
    fn same_device(&self, other: &Self) -> bool;

    /// Open a surface shared by another device (or this one) as a texture
    /// owned by this device.
    fn open_shared_texture(&self, handle: &Self::SharedHandle) -> Result<Self::Texture>;

    /// Query the video processing interface.
    fn video_device(&self) -> Result<Self::Video>;
}

/// A hardware-resident 2D texture.
pub trait Texture: Clone + Send + Sync + 'static {
    type Device: GpuDevice;

    fn desc(&self) -> TextureDesc;

    /// Device that owns this texture.
    fn device(&self) -> Self::Device;

    /// Handle through which other devices can open this surface.
    fn shared_handle(&self) -> Result<<Self::Device as GpuDevice>::SharedHandle>;

    /// Whether `other` refers to the same texture object.
    fn same_resource(&self, other: &Self) -> bool;
}

/// Format conversion and composite engine of a device.
///
/// Every created object is bound to the enumerator it was created from.
/// The blit converts the input view's texture into the output view's
/// texture in a single operation.
pub trait VideoDevice: Send + 'static {
    type Texture;
    type Enumerator: Send;
    type Processor: Send;
    type InputView;
    type OutputView: Send;

    fn create_processor_enumerator(&self, desc: &ContentDesc) -> Result<Self::Enumerator>;

    fn create_processor(
        &self,
        enumerator: &Self::Enumerator,
        rate_conversion_index: u32,
    ) -> Result<Self::Processor>;

    fn create_output_view(
        &self,
        target: &Self::Texture,
        enumerator: &Self::Enumerator,
    ) -> Result<Self::OutputView>;

    fn create_input_view(
        &self,
        source: &Self::Texture,
        enumerator: &Self::Enumerator,
    ) -> Result<Self::InputView>;

    fn blit(
        &self,
        processor: &Self::Processor,
        output: &Self::OutputView,
        input: &Self::InputView,
    ) -> Result<()>;
}

/// CPU-visible region of a locked hardware buffer.
#[derive(Debug, Clone, Copy)]
pub struct LockedPlane {
    pub data: NonNull<u8>,
    pub len: usize,
    /// Bytes per row.
    pub stride: usize,
}

/// A hardware-resident 2D frame buffer delivered by the capture source.
///
/// Values of this type are owned handles: moving one transfers ownership
/// of the buffer, dropping it releases the buffer back to the source.
///
/// # Safety
///
/// A successful `lock_2d` must return a plane whose `data` is valid for
/// reads and writes of `len` bytes, and not accessed by anyone else, until
/// the matching `unlock_2d` call. Safe code builds slices from it.
pub unsafe trait HardwareBuffer: Send + 'static {
    type Device: GpuDevice;

    /// Texture backing this buffer, if it supports texture output.
    fn texture(&self) -> Result<<Self::Device as GpuDevice>::Texture>;

    /// Size in bytes of the buffer in contiguous form.
    fn contiguous_length(&self) -> Result<usize>;

    fn lock_2d(&self) -> Result<LockedPlane>;

    fn unlock_2d(&self) -> Result<()>;
}

/// Texture type of a buffer's device.
pub type TextureOf<B> = <<B as HardwareBuffer>::Device as GpuDevice>::Texture;
