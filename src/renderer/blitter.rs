//! Video blitter: converts camera textures onto a presentation target.
//!
//! A blitter is bound to one (device, target) pair. The conversion
//! pipeline (enumerator, processor, output view) is built on the first blit
//! and cached for the blitter's lifetime; only the input view is created per
//! frame.

use tracing::debug;

use crate::renderer::device::{GpuDevice, Texture, VideoDevice};
use crate::renderer::error::Result;
use crate::renderer::types::ContentDesc;

type Enumerator<D> = <<D as GpuDevice>::Video as VideoDevice>::Enumerator;
type Processor<D> = <<D as GpuDevice>::Video as VideoDevice>::Processor;
type OutputView<D> = <<D as GpuDevice>::Video as VideoDevice>::OutputView;

pub struct Blitter<D: GpuDevice> {
    device: D,
    /// Target as handed in by the presentation driver, kept for identity.
    target: D::Texture,
    /// Target opened on `device` through its shared handle.
    target_texture: D::Texture,
    video: D::Video,
    content: Option<ContentDesc>,
    enumerator: Option<Enumerator<D>>,
    processor: Option<Processor<D>>,
    output_view: Option<OutputView<D>>,
}

impl<D: GpuDevice> Blitter<D> {
    /// Bind a blitter to `target` on `device`.
    ///
    /// Fails if the target cannot be shared with `device` or the device has
    /// no video processing support. Callers treat this as fatal.
    pub fn new(device: D, target: D::Texture) -> Result<Self> {
        let handle = target.shared_handle()?;
        let target_texture = device.open_shared_texture(&handle)?;
        let video = device.video_device()?;
        debug!(
            "Created video blitter for {}x{} target",
            target.desc().width,
            target.desc().height
        );
        Ok(Self {
            device,
            target,
            target_texture,
            video,
            content: None,
            enumerator: None,
            processor: None,
            output_view: None,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn target(&self) -> &D::Texture {
        &self.target
    }

    /// Whether this blitter was built for exactly this device and target.
    pub fn matches(&self, device: &D, target: &D::Texture) -> bool {
        self.device.same_device(device) && self.target.same_resource(target)
    }

    /// Content description the pipeline was configured with, once built.
    pub fn content(&self) -> Option<&ContentDesc> {
        self.content.as_ref()
    }

    /// Convert `source` into the target.
    ///
    /// On error the target keeps its previous contents and any pipeline
    /// objects built so far stay cached for the next attempt.
    pub fn blit(&mut self, source: &D::Texture) -> Result<()> {
        let enumerator = match self.enumerator.take() {
            Some(enumerator) => enumerator,
            None => {
                let content = ContentDesc::progressive(source.desc().size());
                let enumerator = self.video.create_processor_enumerator(&content)?;
                self.content = Some(content);
                enumerator
            }
        };
        let enumerator = &*self.enumerator.insert(enumerator);

        let processor = match self.processor.take() {
            Some(processor) => processor,
            None => self.video.create_processor(enumerator, 0)?,
        };
        let processor = &*self.processor.insert(processor);

        let output_view = match self.output_view.take() {
            Some(view) => view,
            None => self
                .video
                .create_output_view(&self.target_texture, enumerator)?,
        };
        let output_view = &*self.output_view.insert(output_view);

        let input_view = self.video.create_input_view(source, enumerator)?;
        self.video.blit(processor, output_view, &input_view)
    }
}

impl<D: GpuDevice> Drop for Blitter<D> {
    fn drop(&mut self) {
        // Views and processor reference the enumerator; release them first.
        self.output_view = None;
        self.processor = None;
        self.enumerator = None;
    }
}
