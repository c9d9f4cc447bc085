use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Storage format of a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Typeless,
    Rgba8Unorm,
    Bgra8Unorm,
    Nv12,
    Yuy2,
}

impl TextureFormat {
    /// Bytes needed for a tightly packed image of this format.
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Rgba8Typeless | Self::Rgba8Unorm | Self::Bgra8Unorm => pixels * 4,
            Self::Nv12 => pixels + nv12_chroma_len(width as usize, height as usize),
            Self::Yuy2 => pixels * 2,
        }
    }
}

/// Bytes of the interleaved UV plane of an NV12 image. Odd dimensions round
/// up, the last chroma sample covers a single column or row.
pub fn nv12_chroma_len(width: usize, height: usize) -> usize {
    width.div_ceil(2) * 2 * height.div_ceil(2)
}

/// Description of a 2D texture, as reported by the device layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl TextureDesc {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Pixel format of a probed video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelFormat {
    Argb32,
    Nv12,
}

impl PixelFormat {
    /// Map a texture format onto the pixel formats probe subscribers
    /// understand. `None` means the format cannot be probed.
    pub fn from_texture_format(format: TextureFormat) -> Option<Self> {
        match format {
            TextureFormat::Rgba8Typeless => Some(Self::Argb32),
            TextureFormat::Nv12 => Some(Self::Nv12),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argb32 => write!(f, "ARGB32"),
            Self::Nv12 => write!(f, "NV12"),
        }
    }
}

/// CPU access mode of a mapped frame buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MapMode {
    #[default]
    NotMapped,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl MapMode {
    pub fn is_writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Interlacing of the frames fed to a video processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Progressive,
}

/// Intended use of a video processor, a hint for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoUsage {
    PlaybackNormal,
}

/// Stream description used to configure a video processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentDesc {
    pub frame_format: FrameFormat,
    pub input_size: Size,
    pub output_size: Size,
    pub usage: VideoUsage,
}

impl ContentDesc {
    /// Progressive content converted at its native size.
    pub fn progressive(size: Size) -> Self {
        Self {
            frame_format: FrameFormat::Progressive,
            input_size: size,
            output_size: size,
            usage: VideoUsage::PlaybackNormal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_formats_map_from_texture_formats() {
        assert_eq!(
            PixelFormat::from_texture_format(TextureFormat::Rgba8Typeless),
            Some(PixelFormat::Argb32)
        );
        assert_eq!(
            PixelFormat::from_texture_format(TextureFormat::Nv12),
            Some(PixelFormat::Nv12)
        );
    }

    #[test]
    fn other_texture_formats_cannot_be_probed() {
        assert_eq!(PixelFormat::from_texture_format(TextureFormat::Bgra8Unorm), None);
        assert_eq!(PixelFormat::from_texture_format(TextureFormat::Rgba8Unorm), None);
        assert_eq!(PixelFormat::from_texture_format(TextureFormat::Yuy2), None);
    }

    #[test]
    fn byte_len_matches_packed_layouts() {
        assert_eq!(TextureFormat::Rgba8Typeless.byte_len(4, 2), 32);
        assert_eq!(TextureFormat::Nv12.byte_len(4, 2), 12);
        assert_eq!(TextureFormat::Yuy2.byte_len(4, 2), 16);
    }

    #[test]
    fn nv12_chroma_rounds_odd_dimensions_up() {
        assert_eq!(TextureFormat::Nv12.byte_len(3, 2), 6 + 4);
        assert_eq!(TextureFormat::Nv12.byte_len(3, 3), 9 + 8);
        assert_eq!(TextureFormat::Nv12.byte_len(1, 1), 1 + 2);
    }

    #[test]
    fn progressive_content_keeps_native_size() {
        let desc = ContentDesc::progressive(Size::new(1280, 720));
        assert_eq!(desc.input_size, desc.output_size);
        assert_eq!(desc.frame_format, FrameFormat::Progressive);
        assert_eq!(desc.usage, VideoUsage::PlaybackNormal);
    }

    #[test]
    fn only_write_modes_are_writable() {
        assert!(!MapMode::NotMapped.is_writable());
        assert!(!MapMode::ReadOnly.is_writable());
        assert!(MapMode::WriteOnly.is_writable());
        assert!(MapMode::ReadWrite.is_writable());
    }

    #[test]
    fn size_displays_as_dimensions() {
        assert_eq!(Size::new(640, 480).to_string(), "640x480");
        assert!(Size::new(0, 480).is_empty());
    }

    #[test]
    fn size_serialises_to_json() {
        let json = serde_json::to_value(Size::new(1920, 1080)).unwrap();
        assert_eq!(json["width"], 1920);
        assert_eq!(json["height"], 1080);
    }
}
