use std::sync::Arc;

use crate::color::{ColorProfile, unpremultiply};
use crate::decoder::{BasicInfo, ImageOut};
use crate::{Error, Result};

/// Dimension and alpha layout shared by every frame of a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub alpha_premultiplied: bool,
}

impl ImageDescriptor {
    pub fn from_basic_info(info: &BasicInfo) -> Result<Self> {
        let BasicInfo {
            width,
            height,
            has_alpha,
            alpha_premultiplied,
            ..
        } = *info;
        let descriptor = Self {
            width,
            height,
            has_alpha,
            alpha_premultiplied: has_alpha && alpha_premultiplied,
        };
        if width == 0 || height == 0 || descriptor.buffer_len().is_none() {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(descriptor)
    }

    /// Bytes per output pixel: 4 with alpha, 3 without.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        if self.has_alpha { 4 } else { 3 }
    }

    /// Size of a frame buffer in bytes, or `None` if it overflows.
    pub fn buffer_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }
}

/// Output buffer of the frame being decoded, bound to the transform parameters of the stream.
///
/// Pixels pushed through [`ImageOut`] are converted to sRGB, unpremultiplied, and stored as
/// interleaved RGB or RGBA.
pub struct FrameContext {
    index: usize,
    descriptor: ImageDescriptor,
    profile: Option<Arc<ColorProfile>>,
    buf: Vec<u8>,
    src: Vec<[u8; 4]>,
    rgb: Vec<[u8; 3]>,
    gray: Vec<u8>,
    deliveries: usize,
}

impl std::fmt::Debug for FrameContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameContext")
            .field("index", &self.index)
            .field("descriptor", &self.descriptor)
            .field("profile", &self.profile)
            .field("deliveries", &self.deliveries)
            .finish_non_exhaustive()
    }
}

impl FrameContext {
    pub fn new(
        index: usize,
        descriptor: ImageDescriptor,
        profile: Option<Arc<ColorProfile>>,
    ) -> Result<Self> {
        let len = descriptor
            .buffer_len()
            .ok_or(Error::InvalidDimensions {
                width: descriptor.width,
                height: descriptor.height,
            })?;
        Ok(Self {
            index,
            descriptor,
            profile,
            buf: vec![0u8; len],
            src: Vec::new(),
            rgb: Vec::new(),
            gray: Vec::new(),
            deliveries: 0,
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Returns the number of pixel deliveries received so far.
    #[inline]
    pub fn deliveries(&self) -> usize {
        self.deliveries
    }

    /// Returns the interleaved output samples.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.buf
    }

    fn output_range(&self, x: usize, y: usize, num_pixels: usize) -> Option<std::ops::Range<usize>> {
        let width = self.descriptor.width as usize;
        let height = self.descriptor.height as usize;
        if y >= height || x.checked_add(num_pixels)? > width {
            return None;
        }

        let bpp = self.descriptor.bytes_per_pixel();
        let start = (y * width + x) * bpp;
        let end = start + num_pixels * bpp;
        (end <= self.buf.len()).then_some(start..end)
    }
}

impl ImageOut for FrameContext {
    fn write_pixels(&mut self, x: usize, y: usize, pixels: &[u8]) -> Result<()> {
        let num_pixels = pixels.len() / 4;
        let range = if pixels.len() % 4 == 0 {
            self.output_range(x, y, num_pixels)
        } else {
            None
        };
        let Some(range) = range else {
            return Err(Error::PixelOutOfBounds { x, y, num_pixels });
        };
        self.deliveries += 1;

        let premultiplied = self.descriptor.alpha_premultiplied;
        self.src.clear();
        self.src.extend(pixels.chunks_exact(4).map(|px| {
            let mut px = [px[0], px[1], px[2], px[3]];
            if premultiplied {
                unpremultiply(&mut px);
            }
            px
        }));

        if let Some(profile) = &self.profile {
            profile.transform_to_srgb(&self.src, &mut self.rgb, &mut self.gray);
            for (px, rgb) in self.src.iter_mut().zip(&self.rgb) {
                px[..3].copy_from_slice(rgb);
            }
        }

        let out = &mut self.buf[range];
        let bpp = self.descriptor.bytes_per_pixel();
        for (out, px) in out.chunks_exact_mut(bpp).zip(&self.src) {
            out.copy_from_slice(&px[..bpp]);
        }
        Ok(())
    }
}
