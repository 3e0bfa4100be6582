use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::frame::ImageDescriptor;
use crate::{Error, Result};

/// Consumer of completed frames.
pub trait FrameEncoder {
    /// Encodes a complete frame. `pixels` is interleaved 8-bit RGB or RGBA as described by
    /// `descriptor`.
    fn encode(&mut self, index: usize, descriptor: &ImageDescriptor, pixels: &[u8]) -> Result<()>;
}

impl<E: FrameEncoder + ?Sized> FrameEncoder for &mut E {
    #[inline]
    fn encode(&mut self, index: usize, descriptor: &ImageDescriptor, pixels: &[u8]) -> Result<()> {
        (**self).encode(index, descriptor, pixels)
    }
}

/// Writes each frame to `{index:02}.png` inside the output directory.
#[derive(Debug)]
pub struct PngFrameWriter {
    output_dir: PathBuf,
}

impl PngFrameWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_owned();
        std::fs::create_dir_all(&output_dir).map_err(Error::CreateOutputDir)?;
        Ok(Self { output_dir })
    }

    /// Returns the path the frame with the given index is written to.
    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("{index:02}.png"))
    }
}

impl FrameEncoder for PngFrameWriter {
    fn encode(&mut self, index: usize, descriptor: &ImageDescriptor, pixels: &[u8]) -> Result<()> {
        let path = self.frame_path(index);
        let _guard = tracing::debug_span!("Write frame", index, path = %path.display()).entered();

        let result = std::fs::File::create(&path).and_then(|file| {
            let mut output = std::io::BufWriter::new(file);
            write_png(&mut output, descriptor, pixels)?;
            output.flush()
        });

        if let Err(source) = result {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!(%e, "Failed to remove incomplete output file");
                }
            }
            return Err(Error::WriteImage { path, source });
        }

        tracing::info!("Saved frame {index} to {}", path.display());
        Ok(())
    }
}

pub(crate) fn write_png<W: Write>(
    output: W,
    descriptor: &ImageDescriptor,
    pixels: &[u8],
) -> std::io::Result<()> {
    let mut encoder = png::Encoder::new(output, descriptor.width, descriptor.height);

    let color_type = if descriptor.has_alpha {
        png::ColorType::Rgba
    } else {
        png::ColorType::Rgb
    };
    encoder.set_color(color_type);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_source_srgb(png::SrgbRenderingIntent::Perceptual);
    encoder.validate_sequence(true);

    let mut writer = encoder.write_header()?;

    tracing::debug!(?color_type, "Writing image data");
    writer.write_image_data(pixels)?;
    writer.finish()?;
    Ok(())
}
