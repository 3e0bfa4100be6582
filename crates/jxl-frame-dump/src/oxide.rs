//! [`Decoder`] backed by jxl-oxide.
use std::collections::VecDeque;

use jxl_oxide::color::RenderingIntent;
use jxl_oxide::{EnumColourEncoding, InitializeResult, JxlImage, JxlThreadPool, UninitializedJxlImage};

use crate::decoder::{BasicInfo, Decoder, DecoderStatus, Events, ImageOut, Progress};
use crate::{Error, Result};

enum State {
    Header(UninitializedJxlImage),
    Loaded(JxlImage),
    Failed,
}

/// Incremental JPEG XL decoder.
///
/// jxl-oxide buffers every byte it is fed, so input is consumed as soon as it is supplied. Frames
/// are reported once their keyframe is fully loaded, and rendered rows are pushed as 8-bit RGBA.
pub struct JxlOxideDecoder {
    state: State,
    events: Events,
    pending: VecDeque<DecoderStatus>,
    info: Option<BasicInfo>,
    srgb_output: bool,
    next_keyframe: usize,
    frame_open: bool,
}

impl JxlOxideDecoder {
    pub fn new(pool: JxlThreadPool) -> Self {
        let uninit = JxlImage::builder().pool(pool).build_uninit();
        Self {
            state: State::Header(uninit),
            events: Events::empty(),
            pending: VecDeque::new(),
            info: None,
            srgb_output: false,
            next_keyframe: 0,
            frame_open: false,
        }
    }

    fn emit(&mut self, status: DecoderStatus) {
        if status.event().is_some_and(|event| self.events.contains(event)) {
            self.pending.push_back(status);
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<usize> {
        match std::mem::replace(&mut self.state, State::Failed) {
            State::Header(mut uninit) => {
                let consumed = uninit.feed_bytes(input).map_err(Error::Decode)?;
                match uninit.try_init().map_err(Error::Decode)? {
                    InitializeResult::NeedMoreData(uninit) => {
                        self.state = State::Header(uninit);
                    }
                    InitializeResult::Initialized(image) => {
                        let image = self.on_initialized(image)?;
                        self.state = State::Loaded(image);
                    }
                }
                Ok(consumed)
            }
            State::Loaded(mut image) => {
                let consumed = image.feed_bytes(input).map_err(Error::Decode)?;
                self.state = State::Loaded(image);
                Ok(consumed)
            }
            State::Failed => Err(Error::Protocol("decoder used after an error")),
        }
    }

    fn on_initialized(&mut self, mut image: JxlImage) -> Result<JxlImage> {
        let pixel_format = image.pixel_format();
        if pixel_format.has_black() {
            return Err(Error::UnsupportedPixelFormat("CMYK"));
        }

        let metadata = &image.image_header().metadata;
        let alpha_associated = metadata
            .ec_info
            .iter()
            .find_map(|ec| ec.alpha_associated());
        let info = BasicInfo {
            width: image.width(),
            height: image.height(),
            has_alpha: pixel_format.has_alpha(),
            alpha_premultiplied: alpha_associated.unwrap_or(false),
            grayscale: metadata.grayscale(),
            bits_per_sample: metadata.bit_depth.bits_per_sample(),
            animated: metadata.animation.is_some(),
        };
        tracing::debug!(colour_encoding = format_args!("{:?}", metadata.colour_encoding));

        // Color images without an embedded profile are converted to sRGB by the decoder itself.
        // Grayscale ones keep their encoding and go through the rendered ICC profile.
        self.srgb_output = image.original_icc().is_none() && !info.grayscale;
        if self.srgb_output {
            tracing::debug!("Setting target color encoding to sRGB");
            image.request_color_encoding(EnumColourEncoding::srgb(RenderingIntent::Relative));
        }

        tracing::debug!(?pixel_format, "Image initialized");
        self.info = Some(info);
        self.emit(DecoderStatus::BasicInfo);
        self.emit(DecoderStatus::ColorEncoding);
        Ok(image)
    }
}

impl Decoder for JxlOxideDecoder {
    fn subscribe(&mut self, events: Events) {
        self.events = events;
    }

    fn process_input(
        &mut self,
        input: &[u8],
        mut image_out: Option<&mut dyn ImageOut>,
    ) -> Result<Progress> {
        let consumed = if input.is_empty() { 0 } else { self.feed(input)? };

        loop {
            if let Some(status) = self.pending.pop_front() {
                return Ok(Progress::new(status, consumed));
            }

            let image = match &self.state {
                State::Header(_) => return Ok(Progress::new(DecoderStatus::NeedMoreInput, consumed)),
                State::Loaded(image) => image,
                State::Failed => return Err(Error::Protocol("decoder used after an error")),
            };

            if self.frame_open {
                let Some(image_out) = image_out.as_mut() else {
                    return Ok(Progress::new(DecoderStatus::NeedImageOutBuffer, consumed));
                };
                let keyframe = self.next_keyframe;
                let result = render_keyframe(image, keyframe, &mut **image_out);
                if let Err(e) = result {
                    self.state = State::Failed;
                    return Err(e);
                }
                self.frame_open = false;
                self.next_keyframe += 1;
                self.emit(DecoderStatus::FullImage);
                continue;
            }

            if self.next_keyframe < image.num_loaded_keyframes() {
                tracing::debug!(keyframe = self.next_keyframe, "Keyframe loaded");
                self.frame_open = true;
                self.emit(DecoderStatus::Frame);
                continue;
            }

            if image.is_loading_done() {
                return Ok(Progress::new(DecoderStatus::Success, consumed));
            }
            return Ok(Progress::new(DecoderStatus::NeedMoreInput, consumed));
        }
    }

    fn basic_info(&self) -> Result<BasicInfo> {
        self.info
            .clone()
            .ok_or(Error::Protocol("basic info requested before it is available"))
    }

    fn icc_profile(&self) -> Result<Option<Vec<u8>>> {
        let State::Loaded(image) = &self.state else {
            return Err(Error::FetchIcc(
                "color encoding requested before it is available".into(),
            ));
        };
        if self.srgb_output {
            return Ok(None);
        }
        Ok(Some(image.rendered_icc()))
    }

    fn set_parallelism_hint(&mut self, num_threads: usize) {
        // The thread pool is fixed once the decoder is built.
        tracing::debug!(num_threads, "Suggested number of threads");
    }
}

#[inline]
fn quantize(sample: f32) -> u8 {
    (sample * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

/// Renders a keyframe and pushes it row by row as 8-bit RGBA.
fn render_keyframe(image: &JxlImage, keyframe: usize, image_out: &mut dyn ImageOut) -> Result<()> {
    let _guard = tracing::trace_span!("Render keyframe", keyframe).entered();

    let render = image.render_frame(keyframe).map_err(Error::Render)?;
    let mut stream = render.stream();
    let width = stream.width() as usize;
    let height = stream.height() as usize;
    let channels = stream.channels() as usize;

    let has_alpha = image.pixel_format().has_alpha();
    let color_channels = channels.saturating_sub(has_alpha as usize);
    let grayscale = match color_channels {
        1 => true,
        3 => false,
        _ => return Err(Error::UnsupportedPixelFormat("unexpected number of channels")),
    };

    let mut samples = vec![0f32; width * channels];
    let mut row = vec![0u8; width * 4];
    for y in 0..height {
        let count = stream.write_to_buffer(&mut samples[..]);
        if count != samples.len() {
            return Err(Error::Protocol("rendered frame ended early"));
        }

        for (px, s) in row.chunks_exact_mut(4).zip(samples.chunks_exact(channels)) {
            if grayscale {
                px[..3].fill(quantize(s[0]));
            } else {
                px[0] = quantize(s[0]);
                px[1] = quantize(s[1]);
                px[2] = quantize(s[2]);
            }
            px[3] = if has_alpha {
                quantize(s[color_channels])
            } else {
                255
            };
        }
        image_out.write_pixels(0, y, &row)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn decoder() -> JxlOxideDecoder {
        let mut decoder = JxlOxideDecoder::new(JxlThreadPool::none());
        decoder.subscribe(crate::driver::SUBSCRIBED_EVENTS);
        decoder
    }

    #[test]
    fn needs_input_before_header() {
        let mut decoder = decoder();
        let progress = decoder.process_input(&[], None).unwrap();
        assert_eq!(progress, Progress::new(DecoderStatus::NeedMoreInput, 0));
        assert!(decoder.basic_info().is_err());
        assert_eq!(
            decoder.icc_profile().unwrap_err().kind(),
            ErrorKind::ColorProfile
        );
    }

    #[test]
    fn partial_signature_needs_more_input() {
        let mut decoder = decoder();
        let progress = decoder.process_input(&[0xff], None).unwrap();
        assert_eq!(progress.status, DecoderStatus::NeedMoreInput);
    }

    #[test]
    fn quantizes_samples() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), 255);
        assert_eq!(quantize(0.5), 128);
        assert_eq!(quantize(-0.2), 0);
        assert_eq!(quantize(1.7), 255);
        assert_eq!(quantize(f32::NAN), 0);
    }
}
