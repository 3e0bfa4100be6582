//! Decode driver: pumps input into a [`Decoder`] and reacts to its events.
use std::io::prelude::*;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::color::ColorProfile;
use crate::decoder::{Decoder, DecoderStatus, Events, ImageOut, Progress, suggest_num_threads};
use crate::frame::{FrameContext, ImageDescriptor};
use crate::input::InputChunk;
use crate::output::FrameEncoder;
use crate::{Error, Result};


/// Events the driver reacts to.
pub const SUBSCRIBED_EVENTS: Events = Events::BASIC_INFO
    .union(Events::COLOR_ENCODING)
    .union(Events::FRAME)
    .union(Events::FULL_IMAGE);

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Size of input chunks read from the file.
    pub chunk_size: NonZeroUsize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            chunk_size: InputChunk::DEFAULT_SIZE,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub frames_written: usize,
    pub bytes_read: u64,
    pub descriptor: Option<ImageDescriptor>,
}

/// Decoding state of a single input stream.
pub struct DecodeSession<D, R, E> {
    decoder: D,
    reader: R,
    encoder: E,
    input: InputChunk,
    events: Events,
    descriptor: Option<ImageDescriptor>,
    profile: Option<Arc<ColorProfile>>,
    color_encoding_seen: bool,
    frame: Option<FrameContext>,
    next_frame_index: usize,
    frames_written: usize,
}

impl<D, R, E> DecodeSession<D, R, E>
where
    D: Decoder,
    R: Read,
    E: FrameEncoder,
{
    pub fn new(decoder: D, reader: R, encoder: E, options: DriverOptions) -> Self {
        Self {
            decoder,
            reader,
            encoder,
            input: InputChunk::new(options.chunk_size),
            events: SUBSCRIBED_EVENTS,
            descriptor: None,
            profile: None,
            color_encoding_seen: false,
            frame: None,
            next_frame_index: 0,
            frames_written: 0,
        }
    }

    /// Runs the event loop until the decoder reports success or an error occurs.
    ///
    /// Frames completed before an error stay written; the frame in progress is dropped.
    pub fn run(mut self) -> Result<Summary> {
        let _guard = tracing::debug_span!("Decode session").entered();

        self.decoder.subscribe(self.events);
        loop {
            let image_out = self.frame.as_mut().map(|frame| frame as &mut dyn ImageOut);
            let Progress { status, consumed } =
                self.decoder.process_input(self.input.pending(), image_out)?;
            self.input.consume(consumed);
            tracing::trace!(?status, consumed, "Processed input");

            match status {
                DecoderStatus::NeedMoreInput => self.supply_input()?,
                DecoderStatus::NeedImageOutBuffer => {
                    return Err(Error::Protocol(
                        "decoder requested an output buffer outside of a frame",
                    ));
                }
                DecoderStatus::Success => {
                    if self.frame.is_some() {
                        return Err(Error::Protocol("decoding finished inside of a frame"));
                    }
                    break;
                }
                status => {
                    let subscribed = status
                        .event()
                        .is_some_and(|event| self.events.contains(event));
                    if !subscribed {
                        return Err(Error::UnexpectedStatus(status));
                    }
                    self.handle_event(status)?;
                }
            }
        }

        if self.descriptor.is_none() {
            tracing::warn!("Decoder finished without reporting basic info");
        }
        tracing::info!("success");
        Ok(Summary {
            frames_written: self.frames_written,
            bytes_read: self.input.total_read(),
            descriptor: self.descriptor,
        })
    }

    fn supply_input(&mut self) -> Result<()> {
        self.input.release();
        let count = self.input.fill(&mut self.reader).map_err(Error::ReadInput)?;
        if count == 0 {
            let bytes_read = self.input.total_read();
            return Err(if bytes_read == 0 {
                Error::EmptyInput
            } else {
                Error::Truncated { bytes_read }
            });
        }
        tracing::trace!(count, "Supplied input");
        Ok(())
    }

    fn handle_event(&mut self, status: DecoderStatus) -> Result<()> {
        match status {
            DecoderStatus::BasicInfo => self.on_basic_info(),
            DecoderStatus::ColorEncoding => self.on_color_encoding(),
            DecoderStatus::Frame => self.on_frame(),
            DecoderStatus::FullImage => self.on_full_image(),
            status => Err(Error::UnexpectedStatus(status)),
        }
    }

    fn on_basic_info(&mut self) -> Result<()> {
        if self.descriptor.is_some() {
            return Err(Error::Protocol("basic info reported twice"));
        }

        let info = self.decoder.basic_info()?;
        let descriptor = ImageDescriptor::from_basic_info(&info)?;
        tracing::info!("Image dimension: {}x{}", descriptor.width, descriptor.height);
        tracing::info!(
            "has alpha: {}, premul: {}",
            descriptor.has_alpha,
            descriptor.alpha_premultiplied
        );
        tracing::debug!(
            grayscale = info.grayscale,
            bits_per_sample = info.bits_per_sample,
            animated = info.animated
        );

        self.decoder
            .set_parallelism_hint(suggest_num_threads(descriptor.width, descriptor.height));
        self.descriptor = Some(descriptor);
        Ok(())
    }

    fn on_color_encoding(&mut self) -> Result<()> {
        // Frames are bound to the profile when they start.
        if self.frame.is_some() || self.next_frame_index > 0 {
            return Err(Error::Protocol("color encoding reported after frame data"));
        }
        if self.color_encoding_seen {
            return Err(Error::Protocol("color encoding reported twice"));
        }
        self.color_encoding_seen = true;

        match self.decoder.icc_profile()? {
            Some(icc) => {
                tracing::debug!(len = icc.len(), "Decoded pixels are described by ICC profile");
                let profile = ColorProfile::parse(&icc)?;
                self.profile = Some(Arc::new(profile));
            }
            None => {
                tracing::debug!("Decoded pixels are sRGB; color transform disabled");
                self.profile = None;
            }
        }
        Ok(())
    }

    fn on_frame(&mut self) -> Result<()> {
        let Some(descriptor) = self.descriptor else {
            return Err(Error::Protocol("frame started before basic info"));
        };
        if self.frame.is_some() {
            return Err(Error::Protocol("frame started before the previous one completed"));
        }

        let index = self.next_frame_index;
        tracing::debug!(index, "Frame started");
        self.frame = Some(FrameContext::new(index, descriptor, self.profile.clone())?);
        self.next_frame_index += 1;
        Ok(())
    }

    fn on_full_image(&mut self) -> Result<()> {
        let Some(frame) = self.frame.take() else {
            return Err(Error::Protocol("frame completed without being started"));
        };

        tracing::debug!(
            index = frame.index(),
            deliveries = frame.deliveries(),
            "Frame complete"
        );
        self.encoder
            .encode(frame.index(), frame.descriptor(), frame.pixels())?;
        self.frames_written += 1;
        Ok(())
    }
}
