//! Event-driven decoder interface consumed by the decode driver.
//!
//! A [`Decoder`] is pumped with [`process_input`][Decoder::process_input]. Each call consumes some
//! of the supplied bytes and reports a single [`DecoderStatus`]. Pixels of the current frame are
//! pushed synchronously into the [`ImageOut`] passed to the same call.
use crate::Result;

/// Status reported by [`Decoder::process_input`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DecoderStatus {
    /// Supplied bytes are exhausted; supply more input.
    NeedMoreInput,
    /// The decoder has pixels to deliver but no [`ImageOut`] was given.
    NeedImageOutBuffer,
    /// Image dimensions and alpha metadata are available.
    BasicInfo,
    /// Color encoding of the decoded pixels is available.
    ColorEncoding,
    /// A new frame starts; pixels of the frame will follow.
    Frame,
    /// All pixels of the current frame are delivered.
    FullImage,
    /// Decoding is finished.
    Success,
}

impl DecoderStatus {
    /// Returns the subscribable event this status corresponds to, if any.
    pub fn event(self) -> Option<Events> {
        match self {
            Self::BasicInfo => Some(Events::BASIC_INFO),
            Self::ColorEncoding => Some(Events::COLOR_ENCODING),
            Self::Frame => Some(Events::FRAME),
            Self::FullImage => Some(Events::FULL_IMAGE),
            Self::NeedMoreInput | Self::NeedImageOutBuffer | Self::Success => None,
        }
    }
}

/// Set of decoder events to be reported.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Events(u8);

impl Events {
    pub const BASIC_INFO: Self = Self(1);
    pub const COLOR_ENCODING: Self = Self(1 << 1);
    pub const FRAME: Self = Self(1 << 2);
    pub const FULL_IMAGE: Self = Self(1 << 3);

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Events {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Result of a single [`Decoder::process_input`] call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Progress {
    pub status: DecoderStatus,
    /// Number of bytes consumed from the supplied input.
    pub consumed: usize,
}

impl Progress {
    #[inline]
    pub fn new(status: DecoderStatus, consumed: usize) -> Self {
        Self { status, consumed }
    }
}

/// Stream-level metadata reported with [`DecoderStatus::BasicInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicInfo {
    /// Width with orientation applied.
    pub width: u32,
    /// Height with orientation applied.
    pub height: u32,
    pub has_alpha: bool,
    pub alpha_premultiplied: bool,
    pub grayscale: bool,
    pub bits_per_sample: u32,
    pub animated: bool,
}

/// Receiver of decoded pixels.
pub trait ImageOut {
    /// Receives contiguous 8-bit RGBA pixels starting at `(x, y)`.
    ///
    /// `pixels.len() / 4` is the number of pixels delivered.
    fn write_pixels(&mut self, x: usize, y: usize, pixels: &[u8]) -> Result<()>;
}

/// Pull decoder driven by [`DecodeSession`][crate::driver::DecodeSession].
pub trait Decoder {
    /// Selects the events reported by [`process_input`][Self::process_input].
    fn subscribe(&mut self, events: Events);

    /// Advances decoding using `input`.
    ///
    /// Bytes not reported as consumed must be supplied again in the next call. `image_out`, if
    /// given, receives pixels of the current frame.
    fn process_input(
        &mut self,
        input: &[u8],
        image_out: Option<&mut dyn ImageOut>,
    ) -> Result<Progress>;

    /// Returns stream metadata. Valid after [`DecoderStatus::BasicInfo`].
    fn basic_info(&self) -> Result<BasicInfo>;

    /// Returns the ICC profile describing delivered pixels, or `None` if pixels are sRGB.
    ///
    /// Valid after [`DecoderStatus::ColorEncoding`].
    fn icc_profile(&self) -> Result<Option<Vec<u8>>>;

    /// Hints how many threads are worth using for an image.
    fn set_parallelism_hint(&mut self, num_threads: usize) {
        tracing::trace!(num_threads, "Parallelism hint ignored");
    }
}

impl<D: Decoder + ?Sized> Decoder for &mut D {
    #[inline]
    fn subscribe(&mut self, events: Events) {
        (**self).subscribe(events)
    }

    #[inline]
    fn process_input(
        &mut self,
        input: &[u8],
        image_out: Option<&mut dyn ImageOut>,
    ) -> Result<Progress> {
        (**self).process_input(input, image_out)
    }

    #[inline]
    fn basic_info(&self) -> Result<BasicInfo> {
        (**self).basic_info()
    }

    #[inline]
    fn icc_profile(&self) -> Result<Option<Vec<u8>>> {
        (**self).icc_profile()
    }

    #[inline]
    fn set_parallelism_hint(&mut self, num_threads: usize) {
        (**self).set_parallelism_hint(num_threads)
    }
}

/// Suggests the number of worker threads for an image, roughly one per 256x256 group.
pub fn suggest_num_threads(width: u32, height: u32) -> usize {
    let groups = (width as u64 * height as u64) / (256 * 256);
    groups.clamp(1, u32::MAX as u64) as usize
}
