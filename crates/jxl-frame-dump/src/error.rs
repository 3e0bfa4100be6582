use std::path::PathBuf;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    OpenInput(std::io::Error),
    ReadInput(std::io::Error),
    EmptyInput,
    CreateOutputDir(std::io::Error),
    Decode(BoxError),
    Render(BoxError),
    Truncated {
        bytes_read: u64,
    },
    UnsupportedPixelFormat(&'static str),
    InvalidDimensions {
        width: u32,
        height: u32,
    },
    Protocol(&'static str),
    PixelOutOfBounds {
        x: usize,
        y: usize,
        num_pixels: usize,
    },
    FetchIcc(BoxError),
    ParseIcc(lcms2::Error),
    UnsupportedColorSpace(lcms2::ColorSpaceSignature),
    CreateTransform(lcms2::Error),
    WriteImage {
        path: PathBuf,
        source: std::io::Error,
    },
    UnexpectedStatus(crate::decoder::DecoderStatus),
}

/// Failure class of an [`Error`], used to pick the process exit code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Decode,
    ColorProfile,
    Encode,
    Internal,
}

impl ErrorKind {
    #[inline]
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Io => 2,
            ErrorKind::Decode => 3,
            ErrorKind::ColorProfile => 4,
            ErrorKind::Encode => 5,
            ErrorKind::Internal => 70,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OpenInput(_)
            | Error::ReadInput(_)
            | Error::EmptyInput
            | Error::CreateOutputDir(_) => ErrorKind::Io,
            Error::Decode(_)
            | Error::Render(_)
            | Error::Truncated { .. }
            | Error::UnsupportedPixelFormat(_)
            | Error::InvalidDimensions { .. }
            | Error::Protocol(_)
            | Error::PixelOutOfBounds { .. } => ErrorKind::Decode,
            Error::FetchIcc(_)
            | Error::ParseIcc(_)
            | Error::UnsupportedColorSpace(_)
            | Error::CreateTransform(_) => ErrorKind::ColorProfile,
            Error::WriteImage { .. } => ErrorKind::Encode,
            Error::UnexpectedStatus(_) => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::OpenInput(e) => write!(f, "failed opening input file: {e}"),
            Error::ReadInput(e) => write!(f, "failed reading input file: {e}"),
            Error::EmptyInput => write!(f, "input file is empty"),
            Error::CreateOutputDir(e) => write!(f, "failed creating output directory: {e}"),
            Error::Decode(e) => write!(f, "failed decoding JPEG XL image: {e}"),
            Error::Render(e) => write!(f, "failed to render frame: {e}"),
            Error::Truncated { bytes_read } => {
                write!(f, "input ended after {bytes_read} bytes before the image was complete")
            }
            Error::UnsupportedPixelFormat(format) => {
                write!(f, "unsupported pixel format: {format}")
            }
            Error::InvalidDimensions { width, height } => {
                write!(f, "invalid image dimension {width}x{height}")
            }
            Error::Protocol(msg) => write!(f, "unexpected decoder event: {msg}"),
            Error::PixelOutOfBounds { x, y, num_pixels } => write!(
                f,
                "decoder delivered {num_pixels} pixels at ({x}, {y}), outside of frame buffer"
            ),
            Error::FetchIcc(e) => write!(f, "failed fetching ICC profile from decoder: {e}"),
            Error::ParseIcc(e) => write!(f, "invalid ICC profile from decoder: {e}"),
            Error::UnsupportedColorSpace(sig) => {
                write!(f, "ICC profile has unsupported color space {sig:?}")
            }
            Error::CreateTransform(e) => write!(f, "failed creating sRGB transform: {e}"),
            Error::WriteImage { path, source } => {
                write!(f, "failed writing output image {}: {source}", path.display())
            }
            Error::UnexpectedStatus(status) => {
                write!(f, "decoder returned unsubscribed status {status:?}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenInput(e) => Some(e),
            Error::ReadInput(e) => Some(e),
            Error::CreateOutputDir(e) => Some(e),
            Error::Decode(e) => Some(&**e),
            Error::Render(e) => Some(&**e),
            Error::FetchIcc(e) => Some(&**e),
            Error::ParseIcc(e) => Some(e),
            Error::CreateTransform(e) => Some(e),
            Error::WriteImage { source, .. } => Some(source),
            _ => None,
        }
    }
}
