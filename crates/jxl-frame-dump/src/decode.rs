use crate::commands::decode::DecodeArgs;
use crate::driver::{DecodeSession, DriverOptions, Summary};
use crate::output::PngFrameWriter;
use crate::oxide::JxlOxideDecoder;
use crate::{Error, Result};

pub fn handle_decode(args: DecodeArgs) -> Result<Summary> {
    let _guard = tracing::trace_span!("Handle decode").entered();

    #[cfg(feature = "rayon")]
    let num_threads = args.num_threads;
    #[cfg(not(feature = "rayon"))]
    let num_threads = None;
    let pool = crate::create_thread_pool(num_threads);

    tracing::debug!(input = %args.input.display(), "Opening input");
    let input = std::fs::File::open(&args.input).map_err(Error::OpenInput)?;
    let encoder = PngFrameWriter::new(&args.output_dir)?;
    let decoder = JxlOxideDecoder::new(pool);
    let options = DriverOptions {
        chunk_size: args.chunk_size,
    };

    let decode_start = std::time::Instant::now();
    let summary = DecodeSession::new(decoder, input, encoder, options).run()?;
    let elapsed = decode_start.elapsed();

    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    tracing::info!(
        "Wrote {} frame(s) from {} bytes, took {:.2} ms",
        summary.frames_written,
        summary.bytes_read,
        elapsed_ms
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::path::Path;

    use clap::Parser;
    use zune_core::bit_depth::BitDepth;
    use zune_core::colorspace::ColorSpace;
    use zune_core::options::EncoderOptions;
    use zune_jpegxl::JxlSimpleEncoder;

    use super::*;
    use crate::Args;
    use crate::error::ErrorKind;

    fn run(input: &Path, output_dir: &Path) -> Result<Summary> {
        let args = Args::try_parse_from([
            OsStr::new("jxl-frame-dump"),
            input.as_os_str(),
            OsStr::new("-o"),
            output_dir.as_os_str(),
        ])
        .unwrap();
        handle_decode(args.decode)
    }

    fn run_chunked(input: &Path, output_dir: &Path, chunk_size: usize) -> Result<Summary> {
        let chunk_size = chunk_size.to_string();
        let args = Args::try_parse_from([
            OsStr::new("jxl-frame-dump"),
            input.as_os_str(),
            OsStr::new("-o"),
            output_dir.as_os_str(),
            OsStr::new("--chunk-size"),
            OsStr::new(&chunk_size),
        ])
        .unwrap();
        handle_decode(args.decode)
    }

    /// Encodes 8-bit samples as a lossless JPEG XL codestream.
    fn encode_jxl(width: usize, height: usize, colorspace: ColorSpace, samples: &[u8]) -> Vec<u8> {
        let options = EncoderOptions::new(width, height, colorspace, BitDepth::Eight);
        let mut jxl = Vec::new();
        JxlSimpleEncoder::new(samples, options)
            .encode(&mut jxl)
            .unwrap();
        jxl
    }

    /// Deterministic test pattern with gradients and some noise.
    fn pattern(width: usize, height: usize, channels: usize) -> Vec<u8> {
        let mut samples = Vec::with_capacity(width * height * channels);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let v = match c {
                        0 => x * 255 / (width - 1),
                        1 => y * 255 / (height - 1),
                        2 => (x * 7 + y * 13) % 256,
                        // Alpha: keep both fully transparent and opaque pixels.
                        _ => (x * 37 + y * 11) % 256,
                    };
                    samples.push(v as u8);
                }
            }
        }
        samples
    }

    fn read_png(path: &Path) -> (png::OutputInfo, Vec<u8>) {
        let file = std::fs::File::open(path).unwrap();
        let decoder = png::Decoder::new(std::io::BufReader::new(file));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        (info, buf)
    }

    /// Decodes a 37x23 `jxl` with several chunk sizes, checks that every run writes the same
    /// single PNG, and returns its color type and samples.
    fn decode_with_chunk_sizes(jxl: &[u8]) -> (png::ColorType, Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.jxl");
        std::fs::write(&input, jxl).unwrap();

        let mut first: Option<Vec<u8>> = None;
        for chunk_size in [1, 1024, jxl.len()] {
            let out = dir.path().join(format!("out-{chunk_size}"));
            let summary = run_chunked(&input, &out, chunk_size).unwrap();
            assert_eq!(summary.frames_written, 1);
            assert!(summary.bytes_read <= jxl.len() as u64);
            assert_eq!(written_files(&out), 1);

            let png = std::fs::read(out.join("00.png")).unwrap();
            match &first {
                Some(first) => assert!(*first == png, "chunk size {chunk_size} changed output"),
                None => first = Some(png),
            }
        }

        let (info, pixels) = read_png(&dir.path().join("out-1").join("00.png"));
        assert_eq!((info.width, info.height), (37, 23));
        assert_eq!(info.bit_depth, png::BitDepth::Eight);
        (info.color_type, pixels)
    }

    fn written_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = run(&dir.path().join("missing.jxl"), &out).unwrap_err();
        assert!(matches!(err, Error::OpenInput(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!out.exists());
    }

    #[test]
    fn empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.jxl");
        std::fs::write(&input, b"").unwrap();
        let out = dir.path().join("out");

        let err = run(&input, &out).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
        assert_eq!(err.kind().exit_code(), 2);
        assert_eq!(written_files(&out), 0);
    }

    #[test]
    fn truncated_signature() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("truncated.jxl");
        std::fs::write(&input, [0xff, 0x0a]).unwrap();
        let out = dir.path().join("out");

        let err = run(&input, &out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(written_files(&out), 0);
    }

    #[test]
    fn garbage_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("garbage.jxl");
        let garbage: Vec<u8> = (0..5000u32).map(|v| (v * 31 % 251) as u8).collect();
        std::fs::write(&input, garbage).unwrap();
        let out = dir.path().join("out");

        let err = run(&input, &out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(written_files(&out), 0);
    }

    #[test]
    fn lossless_rgb() {
        let samples = pattern(37, 23, 3);
        let jxl = encode_jxl(37, 23, ColorSpace::RGB, &samples);
        let (color_type, pixels) = decode_with_chunk_sizes(&jxl);
        assert_eq!(color_type, png::ColorType::Rgb);
        assert!(pixels == samples);
    }

    #[test]
    fn lossless_rgba() {
        let samples = pattern(37, 23, 4);
        let jxl = encode_jxl(37, 23, ColorSpace::RGBA, &samples);
        let (color_type, pixels) = decode_with_chunk_sizes(&jxl);
        assert_eq!(color_type, png::ColorType::Rgba);
        assert!(pixels == samples);
    }

    #[test]
    fn lossless_grayscale() {
        let samples = pattern(37, 23, 1);
        let jxl = encode_jxl(37, 23, ColorSpace::Luma, &samples);
        let (color_type, pixels) = decode_with_chunk_sizes(&jxl);

        // Gray goes through the rendered gray profile and is expanded to sRGB.
        assert_eq!(color_type, png::ColorType::Rgb);
        assert_eq!(pixels.len(), samples.len() * 3);
        for (px, &gray) in pixels.chunks_exact(3).zip(&samples) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert!(px[0].abs_diff(gray) <= 1, "{gray} -> {px:?}");
        }
    }

    #[test]
    fn truncated_image() {
        let samples = pattern(300, 300, 3);
        let jxl = encode_jxl(300, 300, ColorSpace::RGB, &samples);
        let dir = tempfile::tempdir().unwrap();

        for percent in [10, 50, 90, 99] {
            let input = dir.path().join(format!("truncated-{percent}.jxl"));
            std::fs::write(&input, &jxl[..jxl.len() * percent / 100]).unwrap();
            let out = dir.path().join(format!("out-{percent}"));

            let err = run(&input, &out).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decode, "{percent}%: {err}");
            assert_eq!(written_files(&out), 0);
        }
    }
}
