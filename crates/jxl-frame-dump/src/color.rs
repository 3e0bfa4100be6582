//! ICC profile handling, backed by Little CMS 2.
use lcms2::{ColorSpaceSignature, Intent, PixelFormat, Profile, Transform};

use crate::{Error, Result};

enum SrgbTransform {
    Rgb(Transform<[u8; 4], [u8; 3]>),
    Grayscale(Transform<u8, [u8; 3]>),
}

/// Parsed ICC profile of decoded pixels, with a prepared transform into sRGB.
pub struct ColorProfile {
    transform: SrgbTransform,
    intent: Intent,
    icc_len: usize,
}

impl std::fmt::Debug for ColorProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.transform {
            SrgbTransform::Rgb(_) => "rgb",
            SrgbTransform::Grayscale(_) => "grayscale",
        };
        f.debug_struct("ColorProfile")
            .field("kind", &kind)
            .field("intent", &self.intent)
            .field("icc_len", &self.icc_len)
            .finish()
    }
}

impl ColorProfile {
    /// Parses an ICC profile and prepares a transform into sRGB.
    pub fn parse(icc: &[u8]) -> Result<Self> {
        let source = Profile::new_icc(icc).map_err(Error::ParseIcc)?;
        let target = Profile::new_srgb();
        let intent = rendering_intent(icc);

        let transform = match source.color_space() {
            ColorSpaceSignature::RgbData => {
                let transform = Transform::new(
                    &source,
                    PixelFormat::RGBA_8,
                    &target,
                    PixelFormat::RGB_8,
                    intent,
                )
                .map_err(Error::CreateTransform)?;
                SrgbTransform::Rgb(transform)
            }
            ColorSpaceSignature::GrayData => {
                let transform = Transform::new(
                    &source,
                    PixelFormat::GRAY_8,
                    &target,
                    PixelFormat::RGB_8,
                    intent,
                )
                .map_err(Error::CreateTransform)?;
                SrgbTransform::Grayscale(transform)
            }
            sig => return Err(Error::UnsupportedColorSpace(sig)),
        };

        tracing::debug!(icc_len = icc.len(), ?intent, "Parsed ICC profile");
        Ok(Self {
            transform,
            intent,
            icc_len: icc.len(),
        })
    }

    /// Returns whether the profile describes a grayscale color space.
    #[inline]
    pub fn is_grayscale(&self) -> bool {
        matches!(self.transform, SrgbTransform::Grayscale(_))
    }

    /// Transforms unpremultiplied RGBA pixels into sRGB.
    ///
    /// `dst` is resized to `src.len()`. For grayscale profiles only the red channel is read, through
    /// the `gray` scratch buffer. Alpha is not touched.
    pub fn transform_to_srgb(&self, src: &[[u8; 4]], dst: &mut Vec<[u8; 3]>, gray: &mut Vec<u8>) {
        dst.clear();
        dst.resize(src.len(), [0u8; 3]);
        match &self.transform {
            SrgbTransform::Rgb(t) => t.transform_pixels(src, dst),
            SrgbTransform::Grayscale(t) => {
                gray.clear();
                gray.extend(src.iter().map(|px| px[0]));
                t.transform_pixels(gray, dst);
            }
        }
    }
}

/// Reads the rendering intent from the ICC header, defaulting to relative colorimetric.
fn rendering_intent(icc: &[u8]) -> Intent {
    let Some(bytes) = icc.get(64..68) else {
        return Intent::RelativeColorimetric;
    };
    match u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) {
        0 => Intent::Perceptual,
        1 => Intent::RelativeColorimetric,
        2 => Intent::Saturation,
        3 => Intent::AbsoluteColorimetric,
        _ => Intent::RelativeColorimetric,
    }
}

/// Reverses alpha premultiplication of an 8-bit RGBA pixel in place.
#[inline]
pub fn unpremultiply(px: &mut [u8; 4]) {
    let alpha = px[3] as u32;
    match alpha {
        255 => {}
        0 => {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
        }
        _ => {
            for c in &mut px[..3] {
                *c = ((*c as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srgb_icc() -> Vec<u8> {
        Profile::new_srgb().icc().unwrap()
    }

    #[test]
    fn rejects_garbage() {
        let mut icc = srgb_icc();
        let len = icc.len();
        icc.fill(0x5a);
        assert_eq!(icc.len(), len);

        let err = ColorProfile::parse(&icc).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ColorProfile);
    }

    #[test]
    fn rejects_empty() {
        let err = ColorProfile::parse(&[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ColorProfile);
    }

    #[test]
    fn srgb_is_near_identity() {
        let profile = ColorProfile::parse(&srgb_icc()).unwrap();
        assert!(!profile.is_grayscale());

        let src: Vec<[u8; 4]> = (0..=255u8)
            .step_by(15)
            .map(|v| [v, 255 - v, v / 2, 128])
            .collect();
        let mut dst = Vec::new();
        profile.transform_to_srgb(&src, &mut dst, &mut Vec::new());
        assert_eq!(dst.len(), src.len());

        for (s, d) in src.iter().zip(&dst) {
            for c in 0..3 {
                assert!(s[c].abs_diff(d[c]) <= 1, "{s:?} -> {d:?}");
            }
        }
    }

    #[test]
    fn grayscale_profile() {
        let white_point = lcms2::CIExyY {
            x: 0.3127,
            y: 0.3290,
            Y: 1.0,
        };
        let curve = lcms2::ToneCurve::new(2.2);
        let icc = Profile::new_gray(&white_point, &curve)
            .unwrap()
            .icc()
            .unwrap();

        let profile = ColorProfile::parse(&icc).unwrap();
        assert!(profile.is_grayscale());

        let src = [[0u8, 9, 9, 255], [128, 0, 0, 255], [255, 0, 0, 0]];
        // Leftovers from a longer row must not leak into the result.
        let mut dst = vec![[7u8; 3]; 5];
        let mut gray = vec![1u8; 8];
        profile.transform_to_srgb(&src, &mut dst, &mut gray);
        assert_eq!(dst.len(), 3);
        for &px in &dst {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
        assert!(dst[0][0] < dst[1][0]);
        assert!(dst[1][0] < dst[2][0]);
    }

    #[test]
    fn intent_from_header() {
        let mut icc = vec![0u8; 128];
        icc[67] = 2;
        assert_eq!(rendering_intent(&icc), Intent::Saturation);
        icc[67] = 0;
        assert_eq!(rendering_intent(&icc), Intent::Perceptual);
        assert_eq!(rendering_intent(&icc[..40]), Intent::RelativeColorimetric);
    }

    #[test]
    fn unpremultiply_pixels() {
        let mut px = [64, 32, 0, 128];
        unpremultiply(&mut px);
        assert_eq!(px, [128, 64, 0, 128]);

        let mut px = [10, 20, 30, 0];
        unpremultiply(&mut px);
        assert_eq!(px, [0, 0, 0, 0]);

        let mut px = [10, 20, 30, 255];
        unpremultiply(&mut px);
        assert_eq!(px, [10, 20, 30, 255]);

        let mut px = [200, 0, 0, 100];
        unpremultiply(&mut px);
        assert_eq!(px, [255, 0, 0, 100]);
    }
}
