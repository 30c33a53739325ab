//! Radiance `.hdr` environment decoding.

use crate::environment::HdrImage;
use crate::error::LoadError;

/// Decode an equirectangular Radiance image. `path` is only used for errors.
pub fn decode_environment(path: &str, bytes: &[u8]) -> Result<HdrImage, LoadError> {
    let image = HdrImage::from_hdr_bytes(bytes).map_err(|source| LoadError::Environment {
        path: path.to_string(),
        source,
    })?;
    ensure_not_empty(path, image)
}

/// Reject a zero-sized environment; there is nothing to light with.
pub(crate) fn ensure_not_empty(path: &str, image: HdrImage) -> Result<HdrImage, LoadError> {
    if image.is_empty() {
        return Err(LoadError::Unsupported {
            path: path.to_string(),
            what: format!("a {}x{} environment image", image.width, image.height),
        });
    }
    Ok(image)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A flat (non run-length encoded) RGBE file. Each pixel is `[r, g, b, e]`.
    pub(crate) fn rgbe_file(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let mut bytes =
            format!("#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y {height} +X {width}\n").into_bytes();
        for _ in 0..width * height {
            bytes.extend_from_slice(&pixel);
        }
        bytes
    }

    #[test]
    fn decodes_a_two_by_one_image() {
        let bytes = rgbe_file(2, 1, [128, 64, 32, 129]);
        let image = decode_environment("stub.hdr", &bytes).unwrap();
        assert_eq!((image.width, image.height), (2, 1));
        let [r, g, b] = image.pixels[0];
        assert!((r - 1.0).abs() < 0.02, "{r}");
        assert!((g - 0.5).abs() < 0.02, "{g}");
        assert!((b - 0.25).abs() < 0.02, "{b}");
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let err = decode_environment("empty.hdr", &rgbe_file(0, 0, [0; 4])).unwrap_err();
        assert!(matches!(err, LoadError::Unsupported { .. }));
        assert_eq!(err.path(), "empty.hdr");

        let err = decode_environment("flat.hdr", &rgbe_file(4, 0, [0; 4])).unwrap_err();
        assert!(matches!(err, LoadError::Unsupported { .. }));
    }

    #[test]
    fn garbage_is_an_environment_error() {
        let err = decode_environment("bad.hdr", b"not an hdr").unwrap_err();
        assert!(matches!(err, LoadError::Environment { .. }));
        assert_eq!(err.path(), "bad.hdr");
    }
}
