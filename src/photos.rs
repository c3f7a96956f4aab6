//! Image loading, decoding and fitting for the report.
//!
//! Photos and the logo are referenced by opaque strings (public URLs or local
//! paths). They are resolved through the [`ImageLoader`] trait so the composer
//! never performs I/O directly and tests can substitute in-memory images.
//! Decoding goes through the [`image`] crate, and loaded images are re-encoded
//! as JPEG so the PDF embeds them with the DCT filter instead of raw pixels.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageError};
use log::warn;
use reqwest::blocking::Client;
use thiserror::Error;

/// JPEG quality used when embedding images into the document.
pub const EMBED_JPEG_QUALITY: u8 = 90;

/// Errors raised while resolving an image reference.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The HTTP request failed or timed out.
    #[error("failed to fetch image {reference}")]
    Fetch {
        reference: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("image {reference} returned HTTP {status}")]
    Status { reference: String, status: u16 },
    /// No HTTP client could be created, so remote images cannot be fetched.
    #[error("cannot fetch remote image {reference}: HTTP client unavailable")]
    NoClient { reference: String },
    /// A local file could not be read.
    #[error("failed to read image file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The bytes are not a supported image.
    #[error("failed to decode image")]
    Decode(#[from] ImageError),
}

/// Resolves an image reference into a decoded image.
pub trait ImageLoader {
    /// Loads and decodes the image behind `reference`.
    fn load(&self, reference: &str) -> Result<DynamicImage, LoadError>;
}

impl<F> ImageLoader for F
where
    F: Fn(&str) -> Result<DynamicImage, LoadError>,
{
    fn load(&self, reference: &str) -> Result<DynamicImage, LoadError> {
        self(reference)
    }
}

/// Default loader: `http(s)://` references are fetched with a timeout, `file://`
/// and plain references are read from disk.
pub struct SourceLoader {
    client: Option<Client>,
    base_dir: Option<PathBuf>,
}

impl SourceLoader {
    /// Creates a loader whose remote requests time out after `timeout`.
    ///
    /// If the HTTP client cannot be built, remote references fail individually
    /// and local ones keep working.
    pub fn new(timeout: Duration) -> Self {
        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => Some(client),
            Err(err) => {
                warn!("HTTP client unavailable, remote images will be skipped: {err}");
                None
            }
        };
        Self {
            client,
            base_dir: None,
        }
    }

    /// Resolves relative local references against `base_dir`.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    fn fetch(&self, reference: &str) -> Result<DynamicImage, LoadError> {
        let client = self.client.as_ref().ok_or_else(|| LoadError::NoClient {
            reference: reference.to_owned(),
        })?;
        let fetch_error = |source| LoadError::Fetch {
            reference: reference.to_owned(),
            source,
        };
        let response = client.get(reference).send().map_err(fetch_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                reference: reference.to_owned(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(fetch_error)?;
        decode_image_from_bytes(&bytes)
    }

    fn local_path(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference.strip_prefix("file://").unwrap_or(reference));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl fmt::Debug for SourceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceLoader")
            .field("http", &self.client.is_some())
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

impl ImageLoader for SourceLoader {
    fn load(&self, reference: &str) -> Result<DynamicImage, LoadError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch(reference)
        } else {
            decode_image_from_path(self.local_path(reference))
        }
    }
}

/// Decodes an image from in-memory bytes.
pub fn decode_image_from_bytes(bytes: impl AsRef<[u8]>) -> Result<DynamicImage, LoadError> {
    Ok(image::load_from_memory(bytes.as_ref())?)
}

/// Decodes the image stored at `path`.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<DynamicImage, LoadError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_image_from_bytes(bytes)
}

/// Encodes `image` as an RGB JPEG at the given quality (1–100).
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(bytes)
}

/// A JPEG-encoded image ready to be embedded into the PDF.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

impl EmbeddedImage {
    /// Re-encodes a decoded image for embedding.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self, LoadError> {
        let (width, height) = image.dimensions();
        let jpeg = encode_jpeg(image, EMBED_JPEG_QUALITY)?;
        Ok(Self {
            width,
            height,
            jpeg,
        })
    }

    /// Pixel width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Pixel height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// JPEG bytes.
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }
}

impl fmt::Debug for EmbeddedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("jpeg_bytes", &self.jpeg.len())
            .finish()
    }
}

/// Size and offset of an image fitted inside a box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fit {
    /// Drawn width.
    pub width: f64,
    /// Drawn height.
    pub height: f64,
    /// Horizontal offset that centres the image in the box.
    pub x_offset: f64,
    /// Vertical offset that centres the image in the box.
    pub y_offset: f64,
}

/// Scales a `pixel_width` × `pixel_height` image to the largest size that fits
/// `box_width` × `box_height` while keeping its aspect ratio, centred.
pub fn fit_within(pixel_width: u32, pixel_height: u32, box_width: f64, box_height: f64) -> Fit {
    if pixel_width == 0 || pixel_height == 0 {
        return Fit {
            width: box_width,
            height: box_height,
            x_offset: 0.0,
            y_offset: 0.0,
        };
    }

    let ratio = f64::from(pixel_width) / f64::from(pixel_height);
    let (width, height) = if ratio > box_width / box_height {
        (box_width, box_width / ratio)
    } else {
        (box_height * ratio, box_height)
    };

    Fit {
        width,
        height,
        x_offset: (box_width - width) / 2.0,
        y_offset: (box_height - height) / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([10, 120, 200])))
    }

    #[test]
    fn wide_image_fills_width() {
        let fit = fit_within(160, 60, 80.0, 60.0);
        assert_eq!(fit.width, 80.0);
        assert_eq!(fit.height, 30.0);
        assert_eq!(fit.x_offset, 0.0);
        assert_eq!(fit.y_offset, 15.0);
    }

    #[test]
    fn tall_image_fills_height() {
        let fit = fit_within(30, 60, 80.0, 60.0);
        assert_eq!(fit.height, 60.0);
        assert_eq!(fit.width, 30.0);
        assert_eq!(fit.x_offset, 25.0);
        assert_eq!(fit.y_offset, 0.0);
    }

    #[test]
    fn embedded_image_is_jpeg() {
        let embedded = EmbeddedImage::from_dynamic(&solid(40, 30)).expect("encode");
        assert_eq!((embedded.width(), embedded.height()), (40, 30));
        assert_eq!(&embedded.jpeg()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn missing_local_file_is_an_error() {
        let loader = SourceLoader::new(Duration::from_secs(1));
        let err = loader.load("/__ostecnico_missing__/photo.jpg").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn local_file_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bytes = encode_jpeg(&solid(12, 8), 80).expect("encode");
        fs::write(dir.path().join("photo.jpg"), bytes).expect("write");

        let loader = SourceLoader::new(Duration::from_secs(1)).with_base_dir(dir.path());
        let image = loader.load("photo.jpg").expect("load");
        assert_eq!(image.dimensions(), (12, 8));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_image_from_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
    }
}
