//! Pre-upload image normalisation.
//!
//! Photos taken at the counter are re-encoded into a bounded size window
//! before they are uploaded. A single pass is delegated to a [`Compressor`];
//! [`Normalizer`] applies the retry policy around it and never fails: when any
//! attempt errors, the original file is kept.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError};
use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::photos;

const KIB: usize = 1024;
const MIB: f64 = 1024.0 * 1024.0;
const SHRINK_FACTOR: f64 = 0.95;

/// Errors raised by a single compression attempt.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// The input contained no bytes.
    #[error("image file is empty")]
    EmptyInput,
    /// The input could not be decoded or the output could not be encoded.
    #[error("failed to process image")]
    Image(#[from] ImageError),
    /// An image file could not be read.
    #[error("failed to read image file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parameters of one compression attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressionOptions {
    /// Target upper bound for the encoded size.
    pub max_size_bytes: usize,
    /// Longest side allowed in the output, in pixels.
    pub max_dimension: u32,
    /// Starting JPEG quality in `0.0..=1.0`.
    pub initial_quality: f32,
    /// Maximum number of encodings per attempt.
    pub max_iterations: u32,
}

impl CompressionOptions {
    /// Options with a size limit expressed in MiB.
    pub fn new(max_size_mb: f64, max_dimension: u32, initial_quality: f32) -> Self {
        Self {
            max_size_bytes: (max_size_mb * MIB) as usize,
            max_dimension,
            initial_quality,
            max_iterations: 10,
        }
    }

    /// Returns a copy with a different starting quality.
    pub fn with_quality(mut self, initial_quality: f32) -> Self {
        self.initial_quality = initial_quality;
        self
    }

    /// Returns a copy with a different size limit in MiB.
    pub fn with_max_size_mb(mut self, max_size_mb: f64) -> Self {
        self.max_size_bytes = (max_size_mb * MIB) as usize;
        self
    }
}

/// Retry policy applied by [`Normalizer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressionPolicy {
    /// Outputs below this size are retried at `undershoot_quality`.
    pub min_bytes: usize,
    /// Outputs above this size are retried with `overshoot`.
    pub max_bytes: usize,
    /// Options of the first attempt.
    pub first: CompressionOptions,
    /// Starting quality of the retry after an undershoot.
    pub undershoot_quality: f32,
    /// Options of the retry after an overshoot.
    pub overshoot: CompressionOptions,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        let first = CompressionOptions::new(0.3, 1280, 0.8);
        Self {
            min_bytes: 200 * KIB,
            max_bytes: 350 * KIB,
            first,
            undershoot_quality: 0.9,
            overshoot: first.with_max_size_mb(0.25).with_quality(0.7),
        }
    }
}

/// Performs one compression attempt.
pub trait Compressor: Sync {
    /// Compresses `input` according to `options`.
    fn compress(&self, input: &[u8], options: &CompressionOptions) -> Result<Vec<u8>, CompressionError>;
}

impl<F> Compressor for F
where
    F: Fn(&[u8], &CompressionOptions) -> Result<Vec<u8>, CompressionError> + Sync,
{
    fn compress(&self, input: &[u8], options: &CompressionOptions) -> Result<Vec<u8>, CompressionError> {
        self(input, options)
    }
}

/// Decodes the input and re-encodes it as JPEG.
///
/// The image is first scaled so its longest side fits `max_dimension`. While
/// the output exceeds `max_size_bytes` both the dimensions and the quality are
/// reduced by 5 % and the image is encoded again, up to `max_iterations`
/// encodings. When no resize was needed and the output ends up larger than the
/// input, the input is returned unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct JpegCompressor;

impl JpegCompressor {
    fn encode(image: &DynamicImage, scale: f64, quality: f32) -> Result<Vec<u8>, ImageError> {
        let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
        if scale >= 1.0 {
            return photos::encode_jpeg(image, quality);
        }
        let (width, height) = image.dimensions();
        let width = ((f64::from(width) * scale).round() as u32).max(1);
        let height = ((f64::from(height) * scale).round() as u32).max(1);
        photos::encode_jpeg(&image.resize_exact(width, height, FilterType::Triangle), quality)
    }
}

impl Compressor for JpegCompressor {
    fn compress(&self, input: &[u8], options: &CompressionOptions) -> Result<Vec<u8>, CompressionError> {
        if input.is_empty() {
            return Err(CompressionError::EmptyInput);
        }
        let image = image::load_from_memory(input)?;
        let (width, height) = image.dimensions();
        let longest = width.max(height);

        let mut scale = if longest > options.max_dimension && longest > 0 {
            f64::from(options.max_dimension) / f64::from(longest)
        } else {
            1.0
        };
        let mut resized = scale < 1.0;
        let mut quality = options.initial_quality.clamp(0.01, 1.0);

        let mut output = Self::encode(&image, scale, quality)?;
        let mut iterations = 1;
        while output.len() > options.max_size_bytes && iterations < options.max_iterations {
            scale *= SHRINK_FACTOR;
            quality *= SHRINK_FACTOR as f32;
            resized = true;
            output = Self::encode(&image, scale, quality)?;
            iterations += 1;
        }

        if !resized && output.len() > input.len() {
            return Ok(input.to_vec());
        }
        Ok(output)
    }
}

/// An image file as selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// File name, kept across compression.
    pub name: String,
    /// Encoded file contents.
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Creates a file from a name and its contents.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Reads a file from disk, naming it after the path's file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CompressionError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| CompressionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file has no contents.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Brings images into the upload size window.
#[derive(Debug)]
pub struct Normalizer<C = JpegCompressor> {
    compressor: C,
    policy: CompressionPolicy,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(JpegCompressor)
    }
}

impl<C: Compressor> Normalizer<C> {
    /// Creates a normaliser with the default policy.
    pub fn new(compressor: C) -> Self {
        Self {
            compressor,
            policy: CompressionPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_policy(mut self, policy: CompressionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &CompressionPolicy {
        &self.policy
    }

    /// Compresses one file, returning the original when any attempt fails.
    pub fn normalize(&self, file: &ImageFile) -> ImageFile {
        match self.try_normalize(&file.bytes) {
            Ok(bytes) => {
                info!(
                    "Image compressed: {:.2}KB → {:.2}KB",
                    file.len() as f64 / KIB as f64,
                    bytes.len() as f64 / KIB as f64
                );
                ImageFile::new(file.name.clone(), bytes)
            }
            Err(err) => {
                warn!("Error compressing image {}: {err}", file.name);
                file.clone()
            }
        }
    }

    /// Compresses every file concurrently and returns them in input order.
    pub fn normalize_batch(&self, files: &[ImageFile]) -> Vec<ImageFile> {
        files.par_iter().map(|file| self.normalize(file)).collect()
    }

    fn try_normalize(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let policy = &self.policy;
        let mut output = self.compressor.compress(input, &policy.first)?;

        if output.len() < policy.min_bytes {
            let retry = policy.first.with_quality(policy.undershoot_quality);
            output = self.compressor.compress(input, &retry)?;
        }

        if output.len() > policy.max_bytes {
            output = self.compressor.compress(input, &policy.overshoot)?;
        }

        Ok(output)
    }
}
