//! Fixed augmentation pipeline for face crops
//!
//! Every source image is expanded into the same ordered batch of 30 variants:
//!
//! 1. Original - unmodified copy
//! 2. Brightness - intensity scaled by 0.7, 0.85, 1.0, 1.15, 1.3
//! 3. Rotation - -15 to +20 degrees about the image center, black border
//! 4. Horizontal flip
//! 5. Scale - 0.9, 1.0, 1.1 with replicate padding or center crop back to size
//! 6. Gaussian noise - sigma 5, 10, 15
//! 7. Gaussian blur - 3x3 and 5x5 kernels
//! 8. Bias - intensity offset by -20, 0, +20
//! 9. Translation - 5 pixel diagonal shifts, black border
//!
//! Every variant keeps the dimensions of its input. Only the noise variants
//! are random; see [`NoiseSeed`].

use image::{
    imageops::{self, FilterType},
    ImageBuffer, Rgb, RgbImage,
};
use imageproc::{
    filter::separable_filter_equal,
    geometric_transformations::{warp, Interpolation, Projection},
    noise::gaussian_noise,
};
use serde::{Deserialize, Serialize};

/// Multiplicative intensity factors of the brightness variants.
pub const BRIGHTNESS_FACTORS: [f32; 5] = [0.7, 0.85, 1.0, 1.15, 1.3];
/// Rotation angles in degrees, positive is counter-clockwise.
pub const ROTATION_ANGLES: [f32; 8] = [-15.0, -10.0, -5.0, 0.0, 5.0, 10.0, 15.0, 20.0];
/// Resize factors of the scale variants.
pub const SCALE_FACTORS: [f64; 3] = [0.9, 1.0, 1.1];
/// Standard deviations of the additive noise variants.
pub const NOISE_SIGMAS: [f64; 3] = [5.0, 10.0, 15.0];
/// Square kernel sizes of the blur variants.
pub const BLUR_KERNELS: [u32; 2] = [3, 5];
/// Additive intensity offsets of the bias variants.
pub const BIAS_OFFSETS: [f32; 3] = [-20.0, 0.0, 20.0];
/// Pixel offsets of the translation variants.
pub const TRANSLATIONS: [(i32, i32); 4] = [(5, 5), (-5, -5), (5, -5), (-5, 5)];

const BORDER: Rgb<u8> = Rgb([0, 0, 0]);

/// One entry of the augmentation batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Unmodified copy
    Original,
    /// `|alpha * p|`, saturated
    Brightness { alpha: f32 },
    /// Rotation about `(w / 2, h / 2)`
    Rotation { degrees: f32 },
    /// Mirror around the vertical axis
    FlipHorizontal,
    /// Resize then pad or crop back to the input size
    Scale { factor: f64 },
    /// Additive zero-mean Gaussian noise
    Noise { sigma: f64 },
    /// Gaussian blur with a `kernel x kernel` window
    Blur { kernel: u32 },
    /// `|p + beta|`, saturated
    Bias { beta: f32 },
    /// Integer shift, vacated pixels are black
    Translation { dx: i32, dy: i32 },
}

impl Variant {
    /// Short name of the transform family, used in per-image trace logs.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Brightness { .. } => "brightness",
            Self::Rotation { .. } => "rotation",
            Self::FlipHorizontal => "flip",
            Self::Scale { .. } => "scale",
            Self::Noise { .. } => "noise",
            Self::Blur { .. } => "blur",
            Self::Bias { .. } => "bias",
            Self::Translation { .. } => "translation",
        }
    }
}

/// Randomness policy for the noise variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseSeed {
    /// Fresh entropy for every noise image; output bytes differ run to run.
    #[default]
    Unseeded,
    /// Noise at batch position `i` is drawn with seed `base + i`.
    Seeded(u64),
}

/// Expands one source image into its ordered batch of variants
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    variants: Vec<Variant>,
    noise_seed: NoiseSeed,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new(NoiseSeed::default())
    }
}

impl TransformPipeline {
    /// Number of images produced per source image.
    pub const BATCH_LEN: usize = 30;

    /// Create the standard pipeline with the given noise policy.
    pub fn new(noise_seed: NoiseSeed) -> Self {
        Self {
            variants: standard_variants(),
            noise_seed,
        }
    }

    /// Ordered variants of one batch.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Lazily produce the batch for `image`, one variant at a time.
    pub fn iter<'a>(&'a self, image: &'a RgbImage) -> Augmentations<'a> {
        Augmentations {
            pipeline: self,
            image,
            position: 0,
        }
    }

    /// Produce the full batch for `image`.
    pub fn augment(&self, image: &RgbImage) -> Vec<RgbImage> {
        self.iter(image).map(|(_, augmented)| augmented).collect()
    }

    /// Apply the variant found at `position` in the batch.
    ///
    /// `position` only matters for seeded noise.
    pub fn apply(&self, position: usize, variant: Variant, image: &RgbImage) -> RgbImage {
        match variant {
            Variant::Original => image.clone(),
            Variant::Brightness { alpha } => scale_intensity(image, alpha, 0.0),
            Variant::Rotation { degrees } => rotate_about_pixel_center(image, degrees),
            Variant::FlipHorizontal => imageops::flip_horizontal(image),
            Variant::Scale { factor } => rescale(image, factor),
            Variant::Noise { sigma } => {
                gaussian_noise(image, 0.0, sigma, self.noise_seed_for(position))
            }
            Variant::Blur { kernel } => gaussian_blur(image, kernel),
            Variant::Bias { beta } => scale_intensity(image, 1.0, beta),
            Variant::Translation { dx, dy } => shift(image, dx, dy),
        }
    }

    fn noise_seed_for(&self, position: usize) -> u64 {
        match self.noise_seed {
            NoiseSeed::Unseeded => rand::random(),
            NoiseSeed::Seeded(base) => base.wrapping_add(position as u64),
        }
    }
}

/// Iterator over the batch of one source image
pub struct Augmentations<'a> {
    pipeline: &'a TransformPipeline,
    image: &'a RgbImage,
    position: usize,
}

impl Iterator for Augmentations<'_> {
    type Item = (Variant, RgbImage);

    fn next(&mut self) -> Option<Self::Item> {
        let variant = *self.pipeline.variants.get(self.position)?;
        let augmented = self.pipeline.apply(self.position, variant, self.image);
        self.position += 1;
        Some((variant, augmented))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pipeline.variants.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Augmentations<'_> {}

fn standard_variants() -> Vec<Variant> {
    let mut variants = Vec::with_capacity(TransformPipeline::BATCH_LEN);
    variants.push(Variant::Original);
    variants.extend(
        BRIGHTNESS_FACTORS
            .iter()
            .map(|&alpha| Variant::Brightness { alpha }),
    );
    variants.extend(
        ROTATION_ANGLES
            .iter()
            .map(|&degrees| Variant::Rotation { degrees }),
    );
    variants.push(Variant::FlipHorizontal);
    variants.extend(SCALE_FACTORS.iter().map(|&factor| Variant::Scale { factor }));
    variants.extend(NOISE_SIGMAS.iter().map(|&sigma| Variant::Noise { sigma }));
    variants.extend(BLUR_KERNELS.iter().map(|&kernel| Variant::Blur { kernel }));
    variants.extend(BIAS_OFFSETS.iter().map(|&beta| Variant::Bias { beta }));
    variants.extend(
        TRANSLATIONS
            .iter()
            .map(|&(dx, dy)| Variant::Translation { dx, dy }),
    );
    variants
}

/// Per-channel `|alpha * p + beta|`, rounded and saturated to `0..=255`.
fn scale_intensity(image: &RgbImage, alpha: f32, beta: f32) -> RgbImage {
    let mut result = image.clone();
    for pixel in result.pixels_mut() {
        for channel in &mut pixel.0 {
            let value = alpha.mul_add(f32::from(*channel), beta).abs();
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    result
}

/// Rotate counter-clockwise about the integer pixel center.
fn rotate_about_pixel_center(image: &RgbImage, degrees: f32) -> RgbImage {
    if degrees == 0.0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let center_x = (width / 2) as f32;
    let center_y = (height / 2) as f32;

    // Projection::rotate turns clockwise in image coordinates
    let projection = Projection::translate(-center_x, -center_y)
        .and_then(Projection::rotate(-degrees.to_radians()))
        .and_then(Projection::translate(center_x, center_y));

    warp(image, &projection, Interpolation::Bilinear, BORDER)
}

/// Move the content by `(dx, dy)` pixels, vacated pixels become [`BORDER`].
fn shift(image: &RgbImage, dx: i32, dy: i32) -> RgbImage {
    let (width, height) = image.dimensions();

    ImageBuffer::from_fn(width, height, |x, y| {
        let source_x = i64::from(x) - i64::from(dx);
        let source_y = i64::from(y) - i64::from(dy);
        if (0..i64::from(width)).contains(&source_x) && (0..i64::from(height)).contains(&source_y)
        {
            *image.get_pixel(source_x as u32, source_y as u32)
        } else {
            BORDER
        }
    })
}

fn scaled_extent(extent: u32, factor: f64) -> u32 {
    ((f64::from(extent) * factor) as u32).max(1)
}

/// Resize by `factor`, then restore the original size.
///
/// Downscaled images are padded by edge replication, upscaled images are
/// cropped around the center.
fn rescale(image: &RgbImage, factor: f64) -> RgbImage {
    let (width, height) = image.dimensions();
    let new_width = scaled_extent(width, factor);
    let new_height = scaled_extent(height, factor);

    if (new_width, new_height) == (width, height) {
        return image.clone();
    }

    let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);
    fit_to_extent(&resized, width, height)
}

/// Offset from target coordinates into the source along one axis.
///
/// Positive when cropping, negative (the leading pad) when padding.
fn centered_offset(actual: u32, target: u32) -> i64 {
    if actual >= target {
        i64::from((actual - target) / 2)
    } else {
        -i64::from((target - actual) / 2)
    }
}

fn fit_to_extent(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (source_width, source_height) = image.dimensions();
    let offset_x = centered_offset(source_width, width);
    let offset_y = centered_offset(source_height, height);
    let max_x = i64::from(source_width) - 1;
    let max_y = i64::from(source_height) - 1;

    ImageBuffer::from_fn(width, height, |x, y| {
        let source_x = (i64::from(x) + offset_x).clamp(0, max_x) as u32;
        let source_y = (i64::from(y) + offset_y).clamp(0, max_y) as u32;
        *image.get_pixel(source_x, source_y)
    })
}

/// Fixed kernels used for the small window sizes.
const SMALL_GAUSSIAN_KERNELS: [&[f32]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[0.03125, 0.109_375, 0.218_75, 0.281_25, 0.218_75, 0.109_375, 0.03125],
];

/// Normalized 1D Gaussian kernel of odd length `size`.
///
/// Sizes up to 7 use fixed weights. Larger sizes sample a Gaussian
/// with `sigma = 0.3 * ((size - 1) / 2 - 1) + 0.8`.
fn gaussian_kernel_1d(size: u32) -> Vec<f32> {
    if let Some(kernel) = SMALL_GAUSSIAN_KERNELS.get(size as usize / 2) {
        return kernel.to_vec();
    }

    let sigma = 0.3f64.mul_add((f64::from(size) - 1.0).mul_add(0.5, -1.0), 0.8);
    let center = f64::from(size - 1) / 2.0;
    let two_sigma_squared = 2.0 * sigma * sigma;

    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let x = f64::from(i) - center;
            (-(x * x) / two_sigma_squared).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();

    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

fn gaussian_blur(image: &RgbImage, kernel_size: u32) -> RgbImage {
    let kernel = gaussian_kernel_1d(kernel_size);
    separable_filter_equal(image, &kernel)
}
