//! Data Augmentation for the training split
//!
//! Random geometric transforms applied on the fly to each training image:
//! rotation, width/height shift, shear, per-axis zoom and horizontal flip.
//! All of them are folded into a single affine map that is inverse-sampled
//! with bilinear interpolation. Samples that land outside the source are
//! clamped to the nearest edge pixel.
//!
//! Validation and test images never go through this module.

use image::{Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Ranges for the random transforms
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Maximum rotation in degrees (uniform in ±rotation_degrees)
    pub rotation_degrees: f32,
    /// Maximum horizontal shift as a fraction of the width
    pub width_shift: f32,
    /// Maximum vertical shift as a fraction of the height
    pub height_shift: f32,
    /// Maximum shear angle in degrees
    pub shear_degrees: f32,
    /// Zoom factors are drawn per axis from [1 - zoom_range, 1 + zoom_range]
    pub zoom_range: f32,
    /// Flip left/right with probability 0.5
    pub horizontal_flip: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_degrees: 25.0,
            width_shift: 0.2,
            height_shift: 0.2,
            shear_degrees: 0.2,
            zoom_range: 0.2,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations
    pub fn none() -> Self {
        Self {
            rotation_degrees: 0.0,
            width_shift: 0.0,
            height_shift: 0.0,
            shear_degrees: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        *self == Self::none()
    }
}

/// One concrete draw of transform parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineParams {
    pub rotation_degrees: f32,
    /// Shift in pixels
    pub shift_x: f32,
    pub shift_y: f32,
    pub shear_degrees: f32,
    pub zoom_x: f32,
    pub zoom_y: f32,
    pub flip_horizontal: bool,
}

impl AffineParams {
    pub fn identity() -> Self {
        Self {
            rotation_degrees: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
            shear_degrees: 0.0,
            zoom_x: 1.0,
            zoom_y: 1.0,
            flip_horizontal: false,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Draw random parameters for an image of the given size
    pub fn sample(config: &AugmentationConfig, width: u32, height: u32, rng: &mut ChaCha8Rng) -> Self {
        let mut params = Self::identity();

        if config.rotation_degrees > 0.0 {
            params.rotation_degrees = rng.gen_range(-config.rotation_degrees..=config.rotation_degrees);
        }
        if config.width_shift > 0.0 {
            params.shift_x = rng.gen_range(-config.width_shift..=config.width_shift) * width as f32;
        }
        if config.height_shift > 0.0 {
            params.shift_y = rng.gen_range(-config.height_shift..=config.height_shift) * height as f32;
        }
        if config.shear_degrees > 0.0 {
            params.shear_degrees = rng.gen_range(-config.shear_degrees..=config.shear_degrees);
        }
        if config.zoom_range > 0.0 {
            let lo = 1.0 - config.zoom_range;
            let hi = 1.0 + config.zoom_range;
            params.zoom_x = rng.gen_range(lo..=hi);
            params.zoom_y = rng.gen_range(lo..=hi);
        }
        if config.horizontal_flip {
            params.flip_horizontal = rng.gen_bool(0.5);
        }

        params
    }

    /// Matrix mapping centered output coordinates to centered source coordinates
    fn source_matrix(&self) -> [[f32; 2]; 2] {
        let theta = self.rotation_degrees.to_radians();
        let shear = self.shear_degrees.to_radians();
        let (sin_t, cos_t) = theta.sin_cos();

        // rotation · shear · zoom
        let rotation = [[cos_t, -sin_t], [sin_t, cos_t]];
        let shear_m = [[1.0, -shear.sin()], [0.0, shear.cos()]];
        let zoom = [[self.zoom_x, 0.0], [0.0, self.zoom_y]];

        mat_mul(mat_mul(rotation, shear_m), zoom)
    }
}

fn mat_mul(a: [[f32; 2]; 2], b: [[f32; 2]; 2]) -> [[f32; 2]; 2] {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

/// Random image augmenter for the training split
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    /// Apply one random draw of the configured transforms. Output has the input's size.
    pub fn augment(&self, img: &RgbImage, rng: &mut ChaCha8Rng) -> RgbImage {
        if self.config.is_disabled() {
            return img.clone();
        }
        let params = AffineParams::sample(&self.config, img.width(), img.height(), rng);
        apply_transform(img, &params)
    }
}

/// Apply a fixed set of transform parameters to an image.
pub fn apply_transform(img: &RgbImage, params: &AffineParams) -> RgbImage {
    if params.is_identity() {
        return img.clone();
    }

    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let m = params.source_matrix();

    let mut output = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;

            let src_x = cx + m[0][0] * dx + m[0][1] * dy - params.shift_x;
            let src_y = cy + m[1][0] * dx + m[1][1] * dy - params.shift_y;

            let out_x = if params.flip_horizontal { width - 1 - x } else { x };
            output.put_pixel(out_x, y, bilinear_sample(img, src_x, src_y));
        }
    }

    output
}

/// Bilinear sample with nearest-edge fill
fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 10) as u8, (y * 10) as u8, ((x + y) * 5) as u8])
        })
    }

    #[test]
    fn test_identity_is_noop() {
        let img = gradient(16, 12);
        let out = apply_transform(&img, &AffineParams::identity());
        assert_eq!(out, img);
    }

    #[test]
    fn test_flip_only_matches_fliph() {
        let img = gradient(16, 12);
        let params = AffineParams {
            flip_horizontal: true,
            ..AffineParams::identity()
        };
        let out = apply_transform(&img, &params);
        assert_eq!(out, image::imageops::flip_horizontal(&img));
    }

    #[test]
    fn test_augment_preserves_dimensions() {
        let img = gradient(20, 14);
        let augmenter = Augmenter::new(AugmentationConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            let out = augmenter.augment(&img, &mut rng);
            assert_eq!(out.dimensions(), (20, 14));
        }
    }

    #[test]
    fn test_disabled_config_returns_input() {
        let img = gradient(8, 8);
        let augmenter = Augmenter::new(AugmentationConfig::none());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(augmenter.augment(&img, &mut rng), img);
    }

    #[test]
    fn test_same_seed_same_output() {
        let img = gradient(16, 16);
        let augmenter = Augmenter::new(AugmentationConfig::default());
        let a = augmenter.augment(&img, &mut ChaCha8Rng::seed_from_u64(42));
        let b = augmenter.augment(&img, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sampled_params_within_ranges() {
        let config = AugmentationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            let p = AffineParams::sample(&config, 100, 50, &mut rng);
            assert!(p.rotation_degrees.abs() <= 25.0);
            assert!(p.shift_x.abs() <= 20.0 + 1e-3);
            assert!(p.shift_y.abs() <= 10.0 + 1e-3);
            assert!(p.shear_degrees.abs() <= 0.2);
            assert!((0.8..=1.2).contains(&p.zoom_x));
            assert!((0.8..=1.2).contains(&p.zoom_y));
        }
    }

    #[test]
    fn test_constant_image_stays_constant() {
        // Edge fill means no foreign color can appear
        let img = RgbImage::from_pixel(10, 10, Rgb([90, 120, 200]));
        let params = AffineParams {
            rotation_degrees: 20.0,
            shift_x: 3.0,
            zoom_x: 1.2,
            ..AffineParams::identity()
        };
        let out = apply_transform(&img, &params);
        assert!(out.pixels().all(|p| *p == Rgb([90, 120, 200])));
    }
}
