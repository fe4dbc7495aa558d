//! Image preprocessing shared by training batches and inference.
//!
//! Decode → resize to a square → RGB → rescale to [0, 1] → CHW layout.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, ImageReader, RgbImage};

use crate::utils::error::{DeepscanError, Result};

/// Decode raw bytes (any format the `image` crate can sniff).
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(DeepscanError::ImageDecode("empty image payload".to_string()));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Open and decode an image file.
pub fn load_image_file(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| DeepscanError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .with_guessed_format()
        .map_err(|e| DeepscanError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| DeepscanError::ImageLoad(path.to_path_buf(), e.to_string()))
}

/// Resize to `size` x `size` RGB, ignoring aspect ratio
pub fn resize_rgb(image: &DynamicImage, size: u32) -> RgbImage {
    if image.width() == size && image.height() == size {
        return image.to_rgb8();
    }
    image.resize_exact(size, size, FilterType::Triangle).to_rgb8()
}

/// Flatten an RGB image to CHW floats in [0, 1]
pub fn to_chw(image: &RgbImage) -> Vec<f32> {
    let num_pixels = (image.width() * image.height()) as usize;
    let mut data = vec![0.0f32; 3 * num_pixels];

    for (i, pixel) in image.pixels().enumerate() {
        data[i] = pixel[0] as f32 / 255.0;
        data[num_pixels + i] = pixel[1] as f32 / 255.0;
        data[2 * num_pixels + i] = pixel[2] as f32 / 255.0;
    }

    data
}

/// Full preprocessing of a decoded image into model input data `[3, size, size]`.
pub fn preprocess_image(image: &DynamicImage, size: u32) -> Vec<f32> {
    to_chw(&resize_rgb(image, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([255, 0, 51]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_and_preprocess() {
        let img = decode_image(&png_bytes(40, 20)).unwrap();
        let data = preprocess_image(&img, 8);

        assert_eq!(data.len(), 3 * 8 * 8);
        // Channel planes: R all 1.0, G all 0.0, B all 0.2
        assert!(data[..64].iter().all(|&v| (v - 1.0).abs() < 1e-2));
        assert!(data[64..128].iter().all(|&v| v.abs() < 1e-2));
        assert!(data[128..].iter().all(|&v| (v - 0.2).abs() < 1e-2));
    }

    #[test]
    fn test_values_in_unit_range() {
        let img = RgbImage::from_fn(5, 5, |x, y| Rgb([(x * 60) as u8, (y * 60) as u8, 255]));
        let data = to_chw(&img);
        assert!(data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let err = decode_image(b"not an image at all").unwrap_err();
        assert!(matches!(err, DeepscanError::ImageDecode(_)));
    }

    #[test]
    fn test_empty_bytes_fail() {
        assert!(decode_image(&[]).is_err());
    }

    #[test]
    fn test_deterministic() {
        let img = decode_image(&png_bytes(31, 17)).unwrap();
        assert_eq!(preprocess_image(&img, 16), preprocess_image(&img, 16));
    }
}
