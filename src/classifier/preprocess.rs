//! Image to tensor conversion for the injury model.
//!
//! Layout is NHWC with a batch of one: rows top to bottom, pixels left to
//! right, and for each pixel the R, G, B channels back to back. Each channel
//! is scaled from `0..=255` to `0.0..=1.0`. The model was trained on exactly
//! this layout, so any change here silently breaks predictions.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// Width and height the model expects.
pub const INPUT_SIDE: u32 = 224;
/// Colour channels per pixel.
pub const CHANNELS: usize = 3;
/// Number of `f32` values in one input tensor.
pub const INPUT_LEN: usize = (INPUT_SIDE as usize) * (INPUT_SIDE as usize) * CHANNELS;
/// Tensor shape handed to the inference backend.
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIDE as usize, INPUT_SIDE as usize, CHANNELS];

/// Rescale to 224x224 (aspect ratio is not preserved) and flatten.
pub fn to_input_tensor(image: &DynamicImage) -> Vec<f32> {
    let resized = image.resize_exact(INPUT_SIDE, INPUT_SIDE, FilterType::Triangle);
    pixels_to_tensor(&resized.to_rgb8())
}

/// Flatten an RGB buffer of any size into normalised interleaved channels.
pub fn pixels_to_tensor(pixels: &RgbImage) -> Vec<f32> {
    let mut tensor = Vec::with_capacity(pixels.as_raw().len());
    for pixel in pixels.pixels() {
        for &channel in &pixel.0 {
            tensor.push(f32::from(channel) / 255.0);
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn primary_colours_normalise_to_unit_channels() {
        let mut pixels = RgbImage::new(3, 1);
        pixels.put_pixel(0, 0, Rgb([255, 0, 0]));
        pixels.put_pixel(1, 0, Rgb([0, 255, 0]));
        pixels.put_pixel(2, 0, Rgb([0, 0, 255]));

        let tensor = pixels_to_tensor(&pixels);
        assert_close(
            &tensor,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        );
    }

    #[test]
    fn rows_are_laid_out_before_columns() {
        let mut pixels = RgbImage::new(2, 2);
        pixels.put_pixel(1, 0, Rgb([51, 0, 0]));
        pixels.put_pixel(0, 1, Rgb([0, 102, 0]));

        let tensor = pixels_to_tensor(&pixels);
        // (x=1, y=0) is the second pixel, (x=0, y=1) the third.
        assert!((tensor[3] - 0.2).abs() < 1e-6);
        assert!((tensor[7] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn conversion_is_deterministic() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(17, 9, |x, y| {
            Rgb([(x * 13) as u8, (y * 29) as u8, ((x + y) * 7) as u8])
        }));
        assert_eq!(to_input_tensor(&image), to_input_tensor(&image));
    }

    #[test]
    fn any_input_size_yields_the_model_shape() {
        for (width, height) in [(1, 1), (640, 480), (224, 224), (50, 900)] {
            let image = DynamicImage::new_rgb8(width, height);
            let tensor = to_input_tensor(&image);
            assert_eq!(tensor.len(), INPUT_LEN);
            assert!(tensor.iter().all(|value| (0.0..=1.0).contains(value)));
        }
    }
}
