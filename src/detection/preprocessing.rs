use image::{imageops, imageops::FilterType, DynamicImage, Rgb, RgbImage};
use ndarray::Array4;

use super::DetectError;

const PAD_COLOR: Rgb<u8> = Rgb([114, 114, 114]);

/// How a source image was fitted onto the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub source_width: u32,
    pub source_height: u32,
}

/// Resizes `image` to fit a `size` x `size` canvas, keeping its aspect ratio,
/// and centres it on grey padding.
pub fn letterbox(image: &DynamicImage, size: u32) -> Result<(RgbImage, Letterbox), DetectError> {
    if size == 0 {
        return Err(DetectError::InputSize(size));
    }
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(DetectError::EmptyImage);
    }

    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = image
        .resize_exact(new_width, new_height, FilterType::Triangle)
        .to_rgb8();

    let pad_x = (size - new_width) / 2;
    let pad_y = (size - new_height) / 2;
    let mut canvas = RgbImage::from_pixel(size, size, PAD_COLOR);
    imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    Ok((
        canvas,
        Letterbox {
            scale,
            pad_x,
            pad_y,
            source_width: width,
            source_height: height,
        },
    ))
}

/// Builds the `[1, 3, size, size]` input tensor with values in `[0, 1]`.
pub fn preprocess_image(
    image: &DynamicImage,
    size: u32,
) -> Result<(Array4<f32>, Letterbox), DetectError> {
    let (canvas, letterbox) = letterbox(image, size)?;
    let raw = canvas.as_raw();
    let side = size as usize;
    let mut input_data = Vec::with_capacity(side * side * 3);

    for c in 0..3 {
        for i in 0..side {
            for j in 0..side {
                let index = (i * side + j) * 3;
                input_data.push(raw[index + c] as f32 / 255.0);
            }
        }
    }

    Ok((Array4::from_shape_vec((1, 3, side, side), input_data)?, letterbox))
}
