//! Turning an image into the tensor the model expects.

use std::fs;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::Array4;

use crate::config::{ChannelLayout, ImageSize};
use crate::error::Result;

/// Batch of one RGB image with values in `[0, 1]`.
pub type ImageTensor = Array4<f32>;

/// Tensor dimensions for a single image in the given layout.
pub fn input_shape(size: ImageSize, layout: ChannelLayout) -> [usize; 4] {
    let (h, w) = (size.height as usize, size.width as usize);
    match layout {
        ChannelLayout::ChannelsLast => [1, h, w, 3],
        ChannelLayout::ChannelsFirst => [1, 3, h, w],
    }
}

pub fn tensor_from_file(
    path: &Path,
    size: ImageSize,
    layout: ChannelLayout,
) -> Result<ImageTensor> {
    let data = fs::read(path)?;
    tensor_from_bytes(&data, size, layout)
}

/// Decode raw image data, format guessed from its content.
pub fn tensor_from_bytes(
    data: &[u8],
    size: ImageSize,
    layout: ChannelLayout,
) -> Result<ImageTensor> {
    let image = image::load_from_memory(data)?;
    Ok(tensor_from_image(&image, size, layout))
}

/// Resize without cropping and scale pixels to `[0, 1]`.
///
/// Nearest-neighbour sampling matches the loader the model was trained with.
pub fn tensor_from_image(
    image: &DynamicImage,
    size: ImageSize,
    layout: ChannelLayout,
) -> ImageTensor {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, size.width, size.height, FilterType::Nearest);

    Array4::from_shape_fn(input_shape(size, layout), |(_, a, b, c)| {
        let (x, y, channel) = match layout {
            ChannelLayout::ChannelsLast => (b, a, c),
            ChannelLayout::ChannelsFirst => (c, b, a),
        };
        resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
    })
}
