// Image decoding and normalization into the classifier's input tensor
use candle::{Device, Tensor};
use image::{imageops::FilterType, DynamicImage, RgbImage};

use crate::error::PredictionError;

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Shorter side length before cropping, as used to train EfficientNet-B0.
pub const RESIZE_SIZE: u32 = 256;
/// Spatial size the network expects.
pub const CROP_SIZE: u32 = 224;

/// Turns encoded image bytes into a `[1, 3, crop, crop]` f32 tensor.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    resize_size: u32,
    crop_size: u32,
    device: Device,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(Device::Cpu)
    }
}

impl ImagePreprocessor {
    pub fn new(device: Device) -> Self {
        Self {
            resize_size: RESIZE_SIZE,
            crop_size: CROP_SIZE,
            device,
        }
    }

    pub fn preprocess(&self, bytes: &[u8]) -> Result<Tensor, PredictionError> {
        let image = image::load_from_memory(bytes)?;
        let rgb = self.resize_and_crop(&image);
        let data = normalize(&rgb);

        let size = self.crop_size as usize;
        let tensor = Tensor::from_vec(data, (3, size, size), &self.device)?.unsqueeze(0)?;
        Ok(tensor)
    }

    /// Cuts out the source pixels that survive "resize shorter side, then
    /// center crop" and resizes only that square, so the intermediate image
    /// never grows with the aspect ratio.
    fn resize_and_crop(&self, image: &DynamicImage) -> RgbImage {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let region = source_region(width, height, self.resize_size, self.crop_size);
        let cropped =
            image::imageops::crop_imm(&rgb, region.x, region.y, region.width, region.height)
                .to_image();
        image::imageops::resize(&cropped, self.crop_size, self.crop_size, FilterType::CatmullRom)
    }
}

/// A rectangle in source image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Maps the center crop of the resized image back onto the source image.
fn source_region(width: u32, height: u32, resize: u32, crop: u32) -> Region {
    let (resized_width, resized_height) = shorter_side_to(width, height, resize);
    let short = width.min(height).max(1) as u64;
    let (resize, crop) = (resize as u64, crop as u64);

    // resized = source * resize / short, so map back with short / resize
    let span = |dim: u32, resized_dim: u64| {
        let dim = dim as u64;
        let side = ((crop * short + resize / 2) / resize).clamp(1, dim);
        let start = (center_offset(resized_dim, crop) * short / resize).min(dim - side);
        // both are bounded by `dim`, which came from a u32
        (start as u32, side as u32)
    };
    let (x, region_width) = span(width, resized_width);
    let (y, region_height) = span(height, resized_height);
    Region {
        x,
        y,
        width: region_width,
        height: region_height,
    }
}

/// Scales so the shorter side equals `target`, keeping the aspect ratio.
fn shorter_side_to(width: u32, height: u32, target: u32) -> (u64, u64) {
    let scale_long = |long: u32, short: u32| target as u64 * long as u64 / short.max(1) as u64;
    if width <= height {
        (target as u64, scale_long(height, width))
    } else {
        (scale_long(width, height), target as u64)
    }
}

/// Halves go to the even neighbour, as in torchvision's center crop.
fn center_offset(dim: u64, crop: u64) -> u64 {
    (dim.saturating_sub(crop) as f64 / 2.0).round_ties_even() as u64
}

/// Returns CHW layout: [C, H, W] flattened
fn normalize(rgb: &RgbImage) -> Vec<f32> {
    let (width, height) = rgb.dimensions();
    let num_pixels = (width * height) as usize;
    let mut normalized = vec![0.0f32; 3 * num_pixels];

    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            normalized[c * num_pixels + i] =
                (pixel[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }

    normalized
}
