//! Image preprocessing for the leaf classifier.
//!
//! Decodes an encoded payload, resizes it to a square with bilinear
//! interpolation, scales channels to [0, 1] and lays the result out as a
//! single-image NHWC batch: `[1, size, size, 3]`.

use agro_core::{Error, PreprocessSettings, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::payload::ImagePayload;
use crate::CHANNELS;

/// Dense float tensor in NHWC layout with a batch of one
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    shape: [usize; 4],
}

impl ImageTensor {
    /// Wrap raw NHWC data, checking that the length matches the shape
    pub fn new(data: Vec<f32>, shape: [usize; 4]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::Inference(format!(
                "tensor data has {} values, shape {:?} needs {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { data, shape })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Edge length of the (square) image
    pub fn image_size(&self) -> usize {
        self.shape[1]
    }
}

/// Image preprocessor for classifier input
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePreprocessor {
    settings: PreprocessSettings,
}

impl ImagePreprocessor {
    /// Creates a new image preprocessor from the `[preprocess]` settings
    pub fn new(settings: PreprocessSettings) -> Self {
        Self { settings }
    }

    /// Creates a preprocessor producing `size`×`size` tensors
    pub fn with_size(size: u32) -> Self {
        Self::new(PreprocessSettings { image_size: size })
    }

    /// Edge length of the tensors this preprocessor produces
    pub fn image_size(&self) -> u32 {
        self.settings.image_size
    }

    /// Decode the payload into pixels
    pub fn decode(&self, payload: &ImagePayload) -> Result<DynamicImage> {
        if payload.is_empty() {
            return Err(Error::ImageDecode("empty image payload".to_string()));
        }
        Ok(image::load_from_memory(payload.bytes())?)
    }

    /// Decode, resize and normalize a payload
    pub fn preprocess(&self, payload: &ImagePayload) -> Result<ImageTensor> {
        let image = self.decode(payload)?;
        self.preprocess_image(&image)
    }

    /// Resize and normalize an already decoded image
    pub fn preprocess_image(&self, image: &DynamicImage) -> Result<ImageTensor> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::ImageDecode("image has no pixels".to_string()));
        }

        let size = self.settings.image_size;
        let resized = resize_bilinear(image, size);
        let data = normalize_nhwc(&resized);
        let edge = size as usize;
        tracing::debug!(
            "Preprocessed {}x{} image to {}x{}",
            image.width(),
            image.height(),
            size,
            size
        );

        ImageTensor::new(data, [1, edge, edge, CHANNELS])
    }
}

/// Resize to a square with a triangle (bilinear) filter
fn resize_bilinear(image: &DynamicImage, size: u32) -> RgbImage {
    let rgb = image.to_rgb8();
    if rgb.dimensions() == (size, size) {
        return rgb;
    }
    image::imageops::resize(&rgb, size, size, FilterType::Triangle)
}

/// Scale 0-255 channels to [0, 1], row-major HWC
fn normalize_nhwc(image: &RgbImage) -> Vec<f32> {
    image
        .as_raw()
        .iter()
        .map(|&channel| channel as f32 / 255.0)
        .collect()
}
