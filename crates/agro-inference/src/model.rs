//! Leaf classifier CNN and its deployment descriptor.
//!
//! The network is a compact four-block CNN built with Burn. Deployed weights
//! are a named MessagePack record, possibly split into several shard files
//! that are listed in `model.json` and concatenated in order.

use std::sync::Mutex;

use agro_core::{Error, NUM_CLASSES};
use agro_vision::{ImageTensor, CHANNELS, IMAGE_SIZE};
use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    record::{FullPrecisionSettings, HalfPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::{backend::Backend, Tensor, TensorData},
};
use serde::{Deserialize, Serialize};

/// Value of `format` in a deployable descriptor
pub const DESCRIPTOR_FORMAT: &str = "burn-mpk";

/// Configuration for the LeafClassifier CNN
#[derive(Config, Debug)]
pub struct LeafClassifierConfig {
    /// Number of output classes (38 for PlantVillage)
    #[config(default = "38")]
    pub num_classes: usize,

    /// Input image size (square)
    #[config(default = "224")]
    pub input_size: usize,

    #[config(default = "0.3")]
    pub dropout_rate: f64,

    /// Base number of convolutional filters, doubled per block
    #[config(default = "32")]
    pub base_filters: usize,

    /// Width of the hidden fully connected layer
    #[config(default = "256")]
    pub hidden_units: usize,
}

/// Conv2d, BatchNorm, ReLU and a 2x2 max-pool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Plant leaf classifier
///
/// Architecture:
/// - 4 convolutional blocks, filters `base → 2·base → 4·base → 8·base`
/// - Global average pooling
/// - Fully connected head with dropout
#[derive(Module, Debug)]
pub struct LeafClassifier<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub conv4: ConvBlock<B>,

    pub global_pool: AdaptiveAvgPool2d,

    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> LeafClassifier<B> {
    pub fn new(config: &LeafClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        Self {
            conv1: ConvBlock::new(CHANNELS, base, device),
            conv2: ConvBlock::new(base, base * 2, device),
            conv3: ConvBlock::new(base * 2, base * 4, device),
            conv4: ConvBlock::new(base * 4, base * 8, device),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: LinearConfig::new(base * 8, config.hidden_units).init(device),
            dropout: DropoutConfig::new(config.dropout_rate).init(),
            fc2: LinearConfig::new(config.hidden_units, config.num_classes).init(device),
            num_classes: config.num_classes,
        }
    }

    /// Logits for a `[batch, 3, height, width]` input
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        // [B, C, H, W] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Class probabilities
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

/// Float precision the weight record was saved with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightPrecision {
    #[default]
    Full,
    Half,
}

/// Contents of `model.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub format: String,
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    #[serde(default = "default_input_size")]
    pub input_size: usize,
    #[serde(default = "default_base_filters")]
    pub base_filters: usize,
    #[serde(default)]
    pub precision: WeightPrecision,
    /// Weight shard files, relative to the descriptor
    pub weights: Vec<String>,
}

fn default_num_classes() -> usize {
    NUM_CLASSES
}

fn default_input_size() -> usize {
    IMAGE_SIZE as usize
}

fn default_base_filters() -> usize {
    32
}

impl ModelDescriptor {
    pub fn validate(&self) -> agro_core::Result<()> {
        if self.format != DESCRIPTOR_FORMAT {
            return Err(Error::ModelUnavailable(format!(
                "unsupported model format {:?} (expected {DESCRIPTOR_FORMAT:?})",
                self.format
            )));
        }
        if self.num_classes == 0 || self.input_size == 0 || self.base_filters == 0 {
            return Err(Error::ModelUnavailable(
                "numClasses, inputSize and baseFilters must be > 0".to_string(),
            ));
        }
        if self.weights.is_empty() {
            return Err(Error::ModelUnavailable("descriptor lists no weight files".to_string()));
        }
        Ok(())
    }

    pub fn model_config(&self) -> LeafClassifierConfig {
        LeafClassifierConfig::new()
            .with_num_classes(self.num_classes)
            .with_input_size(self.input_size)
            .with_base_filters(self.base_filters)
    }
}

/// A loaded model that turns a preprocessed image into class probabilities
pub trait Classifier: Send + Sync {
    /// Square edge length the model expects
    fn input_size(&self) -> usize;

    fn num_classes(&self) -> usize;

    /// Probability per class for a `[1, size, size, 3]` tensor
    fn predict(&self, input: &ImageTensor) -> agro_core::Result<Vec<f32>>;
}

/// [`Classifier`] backed by a Burn [`LeafClassifier`]
pub struct BurnClassifier<B: Backend> {
    // Burn modules are Send but not Sync
    model: Mutex<LeafClassifier<B>>,
    device: B::Device,
    input_size: usize,
    num_classes: usize,
}

impl<B: Backend> BurnClassifier<B> {
    pub fn new(model: LeafClassifier<B>, input_size: usize, device: B::Device) -> Self {
        Self {
            num_classes: model.num_classes(),
            model: Mutex::new(model),
            device,
            input_size,
        }
    }

    /// Build the network described by `descriptor` and load its weight record
    pub fn from_bytes(descriptor: &ModelDescriptor, weights: Vec<u8>, device: &B::Device) -> agro_core::Result<Self> {
        let model = LeafClassifier::<B>::new(&descriptor.model_config(), device);

        let record = match descriptor.precision {
            WeightPrecision::Full => Recorder::<B>::load(
                &NamedMpkBytesRecorder::<FullPrecisionSettings>::default(),
                weights,
                device,
            ),
            WeightPrecision::Half => Recorder::<B>::load(
                &NamedMpkBytesRecorder::<HalfPrecisionSettings>::default(),
                weights,
                device,
            ),
        }
        .map_err(|e| Error::ModelUnavailable(format!("failed to decode weights: {e:?}")))?;

        Ok(Self::new(model.load_record(record), descriptor.input_size, device.clone()))
    }
}

impl<B: Backend> Classifier for BurnClassifier<B> {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn predict(&self, input: &ImageTensor) -> agro_core::Result<Vec<f32>> {
        let [batch, height, width, channels] = input.shape();
        if batch != 1 || height != self.input_size || width != self.input_size || channels != CHANNELS {
            return Err(Error::Inference(format!(
                "model expects [1, {size}, {size}, {CHANNELS}], got {:?}",
                input.shape(),
                size = self.input_size
            )));
        }

        // NHWC -> NCHW
        let data = TensorData::new(input.data().to_vec(), input.shape());
        let x = Tensor::<B, 4>::from_data(data, &self.device).permute([0, 3, 1, 2]);

        let probabilities = {
            let model = self
                .model
                .lock()
                .map_err(|_| Error::Inference("classifier lock poisoned".to_string()))?;
            model.forward_softmax(x)
        };

        probabilities
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::Inference(format!("failed to read output tensor: {e:?}")))
    }
}
