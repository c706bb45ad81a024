//! VGG19 feature extractor.
//!
//! Only the convolutional trunk is built; the classifier head is never used
//! for style transfer. Every activation handed out is the post-ReLU output of
//! one of the sixteen convolutions.

use crate::Error;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::{activation::relu, backend::Backend, Tensor};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::fmt;
use std::path::Path;

/// Four poolings happen before block 5, so anything smaller loses a spatial
/// dimension entirely
pub const MIN_INPUT_SIZE: u32 = 16;

/// Number of convolutions in each of the 5 blocks
const BLOCK_SIZES: [usize; 5] = [2, 2, 4, 4, 4];

/// One of the sixteen VGG19 convolution outputs
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Layer {
    block: u8,
    conv: u8,
}

impl Layer {
    /// `block5_conv2`, deep enough to keep layout while dropping texture
    pub const DEFAULT_CONTENT: Self = Self { block: 5, conv: 2 };

    /// Returns the layer for `block` (1-5) and `conv` within the block, or
    /// `None` if that convolution doesn't exist in VGG19
    pub fn new(block: u8, conv: u8) -> Option<Self> {
        let size = *BLOCK_SIZES.get(usize::from(block).checked_sub(1)?)?;
        if conv == 0 || usize::from(conv) > size {
            return None;
        }

        Some(Self { block, conv })
    }

    pub fn block(self) -> u8 {
        self.block
    }

    pub fn conv(self) -> u8 {
        self.conv
    }

    /// Index of the convolution in the trunk, 0-15
    pub fn index(self) -> usize {
        let preceding: usize = BLOCK_SIZES[..usize::from(self.block) - 1].iter().sum();
        preceding + usize::from(self.conv) - 1
    }

    fn from_index(index: usize) -> Self {
        let mut remaining = index;
        for (b, &size) in BLOCK_SIZES.iter().enumerate() {
            if remaining < size {
                return Self {
                    block: b as u8 + 1,
                    conv: remaining as u8 + 1,
                };
            }
            remaining -= size;
        }

        unreachable!("VGG19 only has 16 convolutions")
    }

    /// The index the torchvision `features` sequential gives this convolution
    fn torchvision_index(self) -> usize {
        // every conv is followed by a ReLU, every block but the last by a pool
        2 * self.index() + usize::from(self.block) - 1
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}_conv{}", self.block, self.conv)
    }
}

impl std::str::FromStr for Layer {
    type Err = Error;

    /// Accepts `block5_conv2`, as well as the `conv5_2` and `relu5_2`
    /// spellings used by most papers
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || Error::UnknownLayer(s.to_owned());

        let (block, conv) = if let Some(rest) = s.strip_prefix("block") {
            let mut parts = rest.splitn(2, "_conv");
            (parts.next(), parts.next())
        } else if let Some(rest) = s.strip_prefix("conv").or_else(|| s.strip_prefix("relu")) {
            let mut parts = rest.splitn(2, '_');
            (parts.next(), parts.next())
        } else {
            return Err(unknown());
        };

        let block = block.and_then(|b| b.parse().ok()).ok_or_else(unknown)?;
        let conv = conv.and_then(|c| c.parse().ok()).ok_or_else(unknown)?;

        Self::new(block, conv).ok_or_else(unknown)
    }
}

/// Where the extractor weights come from
#[derive(Copy, Clone, Debug)]
pub enum FeatureWeights<'a> {
    /// A torchvision `vgg19` state dict (`.pth`)
    PyTorch(&'a Path),
    /// A burn named MessagePack record (`.mpk`), see [`convert_pytorch_weights`]
    Burn(&'a Path),
    /// Randomly initialized weights. Random networks still capture enough
    /// texture statistics for rough style experiments.
    Untrained { seed: u64 },
}

impl<'a> FeatureWeights<'a> {
    /// Picks the weights format from the file extension
    pub fn from_path(path: &'a Path) -> Result<Self, Error> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pth") | Some("pt") => Ok(Self::PyTorch(path)),
            Some("mpk") => Ok(Self::Burn(path)),
            other => Err(Error::UnsupportedWeightsFormat(
                other.unwrap_or_default().to_owned(),
            )),
        }
    }
}

#[derive(Module, Debug)]
pub struct Vgg19<B: Backend> {
    conv1_1: Conv2d<B>,
    conv1_2: Conv2d<B>,

    conv2_1: Conv2d<B>,
    conv2_2: Conv2d<B>,

    conv3_1: Conv2d<B>,
    conv3_2: Conv2d<B>,
    conv3_3: Conv2d<B>,
    conv3_4: Conv2d<B>,

    conv4_1: Conv2d<B>,
    conv4_2: Conv2d<B>,
    conv4_3: Conv2d<B>,
    conv4_4: Conv2d<B>,

    conv5_1: Conv2d<B>,
    conv5_2: Conv2d<B>,
    conv5_3: Conv2d<B>,
    conv5_4: Conv2d<B>,

    pool: MaxPool2d,
}

impl<B: Backend> Vgg19<B> {
    /// Creates a randomly initialized extractor
    pub fn new(device: &B::Device) -> Self {
        let conv = |in_ch, out_ch| {
            Conv2dConfig::new([in_ch, out_ch], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(true)
                .init(device)
        };

        Self {
            conv1_1: conv(3, 64),
            conv1_2: conv(64, 64),

            conv2_1: conv(64, 128),
            conv2_2: conv(128, 128),

            conv3_1: conv(128, 256),
            conv3_2: conv(256, 256),
            conv3_3: conv(256, 256),
            conv3_4: conv(256, 256),

            conv4_1: conv(256, 512),
            conv4_2: conv(512, 512),
            conv4_3: conv(512, 512),
            conv4_4: conv(512, 512),

            conv5_1: conv(512, 512),
            conv5_2: conv(512, 512),
            conv5_3: conv(512, 512),
            conv5_4: conv(512, 512),

            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    /// Creates an extractor from the specified weights. The returned module
    /// does not track gradients for its own parameters.
    pub fn load(weights: FeatureWeights<'_>, device: &B::Device) -> Result<Self, Error> {
        let vgg = match weights {
            FeatureWeights::PyTorch(path) => {
                log::info!("loading PyTorch VGG19 weights from {}", path.display());

                let record: Vgg19Record<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
                    .load(torchvision_load_args(path), device)?;
                Self::new(device).load_record(record)
            }
            FeatureWeights::Burn(path) => {
                log::info!("loading VGG19 record from {}", path.display());

                Self::new(device).load_file(
                    path.to_path_buf(),
                    &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
                    device,
                )?
            }
            FeatureWeights::Untrained { seed } => {
                log::info!("initializing an untrained VGG19 with seed {}", seed);

                B::seed(seed);
                Self::new(device)
            }
        };

        Ok(vgg.no_grad())
    }

    pub(crate) fn convs(&self) -> [&Conv2d<B>; 16] {
        [
            &self.conv1_1,
            &self.conv1_2,
            &self.conv2_1,
            &self.conv2_2,
            &self.conv3_1,
            &self.conv3_2,
            &self.conv3_3,
            &self.conv3_4,
            &self.conv4_1,
            &self.conv4_2,
            &self.conv4_3,
            &self.conv4_4,
            &self.conv5_1,
            &self.conv5_2,
            &self.conv5_3,
            &self.conv5_4,
        ]
    }

    /// Runs the trunk only as deep as the deepest requested layer and returns
    /// the activations in the same order as `layers`
    pub fn features(&self, input: Tensor<B, 4>, layers: &[Layer]) -> Vec<Tensor<B, 4>> {
        let deepest = match layers.iter().map(|l| l.index()).max() {
            Some(deepest) => deepest,
            None => return Vec::new(),
        };

        let mut found: Vec<Option<Tensor<B, 4>>> = vec![None; layers.len()];
        let mut x = input;

        for (index, conv) in self.convs().iter().enumerate().take(deepest + 1) {
            let layer = Layer::from_index(index);
            if layer.block() > 1 && layer.conv() == 1 {
                x = self.pool.forward(x);
            }

            x = relu(conv.forward(x));

            for (slot, wanted) in found.iter_mut().zip(layers) {
                if *wanted == layer {
                    *slot = Some(x.clone());
                }
            }
        }

        found.into_iter().flatten().collect()
    }
}

fn torchvision_load_args(path: &Path) -> LoadArgs {
    (0..16).map(Layer::from_index).fold(
        LoadArgs::new(path.to_path_buf()),
        |args, layer| {
            args.with_key_remap(
                &format!(r"^features\.{}\.(.+)$", layer.torchvision_index()),
                &format!("conv{}_{}.$1", layer.block(), layer.conv()),
            )
        },
    )
}

/// Reads a torchvision VGG19 state dict and saves it as a burn named
/// MessagePack record, which loads faster and without the PyTorch reader
pub fn convert_pytorch_weights(src: &Path, dst: &Path) -> Result<(), Error> {
    type B = burn::backend::NdArray<f32>;
    let device = Default::default();

    let vgg = Vgg19::<B>::load(FeatureWeights::PyTorch(src), &device)?;

    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }

    vgg.save_file(
        dst.to_path_buf(),
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
    )?;

    log::info!("wrote VGG19 record to {}", dst.display());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn layer_names() {
        let layer: Layer = "block5_conv2".parse().unwrap();
        assert_eq!(layer, Layer::new(5, 2).unwrap());
        assert_eq!(layer.to_string(), "block5_conv2");

        assert_eq!("conv3_4".parse::<Layer>().unwrap(), Layer::new(3, 4).unwrap());
        assert_eq!("relu1_1".parse::<Layer>().unwrap(), Layer::new(1, 1).unwrap());

        for bad in &["block1_conv3", "block6_conv1", "conv0_1", "pool1", "block2", ""] {
            assert!(
                matches!(bad.parse::<Layer>(), Err(Error::UnknownLayer(_))),
                "{} parsed",
                bad
            );
        }
    }

    #[test]
    fn layer_indices() {
        for index in 0..16 {
            assert_eq!(Layer::from_index(index).index(), index);
        }

        assert_eq!(Layer::new(1, 1).unwrap().index(), 0);
        assert_eq!(Layer::new(5, 2).unwrap().index(), 13);
    }

    #[test]
    fn torchvision_indices() {
        let expected = [0, 2, 5, 7, 10, 12, 14, 16, 19, 21, 23, 25, 28, 30, 32, 34];
        for (index, tv) in expected.iter().enumerate() {
            assert_eq!(Layer::from_index(index).torchvision_index(), *tv);
        }
    }

    #[test]
    fn weights_format_from_extension() {
        assert!(matches!(
            FeatureWeights::from_path(Path::new("vgg19.pth")),
            Ok(FeatureWeights::PyTorch(_))
        ));
        assert!(matches!(
            FeatureWeights::from_path(Path::new("vgg19.mpk")),
            Ok(FeatureWeights::Burn(_))
        ));
        assert!(matches!(
            FeatureWeights::from_path(Path::new("vgg19.h5")),
            Err(Error::UnsupportedWeightsFormat(ext)) if ext == "h5"
        ));
    }

    #[test]
    fn features_have_expected_shapes() {
        type B = NdArray<f32>;
        let device = Default::default();

        let vgg = Vgg19::<B>::load(FeatureWeights::Untrained { seed: 7 }, &device).unwrap();
        let input = Tensor::<B, 4>::zeros([1, 3, 32, 48], &device);

        let layers = [
            Layer::new(5, 1).unwrap(),
            Layer::new(1, 1).unwrap(),
            Layer::new(3, 1).unwrap(),
        ];
        let features = vgg.features(input, &layers);

        let dims: Vec<_> = features.iter().map(|f| f.dims()).collect();
        assert_eq!(
            dims,
            vec![[1, 512, 2, 3], [1, 64, 32, 48], [1, 256, 8, 12]]
        );
    }

    fn values(features: Vec<Tensor<NdArray<f32>, 4>>) -> Vec<f32> {
        features
            .into_iter()
            .flat_map(|f| f.into_data().iter::<f32>().collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn burn_records_load_back() {
        type B = NdArray<f32>;
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vgg19.mpk");

        let saved = Vgg19::<B>::load(FeatureWeights::Untrained { seed: 11 }, &device).unwrap();
        saved
            .clone()
            .save_file(
                path.clone(),
                &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            )
            .unwrap();

        let weights = FeatureWeights::from_path(&path).unwrap();
        assert!(matches!(weights, FeatureWeights::Burn(_)));
        let loaded = Vgg19::<B>::load(weights, &device).unwrap();

        let layers = [Layer::new(2, 1).unwrap(), Layer::new(1, 2).unwrap()];
        let input = || Tensor::<B, 4>::ones([1, 3, 16, 16], &device);

        let expected = values(saved.features(input(), &layers));
        assert!(expected.iter().any(|v| *v != 0.0));
        assert_eq!(values(loaded.features(input(), &layers)), expected);
    }

    #[test]
    fn missing_records_are_weights_errors() {
        type B = NdArray<f32>;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.mpk");

        assert!(matches!(
            Vgg19::<B>::load(FeatureWeights::Burn(&path), &Default::default()),
            Err(Error::Weights(_))
        ));
    }

    #[test]
    fn loaded_extractor_is_frozen() {
        type B = burn::backend::Autodiff<NdArray<f32>>;
        let device = Default::default();

        let vgg = Vgg19::<B>::load(FeatureWeights::Untrained { seed: 5 }, &device).unwrap();
        for conv in vgg.convs().iter() {
            assert!(!conv.weight.val().is_require_grad());
        }
    }
}
