//! Content and style costs.

use crate::vgg::Layer;
use burn::tensor::{backend::Backend, ElementConversion, Tensor};

/// Scale applied to the content cost before weighting
const CONTENT_SCALE: f64 = 0.05;

/// A layer whose Gram matrix contributes to the style cost
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StyleLayer {
    pub layer: Layer,
    pub weight: f32,
}

impl StyleLayer {
    pub fn new(layer: Layer, weight: f32) -> Self {
        Self { layer, weight }
    }

    /// The first convolution of every block, weighted towards the middle
    /// of the network
    pub fn defaults() -> Vec<Self> {
        [(1, 0.5), (2, 0.6), (3, 0.8), (4, 0.8), (5, 0.5)]
            .iter()
            .filter_map(|&(block, weight)| Layer::new(block, 1).map(|l| Self::new(l, weight)))
            .collect()
    }
}

impl std::str::FromStr for StyleLayer {
    type Err = crate::Error;

    /// `block1_conv1:0.5`, or just `block1_conv1` for a weight of 1
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, ':');
        let layer = parts.next().unwrap_or_default().trim().parse()?;

        let weight = match parts.next() {
            Some(w) => w
                .trim()
                .parse()
                .map_err(|_e| crate::Error::InvalidLayerWeight(s.to_owned()))?,
            None => 1.0,
        };

        Ok(Self { layer, weight })
    }
}

/// The costs of a single iteration
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Costs {
    /// `alpha * content + beta * style`
    pub total: f32,
    /// Unweighted content cost
    pub content: f32,
    /// Unweighted style cost, summed over the style layers
    pub style: f32,
}

/// Channel correlations of a `[1, C, H, W]` activation, as a `[C, C]` matrix
pub fn gram_matrix<B: Backend>(features: Tensor<B, 4>) -> Tensor<B, 2> {
    let [n, c, h, w] = features.dims();
    let unrolled = features.reshape([n * c, h * w]);

    unrolled.clone().matmul(unrolled.transpose())
}

/// `0.05 * mean((a_c - a_g)^2)`
pub fn content_cost<B: Backend>(target: Tensor<B, 4>, generated: Tensor<B, 4>) -> Tensor<B, 1> {
    (target - generated)
        .powf_scalar(2.0)
        .mean()
        .mul_scalar(CONTENT_SCALE)
}

/// A style target precomputed from the style image
pub struct StyleTarget<B: Backend> {
    pub(crate) layer: StyleLayer,
    gram: Tensor<B, 2>,
}

impl<B: Backend> StyleTarget<B> {
    /// `features` are the style image's activations at `layer`
    pub fn new(layer: StyleLayer, features: Tensor<B, 4>) -> Self {
        let norm = gram_norm(&features);
        Self {
            layer,
            gram: gram_matrix(features).div_scalar(norm).detach(),
        }
    }

    /// `mean((G_s - G_g)^2) / (4 * C^2 * (H*W)^2)`, unweighted
    ///
    /// Both Grams are divided by `2*C*H*W` before the difference is squared,
    /// which is the same value but keeps large layers inside f32 range.
    pub fn cost(&self, generated: Tensor<B, 4>) -> Tensor<B, 1> {
        let norm = gram_norm(&generated);
        let gram = gram_matrix(generated).div_scalar(norm);

        (self.gram.clone() - gram).powf_scalar(2.0).mean()
    }
}

fn gram_norm<B: Backend>(features: &Tensor<B, 4>) -> f64 {
    let [_, c, h, w] = features.dims();
    2.0 * c as f64 * (h * w) as f64
}

/// Reads a single element tensor back as an `f32`
pub(crate) fn scalar<B: Backend>(t: Tensor<B, 1>) -> f32 {
    t.into_scalar().elem::<f32>()
}
