//! The pixel optimization loop.

use crate::loss::{content_cost, scalar, Costs, StyleTarget};
use crate::preprocess::{tensor_to_image, InputConvention};
use crate::vgg::{Layer, Vgg19};
use crate::{GeneratorProgress, ProgressStat, ProgressUpdate};
use burn::module::{Module, Param};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::{backend::AutodiffBackend, backend::Backend, Tensor, TensorData};
use rand::{Rng, SeedableRng};

/// Half width of the uniform noise used by `Init::Noise`, in 0-255 pixel units
const NOISE_AMPLITUDE: f32 = 20.0;

/// How the generated image starts out
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Init {
    /// Start from the content image itself
    Content,
    /// Start from the content image blended with uniform noise, `ratio` is
    /// the share of noise in the blend (0-1)
    Noise { ratio: f32 },
}

impl Default for Init {
    fn default() -> Self {
        Self::Content
    }
}

/// The image being optimized, as the single trainable parameter of a module
/// so the burn optimizers can drive it
#[derive(Module, Debug)]
pub(crate) struct Canvas<B: Backend> {
    pixels: Param<Tensor<B, 4>>,
}

impl<B: Backend> Canvas<B> {
    pub(crate) fn new(content: Tensor<B, 4>, init: Init, seed: u64) -> Self {
        let pixels = match init {
            Init::Content => content,
            Init::Noise { ratio } => {
                let dims = content.dims();
                let mut rng = rand_pcg::Pcg32::seed_from_u64(seed);
                let noise: Vec<f32> = (0..dims.iter().product::<usize>())
                    .map(|_| rng.gen_range(-NOISE_AMPLITUDE..NOISE_AMPLITUDE))
                    .collect();
                let noise = Tensor::from_data(TensorData::new(noise, dims), &content.device());

                noise.mul_scalar(ratio) + content.mul_scalar(1.0 - ratio)
            }
        };

        Self {
            pixels: Param::from_tensor(pixels),
        }
    }

    pub(crate) fn pixels(&self) -> Tensor<B, 4> {
        self.pixels.val()
    }
}

pub(crate) struct Optimization {
    pub(crate) content_weight: f32,
    pub(crate) style_weight: f32,
    pub(crate) learning_rate: f64,
    pub(crate) iterations: u32,
    pub(crate) snapshot_every: u32,
}

/// The frozen extractor and the detached targets the canvas is pulled towards
pub(crate) struct Targets<B: AutodiffBackend> {
    pub(crate) extractor: Vgg19<B>,
    pub(crate) convention: InputConvention,
    pub(crate) content_layer: Layer,
    pub(crate) content_target: Tensor<B, 4>,
    pub(crate) style_targets: Vec<StyleTarget<B>>,
}

pub(crate) struct Outcome {
    pub(crate) image: image::RgbImage,
    pub(crate) snapshots: Vec<(u32, image::RgbImage)>,
    pub(crate) costs: Vec<Costs>,
}

impl<B: AutodiffBackend> Targets<B> {
    fn layers(&self) -> Vec<Layer> {
        std::iter::once(self.content_layer)
            .chain(self.style_targets.iter().map(|st| st.layer.layer))
            .collect()
    }

    /// Returns `(total, content, style)` for the generated image
    fn forward(
        &self,
        generated: Tensor<B, 4>,
        layers: &[Layer],
        opt: &Optimization,
    ) -> (Tensor<B, 1>, Tensor<B, 1>, Tensor<B, 1>) {
        let device = generated.device();
        let mut features = self
            .extractor
            .features(self.convention.adapt(generated), layers)
            .into_iter();

        let content = match features.next() {
            Some(generated) => content_cost(self.content_target.clone(), generated),
            None => Tensor::zeros([1], &device),
        };

        let style = self
            .style_targets
            .iter()
            .zip(features)
            .map(|(target, generated)| target.cost(generated).mul_scalar(target.layer.weight))
            .reduce(|acc, cost| acc + cost)
            .unwrap_or_else(|| Tensor::zeros([1], &device));

        let total = content.clone().mul_scalar(opt.content_weight)
            + style.clone().mul_scalar(opt.style_weight);

        (total, content, style)
    }

    pub(crate) fn run(
        &self,
        mut canvas: Canvas<B>,
        opt: &Optimization,
        mut progress: Option<Box<dyn GeneratorProgress>>,
    ) -> Outcome {
        let layers = self.layers();
        let mut optimizer = AdamConfig::new()
            .with_beta_1(0.9)
            .with_beta_2(0.999)
            .with_epsilon(1e-7)
            .init::<B, Canvas<B>>();

        let mut snapshots = Vec::new();
        let mut history = Vec::new();

        for i in 0..opt.iterations {
            let (total, content, style) = self.forward(canvas.pixels(), &layers, opt);

            let costs = Costs {
                total: scalar(total.clone()),
                content: scalar(content),
                style: scalar(style),
            };

            let grads = GradientsParams::from_grads(total.backward(), &canvas);
            canvas = optimizer.step(opt.learning_rate, canvas, grads);

            history.push(costs);
            log::debug!(
                "iteration {}/{}: total {} style {} content {}",
                i + 1,
                opt.iterations,
                costs.total,
                costs.style,
                costs.content
            );

            let snapshot = if i % opt.snapshot_every == 0 {
                log::info!(
                    "iteration {}/{}, total cost: {}, style cost: {}, content cost: {}",
                    i + 1,
                    opt.iterations,
                    costs.total,
                    costs.style,
                    costs.content
                );

                snapshots.push((i, tensor_to_image(canvas.pixels().inner())));
                snapshots.last().map(|(_, img)| img)
            } else {
                None
            };

            if let Some(ref mut progress) = progress {
                progress.update(ProgressUpdate {
                    image: snapshot,
                    iterations: ProgressStat {
                        current: i as usize + 1,
                        total: opt.iterations as usize,
                    },
                    costs,
                });
            }
        }

        Outcome {
            image: tensor_to_image(canvas.pixels().inner()),
            snapshots,
            costs: history,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn values(canvas: &Canvas<B>) -> Vec<f32> {
        canvas.pixels().into_data().iter::<f32>().collect()
    }

    #[test]
    fn content_init_is_the_content() {
        let device = Default::default();
        let content = Tensor::<B, 4>::ones([1, 3, 4, 4], &device).mul_scalar(7.0);

        let canvas = Canvas::new(content, Init::Content, 0);
        assert!(values(&canvas).iter().all(|&v| (v - 7.0).abs() < 1e-6));
    }

    #[test]
    fn noise_init_is_a_seeded_blend() {
        let device = Default::default();
        let content = || Tensor::<B, 4>::zeros([1, 3, 8, 8], &device);
        let init = Init::Noise { ratio: 0.5 };

        let a = values(&Canvas::new(content(), init, 9));
        let b = values(&Canvas::new(content(), init, 9));
        let c = values(&Canvas::new(content(), init, 10));

        assert_eq!(a, b);
        assert_ne!(a, c);

        // half of the noise amplitude, around a zero content image
        assert!(a.iter().all(|v| v.abs() <= NOISE_AMPLITUDE * 0.5));
        assert!(a.iter().any(|v| v.abs() > 1.0));
    }

    #[test]
    fn extractor_stays_frozen_while_optimizing() {
        use crate::loss::StyleLayer;
        use crate::vgg::FeatureWeights;

        type AB = burn::backend::Autodiff<B>;
        let device = Default::default();

        let extractor = Vgg19::<AB>::load(FeatureWeights::Untrained { seed: 3 }, &device).unwrap();
        let content_layer = Layer::new(2, 1).unwrap();
        let style_layer = StyleLayer::new(Layer::new(1, 1).unwrap(), 1.0);

        let content = Tensor::<AB, 4>::ones([1, 3, 16, 16], &device).mul_scalar(30.0);
        let style = Tensor::<AB, 4>::ones([1, 3, 16, 16], &device).mul_scalar(-30.0);

        let input = || Tensor::<AB, 4>::ones([1, 3, 16, 16], &device);
        let before: Vec<f32> = extractor.features(input(), &[content_layer])[0]
            .clone()
            .into_data()
            .iter::<f32>()
            .collect();

        let content_target = extractor.features(content.clone(), &[content_layer])[0]
            .clone()
            .detach();
        let style_target = StyleTarget::new(
            style_layer,
            extractor.features(style, &[style_layer.layer])[0].clone(),
        );

        let targets = Targets {
            extractor,
            convention: InputConvention::Caffe,
            content_layer,
            content_target,
            style_targets: vec![style_target],
        };

        let opt = Optimization {
            content_weight: 1.0,
            style_weight: 1.0,
            learning_rate: 1.0,
            iterations: 1,
            snapshot_every: 1,
        };

        let outcome = targets.run(Canvas::new(content, Init::Content, 0), &opt, None);
        assert_eq!(outcome.costs.len(), 1);
        assert_eq!(outcome.snapshots.len(), 1);

        let after: Vec<f32> = targets.extractor.features(input(), &[content_layer])[0]
            .clone()
            .into_data()
            .iter::<f32>()
            .collect();
        assert_eq!(before, after);

        for conv in targets.extractor.convs().iter() {
            assert!(!conv.weight.val().is_require_grad());
        }
    }
}
