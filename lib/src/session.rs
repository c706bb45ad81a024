use crate::*;
use burn::tensor::backend::AutodiffBackend;

/// Style transfer session.
///
/// Calling `run()` optimizes a new image and returns it, consuming the
/// session in the process. You can provide a `GeneratorProgress`
/// implementation to get an update after every iteration, with the costs of
/// that iteration and, every `snapshot_every` iterations, the current image.
///
/// # Example
/// ```no_run
/// let session = neural_style::Session::builder()
///     .content(&"imgs/lotus.jpg")
///     .style(&"imgs/style.jpg")
///     .weights(&"vgg19.pth")
///     .iterations(500)
///     .build().expect("failed to build session");
///
/// let generated_img = session.run(None);
/// generated_img.save("my_generated_img.jpg").expect("failed to save image");
/// ```
pub struct Session<B: AutodiffBackend = DefaultBackend> {
    targets: transfer::Targets<B>,
    canvas: transfer::Canvas<B>,
    params: Parameters,
}

impl Session {
    /// Creates a new session with default parameters.
    pub fn builder<'a>() -> SessionBuilder<'a> {
        SessionBuilder::default()
    }
}

impl<B: AutodiffBackend> Session<B> {
    /// Runs the optimization and outputs the generated image.
    pub fn run(self, progress: Option<Box<dyn GeneratorProgress>>) -> GeneratedImage {
        let outcome = self
            .targets
            .run(self.canvas, &self.params.to_optimization(), progress);

        GeneratedImage {
            image: outcome.image,
            snapshots: outcome.snapshots,
            costs: outcome.costs,
        }
    }
}

/// Builds a session by setting parameters and adding input images, calling
/// `build` will check all of the provided inputs to verify that style
/// transfer will provide valid output
#[derive(Default)]
pub struct SessionBuilder<'a> {
    content: Option<ImageSource<'a>>,
    style: Option<ImageSource<'a>>,
    weights: Option<FeatureWeights<'a>>,
    weights_path: Option<&'a Path>,
    params: Parameters,
}

impl<'a> SessionBuilder<'a> {
    /// Creates a new `SessionBuilder`, can also be created via
    /// `Session::builder()`
    pub fn new() -> Self {
        Self::default()
    }

    /// The image whose structure is preserved in the output
    pub fn content<I: Into<ImageSource<'a>>>(mut self, content: I) -> Self {
        self.content = Some(content.into());
        self
    }

    /// The image whose colors and textures are transferred onto the content.
    ///
    /// It is resized to the dimensions of the content image.
    pub fn style<I: Into<ImageSource<'a>>>(mut self, style: I) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Path to the VGG19 weights, the format is determined by the file
    /// extension, see [`FeatureWeights::from_path`]
    pub fn weights<P: AsRef<Path> + ?Sized>(mut self, path: &'a P) -> Self {
        self.weights_path = Some(path.as_ref());
        self.weights = None;
        self
    }

    /// Explicitly specify where the extractor weights come from
    pub fn feature_weights(mut self, weights: FeatureWeights<'a>) -> Self {
        self.weights = Some(weights);
        self.weights_path = None;
        self
    }

    /// The input convention the extractor weights were trained with.
    ///
    /// Default: `InputConvention::Torch`
    pub fn input_convention(mut self, convention: InputConvention) -> Self {
        self.params.convention = convention;
        self
    }

    /// Resizes the content image, and therefore the output, before
    /// optimizing.
    ///
    /// Default: the content image's own size
    pub fn resize_content(mut self, dims: Dims) -> Self {
        self.params.resize_content = Some(dims);
        self
    }

    /// The layer whose activations the output should share with the content.
    ///
    /// Default: `block5_conv2`
    pub fn content_layer(mut self, layer: Layer) -> Self {
        self.params.content_layer = layer;
        self
    }

    /// The layers whose Gram matrices the output should share with the
    /// style, and how much each one contributes.
    ///
    /// Default: `block1_conv1` through `block5_conv1` weighted
    /// 0.5, 0.6, 0.8, 0.8, 0.5
    pub fn style_layers<I: IntoIterator<Item = StyleLayer>>(mut self, layers: I) -> Self {
        self.params.style_layers = layers.into_iter().collect();
        self
    }

    /// Weight of the content cost in the total cost, usually called alpha.
    ///
    /// Default: 1e-5
    pub fn content_weight(mut self, alpha: f32) -> Self {
        self.params.content_weight = alpha;
        self
    }

    /// Weight of the style cost in the total cost, usually called beta.
    ///
    /// Default: 1e-2
    pub fn style_weight(mut self, beta: f32) -> Self {
        self.params.style_weight = beta;
        self
    }

    /// Adam learning rate, in 0-255 pixel units.
    ///
    /// Default: 10.0
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.params.learning_rate = lr;
        self
    }

    /// Number of optimization steps.
    ///
    /// Default: 2000
    pub fn iterations(mut self, count: u32) -> Self {
        self.params.iterations = count;
        self
    }

    /// Keep a copy of the image every `n` iterations, starting with the first.
    ///
    /// Default: 200
    pub fn snapshot_every(mut self, n: u32) -> Self {
        self.params.snapshot_every = n;
        self
    }

    /// How the generated image starts out.
    ///
    /// Default: `Init::Content`
    pub fn init(mut self, init: Init) -> Self {
        self.params.init = init;
        self
    }

    /// Seeds the noise used by `Init::Noise`.
    pub fn seed(mut self, value: u64) -> Self {
        self.params.seed = value;
        self
    }

    /// Creates a `Session` on the default CPU backend, or returns an error if
    /// invalid parameters or input images were specified.
    pub fn build(self) -> Result<Session, Error> {
        self.build_with_device::<DefaultBackend>(&Default::default())
    }

    /// Creates a `Session` that runs on the specified burn autodiff backend
    /// and device.
    pub fn build_with_device<B: AutodiffBackend>(
        self,
        device: &B::Device,
    ) -> Result<Session<B>, Error> {
        self.check_parameters_validity()?;

        let weights = match (self.weights, self.weights_path) {
            (Some(weights), _) => weights,
            (None, Some(path)) => FeatureWeights::from_path(path)?,
            (None, None) => return Err(Error::MissingWeights),
        };

        let content = self.content.ok_or(Error::MissingImage("content"))?;
        let style = self.style.ok_or(Error::MissingImage("style"))?;

        let content = load_image(content, self.params.resize_content)?;
        let dims = Dims::new(content.width(), content.height());
        check_image_size("content", dims)?;

        let style = load_image(style, Some(dims))?;

        log::info!(
            "transferring style onto a {}x{} content image",
            dims.width,
            dims.height
        );

        let extractor = Vgg19::<B>::load(weights, device)?;
        let convention = self.params.convention;

        let content = preprocess::image_to_tensor::<B>(&content, device);
        let style = preprocess::image_to_tensor::<B>(&style, device);

        let content_layer = self.params.content_layer;
        let content_target = extractor
            .features(convention.adapt(content.clone()), &[content_layer])
            .into_iter()
            .next()
            .map(|t| t.detach())
            .ok_or_else(|| Error::UnknownLayer(content_layer.to_string()))?;

        let style_layers: Vec<Layer> = self.params.style_layers.iter().map(|sl| sl.layer).collect();
        let style_targets = extractor
            .features(convention.adapt(style), &style_layers)
            .into_iter()
            .zip(self.params.style_layers.iter())
            .map(|(features, sl)| StyleTarget::new(*sl, features))
            .collect();

        let canvas = transfer::Canvas::new(content, self.params.init, self.params.seed);

        Ok(Session {
            targets: transfer::Targets {
                extractor,
                convention,
                content_layer,
                content_target,
                style_targets,
            },
            canvas,
            params: self.params,
        })
    }

    fn check_parameters_validity(&self) -> Result<(), Error> {
        if self.params.iterations == 0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 1.0,
                max: f64::from(u32::MAX),
                value: 0.0,
                name: "iterations",
            }));
        }

        if self.params.snapshot_every == 0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 1.0,
                max: f64::from(u32::MAX),
                value: 0.0,
                name: "snapshot-every",
            }));
        }

        let lr = self.params.learning_rate;
        if !(lr.is_finite() && lr > 0.0) {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 0.0,
                max: f64::INFINITY,
                value: self.params.learning_rate,
                name: "learning-rate",
            }));
        }

        for &(name, weight) in &[
            ("content-weight", self.params.content_weight),
            ("style-weight", self.params.style_weight),
        ] {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(Error::InvalidRange(errors::InvalidRange {
                    min: 0.0,
                    max: f64::INFINITY,
                    value: f64::from(weight),
                    name,
                }));
            }
        }

        if self.params.style_layers.is_empty() {
            return Err(Error::NoStyleLayers);
        }

        for sl in &self.params.style_layers {
            if !(sl.weight.is_finite() && sl.weight >= 0.0) {
                return Err(Error::InvalidRange(errors::InvalidRange {
                    min: 0.0,
                    max: f64::INFINITY,
                    value: f64::from(sl.weight),
                    name: "style-layer-weight",
                }));
            }
        }

        if let Init::Noise { ratio } = self.params.init {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Error::InvalidRange(errors::InvalidRange {
                    min: 0.0,
                    max: 1.0,
                    value: f64::from(ratio),
                    name: "noise-ratio",
                }));
            }
        }

        Ok(())
    }
}

fn check_image_size(name: &'static str, dims: Dims) -> Result<(), Error> {
    if dims.width < vgg::MIN_INPUT_SIZE || dims.height < vgg::MIN_INPUT_SIZE {
        return Err(Error::ImageTooSmall(errors::ImageTooSmall {
            name,
            dims,
            min: vgg::MIN_INPUT_SIZE,
        }));
    }

    Ok(())
}

/// Helper struct for passing progress information to external callers
pub struct ProgressStat {
    /// The current amount of work that has been done
    pub current: usize,
    /// The total amount of work to do
    pub total: usize,
}

/// The current state of the optimization
pub struct ProgressUpdate<'a> {
    /// The current image, only provided on snapshot iterations
    pub image: Option<&'a image::RgbImage>,
    /// Iterations completed so far
    pub iterations: ProgressStat,
    /// The costs of the iteration that just completed
    pub costs: Costs,
}

/// Allows the optimization to update external callers with the current
/// progress of the style transfer
pub trait GeneratorProgress {
    fn update(&mut self, info: ProgressUpdate<'_>);
}

impl<G> GeneratorProgress for G
where
    G: FnMut(ProgressUpdate<'_>) + Send,
{
    fn update(&mut self, info: ProgressUpdate<'_>) {
        self(info)
    }
}
