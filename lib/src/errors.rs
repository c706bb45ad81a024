use crate::Dims;
use std::fmt;

#[derive(Debug)]
pub struct InvalidRange {
    pub(crate) min: f64,
    pub(crate) max: f64,
    pub(crate) value: f64,
    pub(crate) name: &'static str,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' - value '{}' is outside the range of {}-{}",
            self.name, self.value, self.min, self.max
        )
    }
}

#[derive(Debug)]
pub struct ImageTooSmall {
    pub(crate) name: &'static str,
    pub(crate) dims: Dims,
    pub(crate) min: u32,
}

impl fmt::Display for ImageTooSmall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the {} image ({}x{}) is smaller than the {}x{} minimum the feature extractor accepts",
            self.name, self.dims.width, self.dims.height, self.min, self.min
        )
    }
}

#[derive(Debug)]
pub enum Error {
    /// An error in the image library occurred, eg failed to load/save
    Image(image::ImageError),
    /// An input parameter had an invalid range specified
    InvalidRange(InvalidRange),
    /// An input image can't pass through every pooling stage of the extractor
    ImageTooSmall(ImageTooSmall),
    /// Io is notoriously error free with no problems, but we cover it just in case!
    Io(std::io::Error),
    /// The user specified an image format we don't support as the output
    UnsupportedOutputFormat(String),
    /// The weights file extension isn't one we know how to read
    UnsupportedWeightsFormat(String),
    /// The weights file could not be read into the extractor
    Weights(String),
    /// A layer name that isn't one of the VGG19 convolutions
    UnknownLayer(String),
    /// A style layer weight that isn't a number
    InvalidLayerWeight(String),
    /// The content or style image was never provided
    MissingImage(&'static str),
    /// No extractor weights were provided
    MissingWeights,
    /// Style cost needs at least one layer to compare Gram matrices on
    NoStyleLayers,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(ie) => write!(f, "{}", ie),
            Self::InvalidRange(ir) => write!(f, "{}", ir),
            Self::ImageTooSmall(its) => write!(f, "{}", its),
            Self::Io(io) => write!(f, "{}", io),
            Self::UnsupportedOutputFormat(fmt) => {
                write!(f, "the output format '{}' is not supported", fmt)
            }
            Self::UnsupportedWeightsFormat(ext) => write!(
                f,
                "weights with extension '{}' are not supported, expected one of 'pth', 'pt', 'mpk'",
                ext
            ),
            Self::Weights(msg) => write!(f, "failed to load extractor weights: {}", msg),
            Self::UnknownLayer(name) => write!(
                f,
                "'{}' is not a VGG19 layer, expected a name like 'block5_conv2'",
                name
            ),
            Self::InvalidLayerWeight(spec) => write!(
                f,
                "'{}' has an invalid weight, expected a number like 'block1_conv1:0.5'",
                spec
            ),
            Self::MissingImage(which) => write!(f, "a {} image must be provided", which),
            Self::MissingWeights => write!(f, "feature extractor weights must be provided"),
            Self::NoStyleLayers => write!(f, "at least 1 style layer must be selected"),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(ie: image::ImageError) -> Self {
        Self::Image(ie)
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::Io(io)
    }
}

impl From<burn::record::RecorderError> for Error {
    fn from(re: burn::record::RecorderError) -> Self {
        Self::Weights(re.to_string())
    }
}
