//! Conversion between images and the pixel space the generated image is
//! optimized in.
//!
//! The optimized tensor always lives in the "Caffe" space: `[1, 3, H, W]`,
//! BGR channel order, 0-255 values with the `ImageNet` channel means
//! subtracted. Extractor weights that were trained on a different input
//! convention get an [`InputConvention`] adapter applied right before the
//! first convolution, which keeps the learning rate scale independent of the
//! weights in use.

use burn::tensor::{backend::Backend, Tensor, TensorData};

/// `ImageNet` channel means, in BGR order
pub const MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

const TORCH_MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];
const TORCH_STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

/// The input convention a set of extractor weights was trained with
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputConvention {
    /// BGR, 0-255, mean subtracted. Weights converted from the original Caffe
    /// or Keras VGG19 release.
    Caffe,
    /// RGB, 0-1, normalized by the `ImageNet` mean and standard deviation.
    /// Weights from torchvision.
    Torch,
}

impl Default for InputConvention {
    fn default() -> Self {
        Self::Torch
    }
}

impl std::str::FromStr for InputConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "caffe" => Ok(Self::Caffe),
            "torch" => Ok(Self::Torch),
            other => Err(format!(
                "input convention `{}` not one of: 'caffe', 'torch'",
                other
            )),
        }
    }
}

impl InputConvention {
    /// Maps a Caffe space tensor into the space the weights expect. The map
    /// is affine per channel, so gradients flow through it untouched.
    pub fn adapt<B: Backend>(self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Caffe => x,
            Self::Torch => {
                let device = x.device();

                // BGR -> RGB
                let rgb = Tensor::cat(
                    vec![x.clone().narrow(1, 2, 1), x.clone().narrow(1, 1, 1), x.narrow(1, 0, 1)],
                    1,
                );

                let (scale, shift) = torch_affine();
                let scale = Tensor::<B, 1>::from_floats(scale, &device).reshape([1, 3, 1, 1]);
                let shift = Tensor::<B, 1>::from_floats(shift, &device).reshape([1, 3, 1, 1]);

                rgb * scale + shift
            }
        }
    }
}

// ((rgb + mean) / 255 - torch_mean) / torch_std, folded into rgb * scale + shift
fn torch_affine() -> ([f32; 3], [f32; 3]) {
    let mut scale = [0.0; 3];
    let mut shift = [0.0; 3];

    for c in 0..3 {
        let caffe_mean = MEAN_BGR[2 - c];
        scale[c] = 1.0 / (255.0 * TORCH_STD_RGB[c]);
        shift[c] = (caffe_mean / 255.0 - TORCH_MEAN_RGB[c]) / TORCH_STD_RGB[c];
    }

    (scale, shift)
}

/// Converts an image into a `[1, 3, H, W]` Caffe space tensor
pub fn image_to_tensor<B: Backend>(img: &image::RgbImage, device: &B::Device) -> Tensor<B, 4> {
    let (width, height) = img.dimensions();
    let plane = width as usize * height as usize;

    let mut values = vec![0.0f32; 3 * plane];
    for (i, px) in img.pixels().enumerate() {
        values[i] = f32::from(px[2]) - MEAN_BGR[0];
        values[plane + i] = f32::from(px[1]) - MEAN_BGR[1];
        values[2 * plane + i] = f32::from(px[0]) - MEAN_BGR[2];
    }

    Tensor::from_data(
        TensorData::new(values, [1, 3, height as usize, width as usize]),
        device,
    )
}

/// Converts a Caffe space tensor back into a displayable image. Only the
/// first image of the batch is used, and values are rounded to the nearest
/// level and clipped to 0-255.
pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 4>) -> image::RgbImage {
    let [_, channels, height, width] = tensor.dims();
    debug_assert_eq!(channels, 3);

    let plane = width * height;
    let values: Vec<f32> = tensor.into_data().iter::<f32>().take(3 * plane).collect();

    let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;

    image::RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let i = y as usize * width + x as usize;
        image::Rgb([
            to_u8(values[2 * plane + i] + MEAN_BGR[2]),
            to_u8(values[plane + i] + MEAN_BGR[1]),
            to_u8(values[i] + MEAN_BGR[0]),
        ])
    })
}
