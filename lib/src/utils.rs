use crate::{Dims, Error};
use std::path::Path;

/// Helper type used to define the source of `ImageSource`'s data
#[derive(Clone)]
pub enum ImageSource<'a> {
    /// A raw buffer of image data, see `image::load_from_memory` for details
    /// on what is supported
    Memory(&'a [u8]),
    /// The path to an image to load from disk. The image format is inferred
    /// from the file extension, see `image::open` for details
    Path(&'a Path),
    /// An already loaded image that is passed directly to the session
    Image(image::DynamicImage),
}

impl<'a> ImageSource<'a> {
    pub fn from_path(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<image::DynamicImage> for ImageSource<'a> {
    fn from(img: image::DynamicImage) -> Self {
        Self::Image(img)
    }
}

impl<'a> From<image::RgbImage> for ImageSource<'a> {
    fn from(img: image::RgbImage) -> Self {
        Self::Image(image::DynamicImage::ImageRgb8(img))
    }
}

impl<'a, S> From<&'a S> for ImageSource<'a>
where
    S: AsRef<Path> + 'a,
{
    fn from(path: &'a S) -> Self {
        Self::Path(path.as_ref())
    }
}

pub fn load_dynamic_image(src: ImageSource<'_>) -> Result<image::DynamicImage, image::ImageError> {
    match src {
        ImageSource::Memory(data) => image::load_from_memory(data),
        ImageSource::Path(path) => image::open(path),
        ImageSource::Image(img) => Ok(img),
    }
}

/// Loads an image, dropping any alpha channel, and resizes it if `resize`
/// differs from its natural size
pub(crate) fn load_image(src: ImageSource<'_>, resize: Option<Dims>) -> Result<image::RgbImage, Error> {
    let img = load_dynamic_image(src)?.to_rgb8();

    let img = match resize {
        Some(size) if img.width() != size.width || img.height() != size.height => {
            image::imageops::resize(&img, size.width, size.height, image::imageops::CatmullRom)
        }
        _ => img,
    };

    Ok(img)
}

#[cfg(test)]
mod test {
    use super::*;

    fn checker(width: u32, height: u32) -> image::RgbImage {
        image::RgbImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn keeps_natural_size_without_resize() {
        let img = load_image(checker(7, 5).into(), None).unwrap();
        assert_eq!(img.dimensions(), (7, 5));
        assert_eq!(img.get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn resizes_to_requested_dims() {
        let img = load_image(checker(7, 5).into(), Some(Dims::new(20, 16))).unwrap();
        assert_eq!(img.dimensions(), (20, 16));
    }

    #[test]
    fn drops_alpha() {
        let rgba = image::RgbaImage::from_pixel(3, 3, image::Rgba([10, 20, 30, 0]));
        let img = load_image(image::DynamicImage::ImageRgba8(rgba).into(), None).unwrap();
        assert_eq!(img.get_pixel(1, 1), &image::Rgb([10, 20, 30]));
    }

    #[test]
    fn bad_memory_is_an_image_error() {
        let err = load_image(ImageSource::Memory(b"definitely not a png"), None).unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }
}
