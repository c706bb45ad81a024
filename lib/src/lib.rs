// BEGIN - Embark standard lints v0.4
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v0.4

//! `neural-style` is a light API for neural style transfer: it optimizes the
//! pixels of an image so that its VGG19 activations match those of a content
//! image, while the Gram matrices of those activations match a style image.
//!
//! First, you build a `Session` via a `SessionBuilder`, which follows the builder pattern. Calling
//! `build` on the `SessionBuilder` loads both input images and the feature extractor, and checks
//! for various errors.
//!
//! `Session` has a `run()` method that runs the optimization with all of the parameters added in
//! the session builder, and returns the result as a `GeneratedImage`.
//!
//! You can save, stream, or inspect the image from `GeneratedImage`, as well as the intermediate
//! snapshots and the cost of every iteration.
//!
//! ## Usage
//! Session follows a "builder pattern" for defining parameters, meaning you chain functions together.
//!
//! ```no_run
//! // Create a new session with default parameters
//! let session = neural_style::Session::builder()
//!     // Specify the content and style images
//!     .content(&"imgs/lotus.jpg")
//!     .style(&"imgs/style.jpg")
//!     // A torchvision VGG19 state dict
//!     .weights(&"vgg19.pth")
//!     // Set some parameters
//!     .iterations(1000)
//!     .learning_rate(8.0)
//!     // Build the session
//!     .build().expect("failed to build session");
//!
//! // Generate a new image
//! let generated_img = session.run(None);
//!
//! // Save the generated image to disk
//! generated_img.save("my_generated_img.jpg").expect("failed to save generated image");
//! ```
mod errors;
pub mod loss;
pub mod preprocess;
pub mod session;
mod transfer;
mod utils;
use utils::*;
pub mod vgg;

pub use image;
use std::path::Path;

pub use errors::Error;
pub use loss::{Costs, StyleLayer, StyleTarget};
pub use preprocess::InputConvention;
pub use session::{GeneratorProgress, ProgressStat, ProgressUpdate, Session, SessionBuilder};
pub use transfer::Init;
pub use utils::{load_dynamic_image, ImageSource};
pub use vgg::{convert_pytorch_weights, FeatureWeights, Layer, Vgg19};

/// The backend sessions run on unless built with `build_with_device`
pub type DefaultBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;

/// Simple dimensions struct
#[derive(Copy, Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

struct Parameters {
    convention: InputConvention,
    resize_content: Option<Dims>,
    content_layer: Layer,
    style_layers: Vec<StyleLayer>,
    content_weight: f32,
    style_weight: f32,
    learning_rate: f64,
    iterations: u32,
    snapshot_every: u32,
    init: Init,
    seed: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            convention: InputConvention::default(),
            resize_content: None,
            content_layer: Layer::DEFAULT_CONTENT,
            style_layers: StyleLayer::defaults(),
            content_weight: 1e-5,
            style_weight: 1e-2,
            learning_rate: 10.0,
            iterations: 2000,
            snapshot_every: 200,
            init: Init::Content,
            seed: 0,
        }
    }
}

impl Parameters {
    fn to_optimization(&self) -> transfer::Optimization {
        transfer::Optimization {
            content_weight: self.content_weight,
            style_weight: self.style_weight,
            learning_rate: self.learning_rate,
            iterations: self.iterations,
            snapshot_every: self.snapshot_every,
        }
    }
}

/// An image generated by a `Session::run()`
pub struct GeneratedImage {
    image: image::RgbImage,
    snapshots: Vec<(u32, image::RgbImage)>,
    costs: Vec<Costs>,
}

impl GeneratedImage {
    /// Saves the generated image to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent_path) = path.parent() {
            std::fs::create_dir_all(parent_path)?;
        }

        self.image.save(path)?;
        Ok(())
    }

    /// Writes the generated image to the specified stream
    pub fn write<W: std::io::Write>(
        self,
        writer: &mut W,
        fmt: image::ImageOutputFormat,
    ) -> Result<(), Error> {
        // Encoders need to seek, which pipes can't do
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.into_image().write_to(&mut buffer, fmt)?;
        writer.write_all(buffer.get_ref())?;
        Ok(())
    }

    /// Saves the snapshots taken during the optimization into `dir`, as
    /// `iteration_00000.png`, `iteration_00200.png`, ...
    pub fn save_snapshots<P: AsRef<Path>>(&self, dir: P) -> Result<(), Error> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        for (iteration, img) in &self.snapshots {
            img.save(&dir.join(format!("iteration_{:05}.png", iteration)))?;
        }

        Ok(())
    }

    /// Writes the cost of every iteration as CSV, with an
    /// `iteration,total,content,style` header
    pub fn write_costs<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "iteration,total,content,style")?;
        for (i, c) in self.costs.iter().enumerate() {
            writeln!(w, "{},{},{},{}", i, c.total, c.content, c.style)?;
        }

        Ok(())
    }

    /// The images kept every `snapshot_every` iterations, with the zero
    /// based iteration they were taken after
    pub fn snapshots(&self) -> &[(u32, image::RgbImage)] {
        &self.snapshots
    }

    /// The costs of every iteration, in order
    pub fn costs(&self) -> &[Costs] {
        &self.costs
    }

    /// Returns the generated output image
    pub fn into_image(self) -> image::DynamicImage {
        image::DynamicImage::ImageRgb8(self.image)
    }
}

impl AsRef<image::RgbImage> for GeneratedImage {
    fn as_ref(&self) -> &image::RgbImage {
        &self.image
    }
}
