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

mod progress_window;
use progress_window::ProgressWindow;

use structopt::StructOpt;

use neural_style::{
    image::ImageOutputFormat as ImgFmt, Dims, Error, FeatureWeights, Init, InputConvention, Layer,
    Session, StyleLayer,
};
use std::io::Write;
use std::path::PathBuf;

fn parse_size(input: &str) -> Result<(u32, u32), std::num::ParseIntError> {
    let mut i = input.splitn(2, 'x');

    let x: u32 = i.next().unwrap_or("").parse()?;
    let y: u32 = match i.next() {
        Some(num) => num.parse()?,
        None => x,
    };
    Ok((x, y))
}

fn parse_img_fmt(input: &str) -> Result<ImgFmt, String> {
    let fmt = match input {
        "png" => ImgFmt::Png,
        "jpg" => ImgFmt::Jpeg(90),
        "bmp" => ImgFmt::Bmp,
        other => {
            return Err(format!(
                "image format `{}` not one of: 'png', 'jpg', 'bmp'",
                other
            ))
        }
    };

    Ok(fmt)
}

/// A comma separated list of style layers, each optionally followed by `:weight`
struct StyleLayers(Vec<StyleLayer>);

impl std::str::FromStr for StyleLayers {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        input
            .split(',')
            .map(str::parse::<StyleLayer>)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

fn parse_init(input: &str) -> Result<InitKind, String> {
    match input {
        "content" => Ok(InitKind::Content),
        "noise" => Ok(InitKind::Noise),
        other => Err(format!("init `{}` not one of: 'content', 'noise'", other)),
    }
}

#[derive(Copy, Clone)]
enum InitKind {
    Content,
    Noise,
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct ConvertWeights {
    /// A torchvision VGG19 state dict
    #[structopt(parse(from_os_str))]
    src: PathBuf,
    /// Where to write the burn record, conventionally with a `.mpk` extension
    #[structopt(parse(from_os_str))]
    dst: PathBuf,
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Transfer {
    /// The image whose structure is preserved
    #[structopt(long, parse(from_os_str))]
    content: PathBuf,
    /// The image whose colors and textures are transferred
    #[structopt(long, parse(from_os_str))]
    style: PathBuf,
    /// VGG19 weights, either a torchvision state dict (`.pth`) or a burn record (`.mpk`)
    #[structopt(long, parse(from_os_str), required_unless = "untrained")]
    weights: Option<PathBuf>,
    /// Use a randomly initialized extractor instead of pretrained weights
    #[structopt(long, conflicts_with = "weights")]
    untrained: bool,
    /// The input convention the weights were trained with, `torch` or `caffe`
    #[structopt(long, default_value = "torch")]
    convention: InputConvention,
    /// Resize the content image, in `width x height`, or a single number for both dimensions
    #[structopt(long, parse(try_from_str = parse_size))]
    size: Option<(u32, u32)>,
    /// The format to save the generated image as.
    ///
    /// NOTE: this will only apply when stdout is specified via `-o -`, otherwise the image
    /// format is determined by the file extension of the path provided to `-o`
    #[structopt(
        long,
        default_value = "png",
        parse(try_from_str = parse_img_fmt)
    )]
    out_fmt: ImgFmt,
    /// The path to save the generated image to, the file extensions of the path determines
    /// the image format used. You may use `-` for stdout.
    #[structopt(long = "out", short, parse(from_os_str))]
    output_path: PathBuf,
    /// Keep a snapshot every N iterations
    #[structopt(long, default_value = "200")]
    snapshot_every: u32,
    /// A directory into which snapshots are saved as `iteration_NNNNN.png`
    #[structopt(long, parse(from_os_str))]
    snapshot_dir: Option<PathBuf>,
    /// Write the cost of every iteration to this CSV file
    #[structopt(long, parse(from_os_str))]
    cost_log: Option<PathBuf>,
    #[structopt(flatten)]
    tweaks: Tweaks,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Optimizes a new image with the content of one image and the style of another
    #[structopt(name = "transfer")]
    Transfer(Transfer),
    /// Converts a PyTorch VGG19 state dict into a burn record, which loads
    /// faster on subsequent runs
    #[structopt(name = "convert-weights")]
    ConvertWeights(ConvertWeights),
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Tweaks {
    /// The number of optimization steps
    #[structopt(long, default_value = "2000")]
    iterations: u32,
    /// Adam learning rate, in 0-255 pixel units
    #[structopt(long = "lr", default_value = "10.0")]
    learning_rate: f64,
    /// Weight of the content cost in the total cost
    #[structopt(long, default_value = "1e-5")]
    alpha: f32,
    /// Weight of the style cost in the total cost
    #[structopt(long, default_value = "1e-2")]
    beta: f32,
    /// The layer whose activations the output shares with the content image
    #[structopt(long, default_value = "block5_conv2")]
    content_layer: Layer,
    /// Comma separated style layers, each optionally followed by `:weight`
    #[structopt(
        long,
        default_value = "block1_conv1:0.5,block2_conv1:0.6,block3_conv1:0.8,block4_conv1:0.8,block5_conv1:0.5"
    )]
    style_layers: StyleLayers,
    /// How the generated image starts out, either `content` or `noise`
    #[structopt(long, default_value = "content", parse(try_from_str = parse_init))]
    init: InitKind,
    /// The share of noise blended into the content image with `--init noise`. Range (0.0 - 1.0)
    #[structopt(long, default_value = "0.6")]
    noise_ratio: f32,
    /// A seed value for the noise initialization and untrained weights
    #[structopt(long)]
    seed: Option<u64>,
    /// Show a window with the latest snapshot of the generation
    #[structopt(long = "window")]
    #[cfg(feature = "progress")]
    show_window: bool,
    /// Don't show progress bars
    #[structopt(long)]
    no_progress: bool,
}

#[derive(StructOpt)]
#[structopt(
    name = "neural-style",
    about = "Transfers the style of one image onto the content of another",
    rename_all = "kebab-case"
)]
struct Opt {
    /// Log more, repeat for even more
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: u8,
    #[structopt(subcommand)]
    cmd: Subcommand,
}

fn main() {
    if let Err(e) = real_main() {
        if atty::is(atty::Stream::Stderr) {
            eprintln!("\x1b[31merror\x1b[0m: {}", e);
        } else {
            eprintln!("error: {}", e);
        }

        #[allow(clippy::exit)]
        std::process::exit(1);
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn real_main() -> Result<(), Error> {
    let args = Opt::from_args();
    init_logger(args.verbose);

    match args.cmd {
        Subcommand::Transfer(transfer) => run_transfer(transfer),
        Subcommand::ConvertWeights(cw) => neural_style::convert_pytorch_weights(&cw.src, &cw.dst),
    }
}

/// Creates `path` for writing, along with any missing parent directories
fn create_file(path: &std::path::Path) -> Result<std::io::BufWriter<std::fs::File>, Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(std::io::BufWriter::new(std::fs::File::create(path)?))
}

fn run_transfer(args: Transfer) -> Result<(), Error> {
    // Check that the extension for the path supplied by the user is one of the ones we support
    {
        match args.output_path.extension().and_then(|ext| ext.to_str()) {
            Some("png") | Some("jpg") | Some("bmp") | None => {}
            Some(other) => return Err(Error::UnsupportedOutputFormat(other.to_owned())),
        }
    }

    let weights = match (&args.weights, args.untrained) {
        (_, true) => FeatureWeights::Untrained {
            seed: args.tweaks.seed.unwrap_or_default(),
        },
        (Some(path), false) => FeatureWeights::from_path(path)?,
        (None, false) => return Err(Error::MissingWeights),
    };

    let init = match args.tweaks.init {
        InitKind::Content => Init::Content,
        InitKind::Noise => Init::Noise {
            ratio: args.tweaks.noise_ratio,
        },
    };

    let mut sb = Session::builder()
        .content(&args.content)
        .style(&args.style)
        .feature_weights(weights)
        .input_convention(args.convention)
        .content_layer(args.tweaks.content_layer)
        .style_layers(args.tweaks.style_layers.0.iter().copied())
        .content_weight(args.tweaks.alpha)
        .style_weight(args.tweaks.beta)
        .learning_rate(args.tweaks.learning_rate)
        .iterations(args.tweaks.iterations)
        .snapshot_every(args.snapshot_every)
        .init(init)
        .seed(args.tweaks.seed.unwrap_or_default());

    if let Some((width, height)) = args.size {
        sb = sb.resize_content(Dims::new(width, height));
    }

    let session = sb.build()?;

    // Open the cost log up front so a bad path fails before the optimization
    let mut cost_log = match args.cost_log {
        Some(ref path) => Some(create_file(path)?),
        None => None,
    };

    let progress: Option<Box<dyn neural_style::GeneratorProgress>> = if !args.tweaks.no_progress
    {
        let progress = ProgressWindow::new(args.tweaks.iterations);

        #[cfg(feature = "progress")]
        let progress = {
            if args.tweaks.show_window {
                progress.with_preview(std::time::Duration::from_millis(100))
            } else {
                progress
            }
        };

        Some(Box::new(progress))
    } else {
        None
    };

    let generated = session.run(progress);

    if let Some(ref dir) = args.snapshot_dir {
        generated.save_snapshots(dir)?;
    }

    if let Some(ref mut file) = cost_log {
        generated.write_costs(file)?;
        file.flush()?;
    }

    if args.output_path.to_str() == Some("-") {
        let out = std::io::stdout();
        let mut out = out.lock();
        generated.write(&mut out, args.out_fmt)?;
    } else {
        // This won't respect the output format specified by the user,
        // only the extension on the path they specify
        generated.save(&args.output_path)?;
    }

    Ok(())
}
