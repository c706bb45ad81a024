use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress")]
use minifb::Window;
#[cfg(feature = "progress")]
use neural_style::image;

pub struct ProgressWindow {
    #[cfg(feature = "progress")]
    window: Option<(Option<Window>, std::time::Duration, std::time::Instant)>,

    pb: ProgressBar,
    total_len: usize,
}

impl ProgressWindow {
    pub fn new(iterations: u32) -> Self {
        let pb = ProgressBar::new(u64::from(iterations));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .progress_chars("##-"),
        );

        Self {
            #[cfg(feature = "progress")]
            window: None,
            pb,
            total_len: iterations as usize,
        }
    }

    /// The window is created lazily with the size of the first snapshot,
    /// and redrawn at most once every `update_every`
    #[cfg(feature = "progress")]
    pub fn with_preview(mut self, update_every: std::time::Duration) -> Self {
        self.window = Some((None, update_every, std::time::Instant::now()));
        self
    }
}

impl Drop for ProgressWindow {
    fn drop(&mut self) {
        self.pb.finish();
    }
}

impl neural_style::GeneratorProgress for ProgressWindow {
    fn update(&mut self, update: neural_style::ProgressUpdate<'_>) {
        if update.iterations.total != self.total_len {
            self.total_len = update.iterations.total;
            self.pb.set_length(self.total_len as u64);
        }

        self.pb.set_position(update.iterations.current as u64);
        self.pb.set_message(&format!(
            "cost {:.4e} (style {:.4e}, content {:.4e})",
            update.costs.total, update.costs.style, update.costs.content
        ));

        #[cfg(feature = "progress")]
        {
            if let Some((ref mut window, ref dur, ref mut last_update)) = self.window {
                let now = std::time::Instant::now();

                match PreviewStep::next(update.image, now - *last_update >= *dur) {
                    PreviewStep::Redraw(img) => {
                        *last_update = now;

                        if window.is_none() {
                            // We don't particularly care if this fails, the
                            // generation continues without a preview
                            *window = Window::new(
                                "Neural Style",
                                img.width() as usize,
                                img.height() as usize,
                                minifb::WindowOptions::default(),
                            )
                            .ok();
                        }

                        if let Some(window) = window.as_mut().filter(|w| w.is_open()) {
                            let _ = window.update_with_buffer(
                                &pack_0rgb(img),
                                img.width() as usize,
                                img.height() as usize,
                            );
                        }
                    }
                    // snapshots are far apart, the window still needs its events
                    PreviewStep::Pump => {
                        if let Some(window) = window.as_mut().filter(|w| w.is_open()) {
                            window.update();
                        }
                    }
                }
            }
        }
    }
}

/// What the preview window does with a single progress update
#[cfg(feature = "progress")]
#[derive(Debug, PartialEq)]
enum PreviewStep<'a> {
    /// Draw a new snapshot
    Redraw(&'a image::RgbImage),
    /// Only process window events
    Pump,
}

#[cfg(feature = "progress")]
impl<'a> PreviewStep<'a> {
    fn next(image: Option<&'a image::RgbImage>, due: bool) -> Self {
        match image {
            Some(img) if due => Self::Redraw(img),
            _ => Self::Pump,
        }
    }
}

/// minifb wants 0RGB packed into a u32
#[cfg(feature = "progress")]
fn pack_0rgb(img: &image::RgbImage) -> Vec<u32> {
    img.pixels()
        .map(|p| u32::from(p[0]) << 16 | u32::from(p[1]) << 8 | u32::from(p[2]))
        .collect()
}
