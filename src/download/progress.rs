//! Per-gallery CLI progress bar.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub(crate) struct GalleryProgress {
    bar: ProgressBar,
}

impl GalleryProgress {
    pub(crate) fn new(total: usize, visible: bool) -> Self {
        let bar = ProgressBar::with_draw_target(
            Some(total as u64),
            if visible {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
        bar.set_style(style);
        Self { bar }
    }

    pub(crate) fn start_asset(&self, file_name: &str) {
        self.bar.set_message(format!("Downloading {file_name}"));
    }

    pub(crate) fn finish_asset(&self) {
        self.bar.inc(1);
    }

    pub(crate) fn done(&self) {
        self.bar.finish_with_message("done");
    }

    pub(crate) fn abandon(&self, why: &str) {
        self.bar.abandon_with_message(why.to_string());
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> u64 {
        self.bar.position()
    }
}
