//! Thin wrapper around `indicatif` so the default-on `progress` feature can be
//! disabled without touching call sites.

#[cfg(feature = "progress")]
mod imp {
    use indicatif::{ProgressBar, ProgressStyle};

    pub(crate) struct Progress {
        bar: ProgressBar,
    }

    impl Progress {
        pub(crate) fn new(len: u64, message: &'static str) -> Self {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("##-"),
            );
            bar.set_message(message);
            Progress { bar }
        }

        pub(crate) fn inc(&self) {
            self.bar.inc(1);
        }

        pub(crate) fn finish(&self, message: String) {
            self.bar.finish_with_message(message);
        }
    }
}

#[cfg(not(feature = "progress"))]
mod imp {
    pub(crate) struct Progress;

    impl Progress {
        pub(crate) fn new(_len: u64, _message: &'static str) -> Self {
            Progress
        }

        pub(crate) fn inc(&self) {}

        pub(crate) fn finish(&self, _message: String) {}
    }
}

pub(crate) use imp::Progress;
