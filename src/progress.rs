//! Per-package spinners for manifest runs.

use colored::Colorize;
use dsckit::{DscMethod, InvocationResult, InvokeCallback, Package};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with the standard style
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Shows one spinner per package while the engine runs.
pub struct PackageProgress {
    method: DscMethod,
    hidden: bool,
    current: Option<ProgressBar>,
}

impl PackageProgress {
    pub fn new(method: DscMethod, hidden: bool) -> Self {
        Self {
            method,
            hidden,
            current: None,
        }
    }
}

impl InvokeCallback for PackageProgress {
    fn on_package_start(&mut self, index: usize, total: usize, package: &Package) {
        let msg = format!(
            "{} {} {}",
            format!("[{}/{}]", index + 1, total).blue().bold(),
            self.method,
            package
        );
        self.current = Some(if self.hidden {
            ProgressBar::hidden()
        } else {
            spinner(&msg)
        });
    }

    fn on_package_complete(&mut self, index: usize, package: &Package, result: &InvocationResult) {
        if let Some(pb) = self.current.take() {
            let mark = if result.had_errors {
                "✗".red()
            } else {
                "✓".green()
            };
            pb.finish_with_message(format!("{mark} {} {package}", index + 1));
        }
    }
}

impl Drop for PackageProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}
