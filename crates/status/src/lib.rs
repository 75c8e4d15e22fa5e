//! Keyed status lines for long-running work.
//!
//! Every in-flight operation owns a key (for package work the key is
//! `<source>:<name>@<version>`). Setting a key updates its line in place,
//! clearing a key removes the line. Cancelled work clears its key instead of
//! reporting an error.

use std::sync::OnceLock;

use dashmap::DashMap;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

struct StatusUi {
    multi: MultiProgress,
    entries: DashMap<String, ProgressBar>,
}

fn ui() -> &'static StatusUi {
    static UI: OnceLock<StatusUi> = OnceLock::new();
    UI.get_or_init(|| StatusUi {
        multi: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
        entries: DashMap::new(),
    })
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {wide_msg}").expect("static template is valid")
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg} {bar:24} {bytes}/{total_bytes}")
        .expect("static template is valid")
}

fn entry(key: &str) -> ProgressBar {
    let ui = ui();
    ui.entries
        .entry(key.to_string())
        .or_insert_with(|| {
            let bar = ui.multi.add(ProgressBar::new_spinner());
            bar.set_style(spinner_style());
            bar
        })
        .clone()
}

/// Show a plain text line for `key`.
pub fn set_text(key: &str, text: impl Into<String>) {
    let bar = entry(key);
    bar.set_style(spinner_style());
    bar.set_message(text.into());
    bar.tick();
}

/// Show a progress bar for `key`.
pub fn set_progress(key: &str, label: impl Into<String>, current: u64, total: u64) {
    let bar = entry(key);
    bar.set_style(bar_style());
    bar.set_length(total);
    bar.set_position(current);
    bar.set_message(label.into());
}

/// Replace the line for `key` with a final error message. The line sticks
/// around until `clear` or `stop`.
pub fn set_error(key: &str, message: impl Into<String>) {
    let bar = entry(key);
    bar.set_style(spinner_style());
    bar.abandon_with_message(format!("error: {}", message.into()));
}

/// Replace the line for `key` with a final success message.
pub fn set_success(key: &str, message: impl Into<String>) {
    let bar = entry(key);
    bar.set_style(spinner_style());
    bar.finish_with_message(message.into());
}

/// Remove the line for `key`, if any.
pub fn clear(key: &str) {
    if let Some((_, bar)) = ui().entries.remove(key) {
        bar.finish_and_clear();
    }
}

/// Print a line above the status area without tearing the bars.
pub fn log(message: impl AsRef<str>) {
    let _ = ui().multi.println(message.as_ref());
}

/// Tear down the status area, removing every line.
pub fn stop() {
    let ui = ui();
    ui.entries.retain(|_, bar| {
        bar.finish_and_clear();
        false
    });
    let _ = ui.multi.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    // one test body: the UI is a process-wide singleton, concurrent tests
    // would race on it
    #[test]
    fn entries_are_keyed_and_clearable() {
        set_text("test:a@1.0.0", "working");
        assert!(ui().entries.contains_key("test:a@1.0.0"));
        clear("test:a@1.0.0");
        assert!(!ui().entries.contains_key("test:a@1.0.0"));

        set_progress("test:b@1.0.0", "downloading", 0, 100);
        set_progress("test:b@1.0.0", "downloading", 50, 100);
        assert_eq!(ui().entries.get("test:b@1.0.0").unwrap().position(), 50);

        set_text("test:c@1.0.0", "working");
        stop();
        assert!(ui().entries.is_empty());
    }
}
