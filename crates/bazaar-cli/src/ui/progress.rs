//! Download progress on stderr.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use bazaar_core::Reporter;
use bazaar_schema::human_size;

/// Format progress for one package as a single status line.
pub fn format_progress(key: &str, current: u64, total: Option<u64>) -> String {
    match total.filter(|&t| t > 0) {
        Some(t) => {
            let pct = (current.min(t) * 100) / t;
            format!("  fetching {key} {pct:>3}% ({})", human_size(t))
        }
        None => format!("  fetching {key} {}", human_size(current)),
    }
}

/// Reporter drawing a rewriting status line on stderr.
///
/// Progress lines are only drawn when stderr is a terminal; completion and
/// failure lines always are.
#[derive(Debug)]
pub struct TerminalProgress {
    interactive: bool,
    drawn: AtomicBool,
}

impl TerminalProgress {
    /// Reporter for the current stderr.
    pub fn new() -> Self {
        Self {
            interactive: std::io::stderr().is_terminal(),
            drawn: AtomicBool::new(false),
        }
    }

    /// End the status line, if one is open.
    pub fn finish(&self) {
        if self.drawn.swap(false, Ordering::Relaxed) {
            eprintln!();
        }
    }

    fn clear(&self) {
        if self.drawn.swap(false, Ordering::Relaxed) {
            eprint!("\r\x1b[2K");
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TerminalProgress {
    fn downloading(&self, key: &str, current: u64, total: Option<u64>) {
        if !self.interactive {
            return;
        }
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K{}", format_progress(key, current, total));
        let _ = err.flush();
        self.drawn.store(true, Ordering::Relaxed);
    }

    fn done(&self, key: &str, detail: &str) {
        self.clear();
        eprintln!("  {key} {detail}");
    }

    fn failed(&self, key: &str, reason: &str) {
        self.clear();
        eprintln!("  {key} failed: {reason}");
    }
}
