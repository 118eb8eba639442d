//! Reporter trait for dependency injection
//!
//! This trait allows the pipeline to report progress without being coupled
//! to a specific UI. Download progress is keyed by `owner/repo@hash`.

use tokio::sync::mpsc::UnboundedSender;

pub trait Reporter: Send + Sync {
    /// Updates the progress of a download.
    fn downloading(&self, key: &str, current: u64, total: Option<u64>);

    /// Marks a package operation as successfully completed.
    fn done(&self, key: &str, detail: &str);

    /// Marks a package operation as failed with a specific reason.
    fn failed(&self, key: &str, reason: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn downloading(&self, key: &str, current: u64, total: Option<u64>) {
        (**self).downloading(key, current, total);
    }
    fn done(&self, key: &str, detail: &str) {
        (**self).done(key, detail);
    }
    fn failed(&self, key: &str, reason: &str) {
        (**self).failed(key, reason);
    }
}

/// A no-op reporter for silent operations (e.g., catalog refresh, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn downloading(&self, _: &str, _: u64, _: Option<u64>) {}
    fn done(&self, _: &str, _: &str) {}
    fn failed(&self, _: &str, _: &str) {}
}

/// A progress event, as forwarded by [`ChannelReporter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Downloading {
        key: String,
        current: u64,
        total: Option<u64>,
    },
    Done {
        key: String,
        detail: String,
    },
    Failed {
        key: String,
        reason: String,
    },
}

impl Progress {
    /// Fraction downloaded, when the total is known.
    pub fn fraction(&self) -> Option<f32> {
        match self {
            Self::Downloading {
                current,
                total: Some(total),
                ..
            } if *total > 0 => Some(*current as f32 / *total as f32),
            _ => None,
        }
    }
}

/// Forwards every event into a channel; dropped receivers are ignored.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: UnboundedSender<Progress>,
}

impl ChannelReporter {
    pub fn new(tx: UnboundedSender<Progress>) -> Self {
        Self { tx }
    }
}

impl Reporter for ChannelReporter {
    fn downloading(&self, key: &str, current: u64, total: Option<u64>) {
        let _ = self.tx.send(Progress::Downloading {
            key: key.to_string(),
            current,
            total,
        });
    }

    fn done(&self, key: &str, detail: &str) {
        let _ = self.tx.send(Progress::Done {
            key: key.to_string(),
            detail: detail.to_string(),
        });
    }

    fn failed(&self, key: &str, reason: &str) {
        let _ = self.tx.send(Progress::Failed {
            key: key.to_string(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_reporter_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = std::sync::Arc::new(ChannelReporter::new(tx));

        reporter.downloading("o/r@h", 50, Some(200));
        reporter.done("o/r@h", "installed");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.fraction(), Some(0.25));
        assert_eq!(rx.try_recv().unwrap(), Progress::Done {
            key: "o/r@h".to_string(),
            detail: "installed".to_string(),
        });
    }

    #[test]
    fn test_fraction_unknown_total() {
        let p = Progress::Downloading {
            key: String::new(),
            current: 10,
            total: None,
        };
        assert_eq!(p.fraction(), None);
    }
}
