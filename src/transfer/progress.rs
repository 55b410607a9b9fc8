//! rsync `--info=progress2` parsing and the lossy progress stream

use lazy_regex::{Regex, regex};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Progress snapshot sent to the caller while a move runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Bytes copied across the whole move
    pub bytes_copied: u64,
    pub total_bytes: u64,
    /// Whole-move fraction, 0.0-1.0, never decreasing within a move
    pub overall_fraction: f64,
    pub current_file: String,
    /// Transfer rate as printed by the copy tool, e.g. `10.12MB/s`
    pub rate: String,
    /// Remaining time as printed by the copy tool, e.g. `0:01:23`
    pub eta: String,
    /// 1-based file position for multi-file moves, 0 for movies
    pub file_index: usize,
    pub file_count: usize,
    pub file_fraction: f64,
}

/// One parsed progress line, before it is related to the move totals
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressSample {
    pub bytes: Option<u64>,
    pub percent: u32,
    pub rate: String,
    pub eta: String,
}

/// Parse a progress line such as `  5.70G  86%   10.12MB/s    0:00:45`
///
/// Lines without a percentage (file lists, summaries) yield `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let percent_re: &Regex = regex!(r"(\d+)%");
    let bytes_re: &Regex = regex!(r"^\s*([\d.,]+)([kKMGT]?)");
    let rate_re: &Regex = regex!(r"([\d.,]+[kKMGT]?B/s)");
    let eta_re: &Regex = regex!(r"(\d+:\d{2}:\d{2})");

    let percent: u32 = percent_re.captures(line)?.get(1)?.as_str().parse().ok()?;

    let bytes = bytes_re.captures(line).and_then(|c| {
        let number = c.get(1)?.as_str();
        let suffix = c.get(2).map_or("", |m| m.as_str());
        parse_human_size(number, suffix)
    });

    let rate = rate_re
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let eta = eta_re
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Some(ProgressSample {
        bytes,
        percent: percent.min(100),
        rate,
        eta,
    })
}

/// `5.70` + `G` -> bytes, binary multiples
///
/// Plain counts may carry thousands separators (`1,234,567`); a scaled value
/// with a lone comma uses it as the decimal point (`5,70G`).
pub fn parse_human_size(number: &str, suffix: &str) -> Option<u64> {
    let normalized = if !suffix.is_empty() && !number.contains('.') && number.matches(',').count() == 1 {
        number.replace(',', ".")
    } else {
        number.replace(',', "")
    };

    let value: f64 = normalized.parse().ok()?;
    let exponent = match suffix {
        "" => 0,
        "k" | "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        _ => return None,
    };

    Some((value * 1024f64.powi(exponent)) as u64)
}

/// Splits a byte stream on `\n` and on the bare `\r` that rsync uses to redraw
/// its progress line
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Non-blocking sender for [`ProgressEvent`]s
///
/// A full or closed channel drops the event; progress is telemetry and must
/// never hold up the copy.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
    pub const fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Returns whether the event was queued
    pub fn emit(&self, event: ProgressEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Progress channel full, dropping update");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Debug, Clone)]
struct CurrentFile {
    name: String,
    size: u64,
    index: usize,
}

/// Turns per-file samples into whole-move [`ProgressEvent`]s
///
/// Carries the byte offset of finished files so the overall fraction stays
/// monotone across a season pack, and delivers the final 1.0 only once.
#[derive(Debug)]
pub struct ProgressTracker {
    sink: ProgressSink,
    total_bytes: u64,
    file_count: usize,
    prior_bytes: u64,
    current: Option<CurrentFile>,
    last_overall: f64,
    last_bytes: u64,
    completion_delivered: bool,
}

impl ProgressTracker {
    pub const fn new(sink: ProgressSink, total_bytes: u64, file_count: usize) -> Self {
        Self {
            sink,
            total_bytes,
            file_count,
            prior_bytes: 0,
            current: None,
            last_overall: 0.0,
            last_bytes: 0,
            completion_delivered: false,
        }
    }

    pub fn begin_file(&mut self, index: usize, name: impl Into<String>, size: u64) {
        self.current = Some(CurrentFile {
            name: name.into(),
            size,
            index,
        });
    }

    /// Account one parsed line of the current file
    pub fn record(&mut self, sample: &ProgressSample) {
        let Some(file) = self.current.clone() else {
            return;
        };

        let percent = f64::from(sample.percent.min(100)) / 100.0;
        let file_copied = sample
            .bytes
            .unwrap_or_else(|| (percent * file.size as f64) as u64)
            .min(file.size);

        let file_fraction = if file.size > 0 {
            file_copied as f64 / file.size as f64
        } else {
            percent
        };

        self.publish(&file, file_copied, file_fraction, &sample.rate, &sample.eta);
    }

    /// Mark the current file as fully copied
    pub fn finish_file(&mut self) {
        let Some(file) = self.current.take() else {
            return;
        };
        self.publish(&file, file.size, 1.0, "", "");
        self.prior_bytes = self.prior_bytes.saturating_add(file.size);
    }

    pub const fn bytes_done(&self) -> u64 {
        self.prior_bytes
    }

    fn publish(&mut self, file: &CurrentFile, file_copied: u64, file_fraction: f64, rate: &str, eta: &str) {
        let overall_bytes = self
            .prior_bytes
            .saturating_add(file_copied)
            .min(self.total_bytes)
            .max(self.last_bytes);

        let overall = if self.total_bytes > 0 {
            overall_bytes as f64 / self.total_bytes as f64
        } else {
            file_fraction
        };
        let overall = overall.clamp(0.0, 1.0).max(self.last_overall);

        self.last_bytes = overall_bytes;
        self.last_overall = overall;

        let complete = overall >= 1.0;
        if complete && self.completion_delivered {
            return;
        }

        let delivered = self.sink.emit(ProgressEvent {
            bytes_copied: overall_bytes,
            total_bytes: self.total_bytes,
            overall_fraction: overall,
            current_file: file.name.clone(),
            rate: rate.to_string(),
            eta: eta.to_string(),
            file_index: file.index,
            file_count: self.file_count,
            file_fraction: file_fraction.clamp(0.0, 1.0),
        });

        if complete && delivered {
            self.completion_delivered = true;
        }
    }
}
