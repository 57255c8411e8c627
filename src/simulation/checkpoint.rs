//! Periodic episode return checkpoints
use crate::utils::stats::OnlineMean;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Value of a checkpoint whose window contains no completed episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmptyWindowPolicy {
    /// Record NaN.
    Nan,
    /// Repeat the previous checkpoint value, or NaN if there is none.
    CarryForward,
}

impl Default for EmptyWindowPolicy {
    fn default() -> Self {
        Self::Nan
    }
}

/// Mean episode return per checkpoint interval.
///
/// Episode returns are collected into a window that is averaged and cleared
/// every `interval` steps, producing exactly one sample per interval.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointSeries {
    interval: u64,
    empty_window: EmptyWindowPolicy,
    window: OnlineMean<f64>,
    table: MetricsTable,
}

impl CheckpointSeries {
    /// # Panics
    /// If `interval` is zero.
    pub fn new(interval: u64, empty_window: EmptyWindowPolicy) -> Self {
        assert!(interval > 0, "checkpoint interval must be positive");
        Self {
            interval,
            empty_window,
            window: OnlineMean::default(),
            table: MetricsTable::default(),
        }
    }

    /// Add the total reward of a completed episode to the current window.
    pub fn push_episode(&mut self, episode_return: f64) {
        self.window.push(episode_return);
    }

    /// Number of episodes in the current window.
    pub const fn window_len(&self) -> u64 {
        self.window.count()
    }

    /// Mark the end of step number `step` (counting from 1).
    ///
    /// Returns the checkpoint value if `step` ends an interval.
    pub fn end_step(&mut self, step: u64) -> Option<f64> {
        if step % self.interval != 0 {
            return None;
        }
        let mean = match (self.window.mean(), self.empty_window) {
            (Some(mean), _) => mean,
            (None, EmptyWindowPolicy::Nan) => f64::NAN,
            (None, EmptyWindowPolicy::CarryForward) => {
                self.table.mean_returns.last().copied().unwrap_or(f64::NAN)
            }
        };
        self.window = OnlineMean::default();
        self.table.steps.push(step);
        self.table.mean_returns.push(mean);
        Some(mean)
    }

    pub const fn table(&self) -> &MetricsTable {
        &self.table
    }

    pub fn into_table(self) -> MetricsTable {
        self.table
    }
}

/// Checkpoint steps and the mean episode return of each checkpoint interval.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsTable {
    pub steps: Vec<u64>,
    pub mean_returns: Vec<f64>,
}

impl MetricsTable {
    /// Output file name for the run with the given seed.
    pub fn file_name(seed: u64) -> String {
        format!("batchac{}.txt", seed)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The table as a `2 x N` array: checkpoint steps in row 0 and mean returns in row 1.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((2, self.len()), |(row, col)| {
            if row == 0 {
                self.steps[col] as f64
            } else {
                self.mean_returns[col]
            }
        })
    }

    /// Write the table as two rows of space-separated values in scientific notation.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for row in self.to_array().rows() {
            let line: Vec<String> = row.iter().map(|&x| format_scientific(x)).collect();
            writeln!(writer, "{}", line.join(" "))?;
        }
        writer.flush()
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        self.write_to(BufWriter::new(File::create(path)?))
    }
}

/// Format like C `%.18e`: 18 fractional digits and a signed exponent of at least two digits.
fn format_scientific(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.into();
    }
    let formatted = format!("{:.18e}", x);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}
