//! Run segmentation.
//!
//! Partitions an ordered sequence of record timestamps into maximal
//! contiguous runs. A boundary is declared when the step between two
//! consecutive records exceeds the nominal sample interval by more than the
//! configured tolerance. Pure over its inputs; nothing here touches an
//! archive.

use std::ops::Range;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{ArchiveError, Result};

/// Continuity parameters for one instrument data source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationConfig {
    /// Nominal spacing between consecutive samples.
    pub sample_interval: TimeDelta,
    /// Maximum allowed gap beyond the nominal interval, in sample-interval
    /// multiples. Zero splits on any step longer than one exact interval;
    /// duplicate timestamps are a zero-length step and never split.
    pub max_gap_intervals: f64,
}

impl SegmentationConfig {
    /// Config from a sample rate in Hz.
    pub fn from_sample_rate(sample_rate: f64, max_gap_intervals: f64) -> Result<Self> {
        if !(sample_rate > 0.0 && sample_rate.is_finite()) {
            return Err(ArchiveError::MetadataValidation {
                fields: vec!["sample_rate".to_string()],
            });
        }
        let interval = std::time::Duration::from_secs_f64(1.0 / sample_rate);
        let sample_interval =
            TimeDelta::from_std(interval).map_err(|_| ArchiveError::MetadataValidation {
                fields: vec!["sample_rate".to_string()],
            })?;
        Ok(Self {
            sample_interval,
            max_gap_intervals,
        })
    }

    /// Sample rate in Hz implied by the nominal interval.
    pub fn sample_rate(&self) -> f64 {
        let interval_ns = self.sample_interval.num_nanoseconds().unwrap_or(i64::MAX) as f64;
        1.0e9 / interval_ns
    }

    fn validate(&self) -> Result<()> {
        let mut fields = Vec::new();
        if self.sample_interval <= TimeDelta::zero() {
            fields.push("sample_interval".to_string());
        }
        if !(self.max_gap_intervals >= 0.0 && self.max_gap_intervals.is_finite()) {
            fields.push("max_gap_intervals".to_string());
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ArchiveError::MetadataValidation { fields })
        }
    }
}

/// One contiguous run produced by segmentation.
///
/// `records` indexes into the input slice; spans are non-overlapping and
/// together cover every input index exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub records: Range<usize>,
}

impl RunSpan {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Partition time-ordered record timestamps into runs.
///
/// Empty input yields zero runs. A run holding a single record gets
/// `end = start + sample_interval` so its nominal span is never empty.
pub fn segment_records(
    timestamps: &[DateTime<Utc>],
    config: &SegmentationConfig,
) -> Result<Vec<RunSpan>> {
    config.validate()?;
    if timestamps.is_empty() {
        return Ok(Vec::new());
    }

    let interval_ns = config.sample_interval.num_nanoseconds().unwrap_or(i64::MAX) as f64;
    let max_step_ns = interval_ns * (1.0 + config.max_gap_intervals);

    let mut spans = Vec::new();
    let mut run_start_idx = 0usize;

    for idx in 1..timestamps.len() {
        let step = timestamps[idx] - timestamps[idx - 1];
        let step_ns = step.num_nanoseconds().unwrap_or(i64::MAX) as f64;
        if step_ns > max_step_ns {
            spans.push(close_span(timestamps, run_start_idx..idx, config));
            run_start_idx = idx;
        }
    }
    spans.push(close_span(timestamps, run_start_idx..timestamps.len(), config));
    Ok(spans)
}

fn close_span(
    timestamps: &[DateTime<Utc>],
    records: Range<usize>,
    config: &SegmentationConfig,
) -> RunSpan {
    let start = timestamps[records.start];
    let end = if records.len() == 1 {
        start + config.sample_interval
    } else {
        timestamps[records.end - 1]
    };
    RunSpan {
        start,
        end,
        records,
    }
}
