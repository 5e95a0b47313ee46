//! End-to-end ingestion: reader-shaped recordings through segmentation into
//! numbered runs, then validated and summarized.

use std::path::Path;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tempfile::TempDir;

use mtarc_core::{
    ChannelMetadata, FileVersion, InstrumentReader, InstrumentRecording, MtArchive, Result,
    SegmentationConfig, TimedRecord, ingest_recording,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap()
}

fn recording(offsets: &[i64]) -> InstrumentRecording {
    InstrumentRecording {
        components: vec!["ex".to_string(), "hy".to_string()],
        channel_metadata: vec![ChannelMetadata::new("ex"), ChannelMetadata::new("hy")],
        records: offsets
            .iter()
            .map(|s| TimedRecord {
                timestamp: base_time() + TimeDelta::seconds(*s),
                values: vec![*s as f64, 2.0 * *s as f64],
            })
            .collect(),
    }
}

/// A canned reader standing in for an instrument-file parser.
struct CannedReader {
    offsets: Vec<i64>,
}

impl InstrumentReader for CannedReader {
    fn read(&mut self, _path: &Path) -> Result<InstrumentRecording> {
        Ok(recording(&self.offsets))
    }
}

fn scratch(name: &str) -> (TempDir, MtArchive) {
    let dir = TempDir::new().unwrap();
    let mut archive = MtArchive::create(dir.path().join(name), FileVersion::V2).unwrap();
    archive.add_survey("s1", None).unwrap();
    archive.add_station("s1", "mt01", None).unwrap();
    (dir, archive)
}

#[test]
fn contiguous_files_ingest_as_a_single_run() {
    let (_dir, mut archive) = scratch("contiguous.mta");
    let config = SegmentationConfig::from_sample_rate(1.0, 1.0).unwrap();

    // two back-to-back "files" from the same deployment, batched into one
    // recording: day two starts exactly one interval after day one ends
    let mut reader_a = CannedReader {
        offsets: (0..600).collect(),
    };
    let mut reader_b = CannedReader {
        offsets: (600..1200).collect(),
    };
    let mut merged = reader_a.read(Path::new("day1.bin")).unwrap();
    let rec_b = reader_b.read(Path::new("day2.bin")).unwrap();
    merged.records.extend(rec_b.records);

    let runs = ingest_recording(&mut archive, "s1", "mt01", &merged, &config).unwrap();
    assert_eq!(runs, vec!["001"]);

    let run = archive.get_run("s1", "mt01", "001").unwrap();
    assert_eq!(run.time_period_start, Some(base_time()));
    assert_eq!(
        run.time_period_end,
        Some(base_time() + TimeDelta::seconds(1200))
    );
    assert_eq!(
        archive
            .channel_sample_count("s1", "mt01", "001", "ex")
            .unwrap(),
        1200
    );
    assert_eq!(run.channels_recorded_electric, vec!["ex"]);
    assert_eq!(run.channels_recorded_magnetic, vec!["hy"]);
}

#[test]
fn gapped_recording_splits_at_the_gap() {
    let (_dir, mut archive) = scratch("gapped.mta");
    let config = SegmentationConfig::from_sample_rate(1.0, 1.0).unwrap();

    // 1-hour dropout between sample 599 and 4200
    let offsets: Vec<i64> = (0..600).chain(4200..4800).collect();
    let runs =
        ingest_recording(&mut archive, "s1", "mt01", &recording(&offsets), &config).unwrap();
    assert_eq!(runs, vec!["001", "002"]);

    assert_eq!(
        archive
            .channel_sample_count("s1", "mt01", "001", "ex")
            .unwrap(),
        600
    );
    assert_eq!(
        archive
            .channel_sample_count("s1", "mt01", "002", "ex")
            .unwrap(),
        600
    );
    let second = archive.get_run("s1", "mt01", "002").unwrap();
    assert_eq!(
        second.time_period_start,
        Some(base_time() + TimeDelta::seconds(4200))
    );

    // channel sample values landed in the right segment
    let ex = archive.channel_samples("s1", "mt01", "002", "ex").unwrap();
    assert_eq!(ex[0], 4200.0);
    let hy = archive.channel_samples("s1", "mt01", "002", "hy").unwrap();
    assert_eq!(hy[0], 8400.0);
}

#[test]
fn ingested_runs_feed_the_summary() {
    let (_dir, mut archive) = scratch("summary.mta");
    let config = SegmentationConfig::from_sample_rate(1.0, 1.0).unwrap();
    let offsets: Vec<i64> = (0..60).chain(300..360).collect();
    ingest_recording(&mut archive, "s1", "mt01", &recording(&offsets), &config).unwrap();

    assert_eq!(archive.summarize().unwrap(), 4);
    let rows = archive.to_records().unwrap();
    assert!(rows.iter().all(|r| r.sample_rate == Some(1.0)));
    assert!(rows.iter().all(|r| r.n_samples == 60));
    let runs: std::collections::BTreeSet<_> = rows.iter().map(|r| r.run.clone()).collect();
    assert_eq!(runs.len(), 2);
}

#[test]
fn ingestion_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reopen.mta");
    let config = SegmentationConfig::from_sample_rate(1.0, 1.0).unwrap();
    {
        let mut archive = MtArchive::create(&path, FileVersion::V2).unwrap();
        archive.add_survey("s1", None).unwrap();
        archive.add_station("s1", "mt01", None).unwrap();
        ingest_recording(
            &mut archive,
            "s1",
            "mt01",
            &recording(&[0, 1, 2, 3]),
            &config,
        )
        .unwrap();
        archive.close().unwrap();
    }
    let reopened = MtArchive::open_read_only(&path).unwrap();
    assert_eq!(reopened.run_ids("s1", "mt01").unwrap(), vec!["001"]);
    let channel = reopened.get_channel("s1", "mt01", "001", "ex").unwrap();
    assert_eq!(channel.time_period_start, Some(base_time()));
    assert_eq!(channel.sample_rate, Some(1.0));
}
