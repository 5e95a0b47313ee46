#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss,
        clippy::field_reassign_with_default
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions, allowed project-wide:
//
// Documentation lints: internal/self-documenting functions don't all need
// extensive docs. Public APIs should still be documented.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: casts are bounded by real-world constraints (tree sizes,
// sample counts, nanosecond intervals).
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity: hierarchy walks naturally nest several levels deep.
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
// e.g., survey_id, station_id, run_id are intentionally similar
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::map_unwrap_or)]

//! Single-file hierarchical archive for magnetotelluric time series.
//!
//! An archive holds a Survey → Station → Run → Channel tree in one file:
//! a fixed binary header, then a checksummed metadata tree with embedded
//! sample arrays. [`MtArchive`] is the entry point; consistency propagation,
//! the channel summary index, run segmentation, and ingestion build on it.

/// The mtarc-core crate version (matches `Cargo.toml`).
pub const MTARC_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod archive;
pub mod constants;
pub mod error;
pub mod ingest;
pub mod io;
mod lock;
pub mod segment;
pub mod store;
pub mod types;

pub use archive::MtArchive;
pub use error::{ArchiveError, EntityKind, Result};
pub use ingest::{
    InstrumentReader, InstrumentRecording, RetrievalClient, RetrievalRequest, TimedRecord,
    ingest_recording,
};
pub use segment::{RunSpan, SegmentationConfig, segment_records};
pub use store::{ArrayDataset, AttrValue, Dataset, DatasetEncoding, GroupNode, TableDataset};
pub use types::{
    AccessMode, ChannelKind, ChannelMetadata, ChannelSummaryRow, FileVersion, FilterKind,
    FilterRecord, GeoPoint, Location, RunMetadata, Stats, StationMetadata, StructuralOp,
    SurveyMetadata, VerificationCheck, VerificationReport, VerificationStatus,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[test]
    fn create_populate_reopen() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("survey.mta");

        let mut archive = MtArchive::create(&path, FileVersion::V2).expect("create");
        archive.add_survey("cascadia", None).expect("survey");
        archive.add_station("cascadia", "mt01", None).expect("station");
        archive.add_run("cascadia", "mt01", "001", None).expect("run");
        let mut meta = ChannelMetadata::new("ex");
        meta.sample_rate = Some(1.0);
        meta.time_period_start = Some(Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap());
        archive
            .add_channel("cascadia", "mt01", "001", "ex", &[0.25, 0.5, 0.75], Some(meta))
            .expect("channel");
        let rows = archive.summarize().expect("summarize");
        assert_eq!(rows, 1);
        archive.close().expect("close");
        drop(archive);

        let reopened = MtArchive::open_read_only(&path).expect("open");
        assert_eq!(reopened.survey_ids(), vec!["cascadia"]);
        assert_eq!(
            reopened
                .channel_samples("cascadia", "mt01", "001", "ex")
                .expect("samples"),
            vec![0.25, 0.5, 0.75]
        );
        let records = reopened.to_records().expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel, "ex");

        let stats = reopened.stats().expect("stats");
        assert_eq!(stats.channels, 1);
        assert_eq!(stats.total_samples, 3);
    }
}
