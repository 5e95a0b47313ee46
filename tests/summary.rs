//! Integration tests for the channel summary index and consistency
//! propagation working together.

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use mtarc_core::{
    ChannelKind, ChannelMetadata, FileVersion, Location, MtArchive, StationMetadata,
};

fn stamped(component: &str, rate: f64, hour: u32) -> ChannelMetadata {
    let mut meta = ChannelMetadata::new(component);
    meta.sample_rate = Some(rate);
    meta.time_period_start = Some(Utc.with_ymd_and_hms(2021, 6, 1, hour, 0, 0).unwrap());
    meta
}

fn populated(path: &std::path::Path) -> MtArchive {
    let mut archive = MtArchive::create(path, FileVersion::V2).unwrap();
    archive.add_survey("s1", None).unwrap();
    let mut station = StationMetadata::new("mt01");
    station.location = Some(Location {
        latitude: 45.0,
        longitude: -120.0,
        elevation: 800.0,
    });
    archive.add_station("s1", "mt01", Some(station)).unwrap();
    archive.add_run("s1", "mt01", "001", None).unwrap();
    for component in ["ex", "ey", "hx", "hy", "hz"] {
        archive
            .add_channel(
                "s1",
                "mt01",
                "001",
                component,
                &[0.0; 3600],
                Some(stamped(component, 1.0, 0)),
            )
            .unwrap();
    }
    archive
}

#[test]
fn summary_covers_every_channel_and_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("summary.mta");
    let mut archive = populated(&path);
    assert_eq!(archive.summarize().unwrap(), 5);
    archive.close().unwrap();
    drop(archive);

    let reopened = MtArchive::open_read_only(&path).unwrap();
    let rows = reopened.to_records().unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.survey == "s1" && r.station == "mt01"));
    assert!(rows.iter().all(|r| r.n_samples == 3600));
    assert!(rows.iter().all(|r| r.latitude == Some(45.0)));
    let electric = rows
        .iter()
        .filter(|r| r.kind == ChannelKind::Electric)
        .count();
    let magnetic = rows
        .iter()
        .filter(|r| r.kind == ChannelKind::Magnetic)
        .count();
    assert_eq!((electric, magnetic), (2, 3));
}

#[test]
fn station_removal_zeroes_rows_on_next_rebuild() {
    let dir = TempDir::new().unwrap();
    let mut archive = populated(&dir.path().join("removal.mta"));
    archive.summarize().unwrap();
    assert_eq!(archive.to_records().unwrap().len(), 5);

    archive.remove_station("s1", "mt01").unwrap();
    // stale rows remain until the caller rebuilds
    assert_eq!(archive.to_records().unwrap().len(), 5);
    assert_eq!(archive.summarize().unwrap(), 0);
    assert!(archive.to_records().unwrap().is_empty());
}

#[test]
fn summarize_twice_yields_identical_rows() {
    let dir = TempDir::new().unwrap();
    let mut archive = populated(&dir.path().join("idem.mta"));
    archive.summarize().unwrap();
    let first = archive.to_records().unwrap();
    archive.summarize().unwrap();
    assert_eq!(archive.to_records().unwrap(), first);
}

#[test]
fn consistency_chain_propagates_bottom_up() {
    let dir = TempDir::new().unwrap();
    let mut archive = populated(&dir.path().join("chain.mta"));
    // second run six hours later
    archive.add_run("s1", "mt01", "002", None).unwrap();
    archive
        .add_channel(
            "s1",
            "mt01",
            "002",
            "ex",
            &[0.0; 3600],
            Some(stamped("ex", 1.0, 6)),
        )
        .unwrap();

    archive.validate_run_metadata("s1", "mt01", "001").unwrap();
    archive.validate_run_metadata("s1", "mt01", "002").unwrap();
    let station = archive.validate_station_metadata("s1", "mt01").unwrap();
    assert_eq!(
        station.time_period_start,
        Some(Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        station.time_period_end,
        Some(Utc.with_ymd_and_hms(2021, 6, 1, 7, 0, 0).unwrap())
    );

    let survey = archive.update_survey_metadata("s1").unwrap();
    assert_eq!(survey.time_period_start, station.time_period_start);
    assert_eq!(survey.time_period_end, station.time_period_end);
    let nw = survey.northwest_corner.unwrap();
    assert_eq!((nw.latitude, nw.longitude), (45.0, -120.0));

    // the summary picks up the derived channel ends
    archive.summarize().unwrap();
    let rows = archive.to_records().unwrap();
    let late = rows
        .iter()
        .find(|r| r.run == "002" && r.channel == "ex")
        .unwrap();
    assert_eq!(
        late.end,
        Some(Utc.with_ymd_and_hms(2021, 6, 1, 7, 0, 0).unwrap())
    );
}
