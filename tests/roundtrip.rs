//! Persistence round trips: everything written before close must read back
//! field-for-field after reopen, and corruption must be detected.

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use mtarc_core::{
    ChannelMetadata, FileVersion, FilterKind, FilterRecord, Location, MtArchive, RunMetadata,
    StationMetadata, SurveyMetadata, VerificationStatus,
};

fn sample_wave(n: usize) -> Vec<f64> {
    // deterministic sinusoid plus seeded noise, so equality checks stay exact
    let mut rng = fastrand::Rng::with_seed(0x6d74_6172);
    (0..n)
        .map(|i| (i as f64 * 0.1).sin() + 0.05 * rng.f64())
        .collect()
}

#[test]
fn full_tree_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roundtrip.mta");

    let mut survey_meta = SurveyMetadata::new("cascadia");
    survey_meta.name = Some("Cascadia Margin".to_string());
    survey_meta.project = Some("iMUSH".to_string());
    survey_meta
        .extra
        .insert("operator".to_string(), serde_json::json!("USGS"));

    let mut station_meta = StationMetadata::new("mt01");
    station_meta.geographic_name = Some("Rattlesnake Ridge".to_string());
    station_meta.location = Some(Location {
        latitude: 46.53,
        longitude: -120.47,
        elevation: 652.0,
    });

    let mut run_meta = RunMetadata::new("001");
    run_meta.sample_rate = Some(256.0);
    run_meta.time_period_start = Some(Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap());
    run_meta.time_period_end = Some(Utc.with_ymd_and_hms(2021, 6, 1, 1, 0, 0).unwrap());

    let mut channel_meta = ChannelMetadata::new("ex");
    channel_meta.units = Some("millivolts_per_kilometer".to_string());
    channel_meta.sample_rate = Some(256.0);
    channel_meta.time_period_start = run_meta.time_period_start;
    channel_meta.azimuth = Some(12.5);
    channel_meta.tilt = Some(0.0);
    channel_meta.filter_names = vec!["dipole_scaling".to_string()];

    let mut filter = FilterRecord::new("dipole_scaling", FilterKind::Coefficient);
    filter.units_in = Some("millivolts".to_string());
    filter.units_out = Some("millivolts_per_kilometer".to_string());
    filter
        .parameters
        .insert("gain".to_string(), serde_json::json!(0.01));

    let samples = sample_wave(4096);
    {
        let mut archive = MtArchive::create(&path, FileVersion::V2).unwrap();
        archive
            .add_survey("cascadia", Some(survey_meta.clone()))
            .unwrap();
        archive.add_filter("cascadia", filter.clone()).unwrap();
        archive
            .add_station("cascadia", "mt01", Some(station_meta.clone()))
            .unwrap();
        archive
            .add_run("cascadia", "mt01", "001", Some(run_meta.clone()))
            .unwrap();
        archive
            .add_channel(
                "cascadia",
                "mt01",
                "001",
                "ex",
                &samples,
                Some(channel_meta.clone()),
            )
            .unwrap();
        archive.close().unwrap();
    }

    let reopened = MtArchive::open_read_only(&path).unwrap();
    assert_eq!(reopened.file_version(), FileVersion::V2);
    assert_eq!(reopened.get_survey("cascadia").unwrap(), survey_meta);
    assert_eq!(
        reopened.get_station("cascadia", "mt01").unwrap(),
        station_meta
    );
    assert_eq!(
        reopened.get_run("cascadia", "mt01", "001").unwrap(),
        run_meta
    );
    assert_eq!(
        reopened.get_channel("cascadia", "mt01", "001", "ex").unwrap(),
        channel_meta
    );
    assert_eq!(
        reopened.get_filter("cascadia", "dipole_scaling").unwrap(),
        filter
    );
    assert_eq!(
        reopened
            .channel_samples("cascadia", "mt01", "001", "ex")
            .unwrap(),
        samples
    );
    assert_eq!(
        reopened
            .channel_sample_count("cascadia", "mt01", "001", "ex")
            .unwrap(),
        4096
    );
}

#[test]
fn windowed_reads_match_full_decode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("window.mta");
    let samples = sample_wave(1000);
    {
        let mut archive = MtArchive::create(&path, FileVersion::V2).unwrap();
        archive.add_survey("s1", None).unwrap();
        archive.add_station("s1", "mt01", None).unwrap();
        archive.add_run("s1", "mt01", "001", None).unwrap();
        archive
            .add_channel("s1", "mt01", "001", "hx", &samples, None)
            .unwrap();
        archive.close().unwrap();
    }
    let reopened = MtArchive::open_read_only(&path).unwrap();
    let window = reopened
        .channel_samples_window("s1", "mt01", "001", "hx", 250, 500)
        .unwrap();
    assert_eq!(window, samples[250..750].to_vec());
}

#[test]
fn flush_on_drop_persists_pending_mutations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("drop.mta");
    {
        let mut archive = MtArchive::create(&path, FileVersion::V2).unwrap();
        archive.add_survey("s1", None).unwrap();
        // no explicit close; Drop must flush
    }
    let reopened = MtArchive::open_read_only(&path).unwrap();
    assert_eq!(reopened.survey_ids(), vec!["s1"]);
}

#[test]
fn corrupted_payload_fails_verification() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.mta");
    {
        let mut archive = MtArchive::create(&path, FileVersion::V2).unwrap();
        archive.add_survey("s1", None).unwrap();
        archive.add_station("s1", "mt01", None).unwrap();
        archive.add_run("s1", "mt01", "001", None).unwrap();
        archive
            .add_channel("s1", "mt01", "001", "ex", &sample_wave(512), None)
            .unwrap();
        archive.close().unwrap();
    }

    // flip bytes in the middle of the tree blob
    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    for byte in &mut bytes[mid..mid + 8] {
        *byte ^= 0xFF;
    }
    std::fs::write(&path, &bytes).unwrap();

    let report = MtArchive::verify(&path).unwrap();
    assert_eq!(report.overall_status, VerificationStatus::Failed);
    assert!(MtArchive::open(&path).is_err());
}

#[test]
fn exclusive_create_and_overwrite_modes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("modes.mta");
    {
        let mut archive = MtArchive::create_exclusive(&path, FileVersion::V2).unwrap();
        archive.add_survey("s1", None).unwrap();
        archive.close().unwrap();
    }
    assert!(matches!(
        MtArchive::create_exclusive(&path, FileVersion::V2).unwrap_err(),
        mtarc_core::ArchiveError::AlreadyExists { .. }
    ));
    // plain create truncates
    let truncated = MtArchive::create(&path, FileVersion::V2).unwrap();
    assert!(truncated.survey_ids().is_empty());
}
