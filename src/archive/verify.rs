//! Offline verification and archive statistics.
//!
//! `verify` opens the file read-only and runs a fixed sequence of checks:
//! header and tree integrity, the schema version gate, id agreement between
//! node names and their metadata, and sample-data checksums. Checks collect
//! into a report instead of aborting at the first finding; only a file that
//! cannot be opened at all short-circuits.

use std::path::Path;

use tracing::debug;

use crate::archive::lifecycle::MtArchive;
use crate::error::Result;
use crate::types::{
    FileVersion, Stats, VerificationCheck, VerificationReport,
};

impl MtArchive {
    /// Verify the archive at `path` without mutating it.
    pub fn verify<P: AsRef<Path>>(path: P) -> Result<VerificationReport> {
        let path = path.as_ref();
        let archive = match Self::open_read_only(path) {
            Ok(archive) => archive,
            Err(err) => {
                return Ok(VerificationReport::from_checks(
                    path.to_path_buf(),
                    vec![VerificationCheck::failed("header", err.to_string())],
                ));
            }
        };
        let mut checks = vec![VerificationCheck::passed("header")];
        checks.push(archive.check_version_gate());
        checks.push(archive.check_id_agreement()?);
        checks.push(archive.check_sample_data()?);
        let report = VerificationReport::from_checks(path.to_path_buf(), checks);
        debug!(path = %path.display(), status = ?report.overall_status, "verified archive");
        Ok(report)
    }

    fn check_version_gate(&self) -> VerificationCheck {
        let surveys = self.survey_ids().len();
        if self.file_version() == FileVersion::V1 && surveys > 1 {
            VerificationCheck::failed(
                "version_gate",
                format!("single-survey archive holds {surveys} surveys"),
            )
        } else {
            VerificationCheck::passed("version_gate")
        }
    }

    /// Node names and their decoded metadata ids must agree at every level.
    fn check_id_agreement(&self) -> Result<VerificationCheck> {
        let mut findings = Vec::new();
        for survey_id in self.survey_ids() {
            match self.get_survey(&survey_id) {
                Ok(meta) if meta.id != survey_id => {
                    findings.push(format!("survey `{survey_id}` metadata id `{}`", meta.id));
                }
                Err(err) => findings.push(format!("survey `{survey_id}` undecodable: {err}")),
                _ => {}
            }
            for station_id in self.station_ids(&survey_id)? {
                match self.get_station(&survey_id, &station_id) {
                    Ok(meta) if meta.id != station_id => findings.push(format!(
                        "station `{survey_id}/{station_id}` metadata id `{}`",
                        meta.id
                    )),
                    Err(err) => findings.push(format!(
                        "station `{survey_id}/{station_id}` undecodable: {err}"
                    )),
                    _ => {}
                }
                for run_id in self.run_ids(&survey_id, &station_id)? {
                    match self.get_run(&survey_id, &station_id, &run_id) {
                        Ok(meta) if meta.id != run_id => findings.push(format!(
                            "run `{survey_id}/{station_id}/{run_id}` metadata id `{}`",
                            meta.id
                        )),
                        Err(err) => findings.push(format!(
                            "run `{survey_id}/{station_id}/{run_id}` undecodable: {err}"
                        )),
                        _ => {}
                    }
                    for channel_id in self.channel_ids(&survey_id, &station_id, &run_id)? {
                        match self.get_channel(&survey_id, &station_id, &run_id, &channel_id) {
                            Ok(meta) if meta.component != channel_id => findings.push(format!(
                                "channel `{survey_id}/{station_id}/{run_id}/{channel_id}` component `{}`",
                                meta.component
                            )),
                            Err(err) => findings.push(format!(
                                "channel `{survey_id}/{station_id}/{run_id}/{channel_id}` undecodable: {err}"
                            )),
                            _ => {}
                        }
                    }
                }
            }
        }
        Ok(if findings.is_empty() {
            VerificationCheck::passed("id_agreement")
        } else {
            VerificationCheck::failed("id_agreement", findings.join("; "))
        })
    }

    /// Every channel sample array must pass its checksum and decode, and its
    /// count must agree with the declared time span at the declared rate.
    fn check_sample_data(&self) -> Result<VerificationCheck> {
        let mut findings = Vec::new();
        for survey_id in self.survey_ids() {
            for station_id in self.station_ids(&survey_id)? {
                for run_id in self.run_ids(&survey_id, &station_id)? {
                    for channel_id in self.channel_ids(&survey_id, &station_id, &run_id)? {
                        let samples =
                            match self.channel_samples(&survey_id, &station_id, &run_id, &channel_id)
                            {
                                Ok(samples) => samples,
                                Err(err) => {
                                    findings.push(format!(
                                        "channel `{survey_id}/{station_id}/{run_id}/{channel_id}`: {err}"
                                    ));
                                    continue;
                                }
                            };
                        if let Ok(meta) =
                            self.get_channel(&survey_id, &station_id, &run_id, &channel_id)
                        {
                            if !meta.span_consistent(samples.len() as u64) {
                                findings.push(format!(
                                    "channel `{survey_id}/{station_id}/{run_id}/{channel_id}`: \
                                     declared span disagrees with {} samples",
                                    samples.len()
                                ));
                            }
                        }
                    }
                }
            }
        }
        Ok(if findings.is_empty() {
            VerificationCheck::passed("sample_data")
        } else {
            VerificationCheck::failed("sample_data", findings.join("; "))
        })
    }

    /// Count surveys, stations, runs, channels, and samples in one walk.
    pub fn stats(&self) -> Result<Stats> {
        let mut stats = Stats {
            file_bytes: self.file.metadata()?.len(),
            ..Stats::default()
        };
        for survey_id in self.survey_ids() {
            stats.surveys += 1;
            for station_id in self.station_ids(&survey_id)? {
                stats.stations += 1;
                for run_id in self.run_ids(&survey_id, &station_id)? {
                    stats.runs += 1;
                    for channel_id in self.channel_ids(&survey_id, &station_id, &run_id)? {
                        stats.channels += 1;
                        stats.total_samples += self.channel_sample_count(
                            &survey_id,
                            &station_id,
                            &run_id,
                            &channel_id,
                        )?;
                    }
                }
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::types::{ChannelMetadata, VerificationStatus};

    fn populated(dir: &tempfile::TempDir) -> MtArchive {
        let mut archive =
            MtArchive::create(dir.path().join("verify.mta"), FileVersion::V2).unwrap();
        archive.add_survey("s1", None).unwrap();
        archive.add_station("s1", "mt01", None).unwrap();
        archive.add_run("s1", "mt01", "001", None).unwrap();
        archive
            .add_channel("s1", "mt01", "001", "ex", &[1.0, 2.0, 3.0], None)
            .unwrap();
        archive
    }

    #[test]
    fn clean_archive_passes_all_checks() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = populated(&dir);
        let path = archive.path().to_path_buf();
        archive.close().unwrap();
        drop(archive);
        let report = MtArchive::verify(&path).unwrap();
        assert_eq!(report.overall_status, VerificationStatus::Passed);
        assert_eq!(report.checks.len(), 4);
        assert!(report
            .checks
            .iter()
            .all(|c| c.status == VerificationStatus::Passed));
    }

    #[test]
    fn missing_file_reports_header_failure() {
        let dir = tempfile::tempdir().unwrap();
        let report = MtArchive::verify(dir.path().join("absent.mta")).unwrap();
        assert_eq!(report.overall_status, VerificationStatus::Failed);
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks[0].name, "header");
    }

    #[test]
    fn truncated_file_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = populated(&dir);
        let path = archive.path().to_path_buf();
        archive.close().unwrap();
        drop(archive);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        let report = MtArchive::verify(&path).unwrap();
        assert_eq!(report.overall_status, VerificationStatus::Failed);
    }

    #[test]
    fn span_mismatch_fails_the_sample_data_check() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive =
            MtArchive::create(dir.path().join("span.mta"), FileVersion::V2).unwrap();
        archive.add_survey("s1", None).unwrap();
        archive.add_station("s1", "mt01", None).unwrap();
        archive.add_run("s1", "mt01", "001", None).unwrap();
        let mut meta = ChannelMetadata::new("ex");
        meta.sample_rate = Some(1.0);
        meta.time_period_start = Some(Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap());
        // declares 100 seconds but carries only 3 samples
        meta.time_period_end = Some(Utc.with_ymd_and_hms(2021, 6, 1, 0, 1, 40).unwrap());
        archive
            .add_channel("s1", "mt01", "001", "ex", &[0.0; 3], Some(meta))
            .unwrap();
        let path = archive.path().to_path_buf();
        archive.close().unwrap();
        drop(archive);

        let report = MtArchive::verify(&path).unwrap();
        assert_eq!(report.overall_status, VerificationStatus::Failed);
        let check = report
            .checks
            .iter()
            .find(|c| c.name == "sample_data")
            .unwrap();
        assert_eq!(check.status, VerificationStatus::Failed);
        assert!(check.detail.as_deref().unwrap_or("").contains("3 samples"));
    }

    #[test]
    fn stats_count_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = populated(&dir);
        archive
            .add_channel("s1", "mt01", "001", "hy", &[0.5; 7], None)
            .unwrap();
        let stats = archive.stats().unwrap();
        assert_eq!(stats.surveys, 1);
        assert_eq!(stats.stations, 1);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.channels, 2);
        assert_eq!(stats.total_samples, 10);
        assert!(stats.file_bytes > 0);
    }
}
