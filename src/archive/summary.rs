//! Derived channel summary index.
//!
//! `summarize` is a full rebuild: prior rows are discarded and the reachable
//! hierarchy is walked once, one row per channel. Partial metadata never
//! fails the scan; missing fields become sentinel values in the row. The
//! table is a projection, never a source of truth.

use tracing::debug;

use crate::archive::lifecycle::MtArchive;
use crate::constants::SUMMARY_GROUP;
use crate::error::Result;
use crate::store::{Dataset, TableDataset};
use crate::types::{ChannelKind, ChannelMetadata, ChannelSummaryRow, StationMetadata};

const SUMMARY_TABLE: &str = "rows";

impl MtArchive {
    /// Rebuild the channel summary index from scratch. Returns the row count.
    pub fn summarize(&mut self) -> Result<usize> {
        self.assert_writable()?;
        let mut rows = Vec::new();
        for survey_id in self.survey_ids() {
            for station_id in self.station_ids(&survey_id)? {
                let station = self
                    .get_station(&survey_id, &station_id)
                    .unwrap_or_else(|_| StationMetadata::new(&station_id));
                for run_id in self.run_ids(&survey_id, &station_id)? {
                    for channel_id in self.channel_ids(&survey_id, &station_id, &run_id)? {
                        let channel = self
                            .get_channel(&survey_id, &station_id, &run_id, &channel_id)
                            .unwrap_or_else(|_| ChannelMetadata::new(&channel_id));
                        let n_samples = self.channel_sample_count(
                            &survey_id,
                            &station_id,
                            &run_id,
                            &channel_id,
                        )?;
                        rows.push(ChannelSummaryRow {
                            survey: survey_id.clone(),
                            station: station_id.clone(),
                            run: run_id.clone(),
                            channel: channel_id.clone(),
                            kind: ChannelKind::classify(&channel_id),
                            start: channel.time_period_start,
                            end: channel.end_for(n_samples),
                            n_samples,
                            sample_rate: channel.sample_rate,
                            units: channel.units.unwrap_or_default(),
                            latitude: station.location.map(|l| l.latitude),
                            longitude: station.location.map(|l| l.longitude),
                            elevation: station.location.map(|l| l.elevation),
                            azimuth: channel.azimuth,
                            tilt: channel.tilt,
                        });
                    }
                }
            }
        }
        let count = rows.len();
        self.write_summary_rows(&rows)?;
        debug!(rows = count, "rebuilt channel summary");
        Ok(count)
    }

    /// Drop all summary rows, leaving an empty table. Idempotent.
    pub fn clear_table(&mut self) -> Result<()> {
        self.assert_writable()?;
        self.write_summary_rows::<ChannelSummaryRow>(&[])?;
        Ok(())
    }

    /// Decode the current summary rows. An archive that has never been
    /// summarized yields an empty list.
    pub fn to_records(&self) -> Result<Vec<ChannelSummaryRow>> {
        match self
            .root
            .group(SUMMARY_GROUP)
            .and_then(|group| group.dataset(SUMMARY_TABLE))
            .and_then(Dataset::as_table)
        {
            Some(table) => table.rows(),
            None => Ok(Vec::new()),
        }
    }

    fn write_summary_rows<T: serde::Serialize>(&mut self, rows: &[T]) -> Result<()> {
        let table = TableDataset::from_rows(rows)?;
        self.root
            .ensure_group(SUMMARY_GROUP)
            .set_dataset(SUMMARY_TABLE, Dataset::Table(table));
        self.dirty = true;
        Ok(())
    }
}
