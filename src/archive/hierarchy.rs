//! Group-node operations over the Survey → Station → Run → Channel tree.
//!
//! All operations are keyed by string ids and fail fast: missing ids raise
//! `NotFound` naming the level, sibling collisions raise `DuplicateId`, and
//! metadata attachment validates before anything is written. Removals delete
//! the whole subtree. Listings preserve insertion order.

use tracing::debug;

use crate::archive::lifecycle::{DEFAULT_SURVEY_ATTR, MtArchive, SURVEYS_GROUP};
use crate::constants::{FILTERS_GROUP, MAX_ID_LEN};
use crate::error::{ArchiveError, EntityKind, Result};
use crate::store::{
    ArrayDataset, AttrValue, Dataset, DatasetEncoding, GroupNode, attr_map_from, attr_map_into,
};
use crate::types::{
    ChannelKind, ChannelMetadata, FileVersion, FilterRecord, RunMetadata, StationMetadata,
    StructuralOp, SurveyMetadata,
};

pub(crate) const STATIONS_GROUP: &str = "stations";
pub(crate) const RUNS_GROUP: &str = "runs";
pub(crate) const CHANNELS_GROUP: &str = "channels";
pub(crate) const SAMPLES_DATASET: &str = "samples";

fn not_found(kind: EntityKind, name: &str) -> ArchiveError {
    ArchiveError::NotFound {
        kind,
        name: name.to_string(),
    }
}

fn duplicate(kind: EntityKind, id: &str) -> ArchiveError {
    ArchiveError::DuplicateId {
        kind,
        id: id.to_string(),
    }
}

fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() || id.len() > MAX_ID_LEN || id.contains('/') {
        return Err(ArchiveError::MetadataValidation {
            fields: vec!["id".to_string()],
        });
    }
    Ok(())
}

fn check_metadata(fields: Vec<String>) -> Result<()> {
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ArchiveError::MetadataValidation { fields })
    }
}

// Node navigation. Readers get Option-free Results naming the missing level.
impl MtArchive {
    pub(crate) fn survey_node(&self, survey: &str) -> Result<&GroupNode> {
        self.root
            .group(SURVEYS_GROUP)
            .and_then(|node| node.group(survey))
            .ok_or_else(|| not_found(EntityKind::Survey, survey))
    }

    pub(crate) fn survey_node_mut(&mut self, survey: &str) -> Result<&mut GroupNode> {
        self.root
            .ensure_group(SURVEYS_GROUP)
            .group_mut(survey)
            .ok_or_else(|| not_found(EntityKind::Survey, survey))
    }

    pub(crate) fn station_node(&self, survey: &str, station: &str) -> Result<&GroupNode> {
        self.survey_node(survey)?
            .group(STATIONS_GROUP)
            .and_then(|node| node.group(station))
            .ok_or_else(|| not_found(EntityKind::Station, station))
    }

    pub(crate) fn station_node_mut(
        &mut self,
        survey: &str,
        station: &str,
    ) -> Result<&mut GroupNode> {
        self.survey_node_mut(survey)?
            .ensure_group(STATIONS_GROUP)
            .group_mut(station)
            .ok_or_else(|| not_found(EntityKind::Station, station))
    }

    pub(crate) fn run_node(&self, survey: &str, station: &str, run: &str) -> Result<&GroupNode> {
        self.station_node(survey, station)?
            .group(RUNS_GROUP)
            .and_then(|node| node.group(run))
            .ok_or_else(|| not_found(EntityKind::Run, run))
    }

    pub(crate) fn run_node_mut(
        &mut self,
        survey: &str,
        station: &str,
        run: &str,
    ) -> Result<&mut GroupNode> {
        self.station_node_mut(survey, station)?
            .ensure_group(RUNS_GROUP)
            .group_mut(run)
            .ok_or_else(|| not_found(EntityKind::Run, run))
    }

    pub(crate) fn channel_node(
        &self,
        survey: &str,
        station: &str,
        run: &str,
        channel: &str,
    ) -> Result<&GroupNode> {
        self.run_node(survey, station, run)?
            .group(CHANNELS_GROUP)
            .and_then(|node| node.group(channel))
            .ok_or_else(|| not_found(EntityKind::Channel, channel))
    }
}

// Survey operations.
impl MtArchive {
    /// Add a survey. The schema version gate is consulted first: a legacy
    /// archive holds at most one survey.
    pub fn add_survey(&mut self, id: &str, metadata: Option<SurveyMetadata>) -> Result<()> {
        self.assert_writable()?;
        check_id(id)?;
        let version = self.file_version();
        let op = StructuralOp::AddSurvey {
            existing_surveys: self.survey_ids().len(),
        };
        if !version.permits(&op) {
            return Err(ArchiveError::InvalidVersion {
                version: version.to_string(),
                reason: "single-survey archives hold exactly one survey".to_string(),
            });
        }
        let mut metadata = metadata.unwrap_or_else(|| SurveyMetadata::new(id));
        metadata.id = id.to_string();
        check_metadata(metadata.validate())?;
        let attrs = attr_map_from(&metadata)?;

        let surveys = self.root.ensure_group(SURVEYS_GROUP);
        if surveys.group(id).is_some() {
            return Err(duplicate(EntityKind::Survey, id));
        }
        let mut node = GroupNode::new();
        node.attrs = attrs;
        node.ensure_group(STATIONS_GROUP);
        node.ensure_group(FILTERS_GROUP);
        surveys.insert_group(id, node);
        if version == FileVersion::V1 {
            self.root
                .set_attr(DEFAULT_SURVEY_ATTR, AttrValue::Text(id.to_string()));
        }
        self.dirty = true;
        debug!(survey = id, "added survey");
        Ok(())
    }

    pub fn get_survey(&self, id: &str) -> Result<SurveyMetadata> {
        attr_map_into(&self.survey_node(id)?.attrs)
    }

    pub fn set_survey_metadata(&mut self, id: &str, mut metadata: SurveyMetadata) -> Result<()> {
        self.assert_writable()?;
        metadata.id = id.to_string();
        check_metadata(metadata.validate())?;
        let attrs = attr_map_from(&metadata)?;
        self.survey_node_mut(id)?.attrs = attrs;
        self.dirty = true;
        Ok(())
    }

    /// Remove a survey and everything under it.
    pub fn remove_survey(&mut self, id: &str) -> Result<()> {
        self.assert_writable()?;
        self.root
            .ensure_group(SURVEYS_GROUP)
            .remove_group(id)
            .ok_or_else(|| not_found(EntityKind::Survey, id))?;
        if self.default_survey().as_deref() == Some(id) {
            self.root.attrs.remove(DEFAULT_SURVEY_ATTR);
        }
        self.dirty = true;
        debug!(survey = id, "removed survey");
        Ok(())
    }

    pub fn survey_ids(&self) -> Vec<String> {
        self.root
            .group(SURVEYS_GROUP)
            .map(GroupNode::group_names)
            .unwrap_or_default()
    }
}

// Station operations.
impl MtArchive {
    pub fn add_station(
        &mut self,
        survey: &str,
        id: &str,
        metadata: Option<StationMetadata>,
    ) -> Result<()> {
        self.assert_writable()?;
        check_id(id)?;
        let mut metadata = metadata.unwrap_or_else(|| StationMetadata::new(id));
        metadata.id = id.to_string();
        check_metadata(metadata.validate())?;
        let attrs = attr_map_from(&metadata)?;

        let stations = self.survey_node_mut(survey)?.ensure_group(STATIONS_GROUP);
        if stations.group(id).is_some() {
            return Err(duplicate(EntityKind::Station, id));
        }
        let mut node = GroupNode::new();
        node.attrs = attrs;
        node.ensure_group(RUNS_GROUP);
        stations.insert_group(id, node);
        self.dirty = true;
        debug!(survey, station = id, "added station");
        Ok(())
    }

    pub fn get_station(&self, survey: &str, id: &str) -> Result<StationMetadata> {
        attr_map_into(&self.station_node(survey, id)?.attrs)
    }

    pub fn set_station_metadata(
        &mut self,
        survey: &str,
        id: &str,
        mut metadata: StationMetadata,
    ) -> Result<()> {
        self.assert_writable()?;
        metadata.id = id.to_string();
        check_metadata(metadata.validate())?;
        let attrs = attr_map_from(&metadata)?;
        self.station_node_mut(survey, id)?.attrs = attrs;
        self.dirty = true;
        Ok(())
    }

    pub fn remove_station(&mut self, survey: &str, id: &str) -> Result<()> {
        self.assert_writable()?;
        self.survey_node_mut(survey)?
            .ensure_group(STATIONS_GROUP)
            .remove_group(id)
            .ok_or_else(|| not_found(EntityKind::Station, id))?;
        self.dirty = true;
        debug!(survey, station = id, "removed station");
        Ok(())
    }

    pub fn station_ids(&self, survey: &str) -> Result<Vec<String>> {
        Ok(self
            .survey_node(survey)?
            .group(STATIONS_GROUP)
            .map(GroupNode::group_names)
            .unwrap_or_default())
    }
}

// Legacy single-survey convenience. On archives that track a default survey
// slot, station-level lookups may omit the survey id.
impl MtArchive {
    fn resolve_default_survey(&self) -> Result<String> {
        self.default_survey()
            .ok_or_else(|| not_found(EntityKind::Survey, "<default>"))
    }

    pub fn get_default_survey_station(&self, id: &str) -> Result<StationMetadata> {
        let survey = self.resolve_default_survey()?;
        self.get_station(&survey, id)
    }

    pub fn default_survey_station_ids(&self) -> Result<Vec<String>> {
        let survey = self.resolve_default_survey()?;
        self.station_ids(&survey)
    }
}

// Run operations.
impl MtArchive {
    pub fn add_run(
        &mut self,
        survey: &str,
        station: &str,
        id: &str,
        metadata: Option<RunMetadata>,
    ) -> Result<()> {
        self.assert_writable()?;
        check_id(id)?;
        let mut metadata = metadata.unwrap_or_else(|| RunMetadata::new(id));
        metadata.id = id.to_string();
        check_metadata(metadata.validate())?;
        let attrs = attr_map_from(&metadata)?;

        let runs = self
            .station_node_mut(survey, station)?
            .ensure_group(RUNS_GROUP);
        if runs.group(id).is_some() {
            return Err(duplicate(EntityKind::Run, id));
        }
        let mut node = GroupNode::new();
        node.attrs = attrs;
        node.ensure_group(CHANNELS_GROUP);
        runs.insert_group(id, node);
        self.dirty = true;
        debug!(survey, station, run = id, "added run");
        Ok(())
    }

    pub fn get_run(&self, survey: &str, station: &str, id: &str) -> Result<RunMetadata> {
        attr_map_into(&self.run_node(survey, station, id)?.attrs)
    }

    pub fn set_run_metadata(
        &mut self,
        survey: &str,
        station: &str,
        id: &str,
        mut metadata: RunMetadata,
    ) -> Result<()> {
        self.assert_writable()?;
        metadata.id = id.to_string();
        check_metadata(metadata.validate())?;
        let attrs = attr_map_from(&metadata)?;
        self.run_node_mut(survey, station, id)?.attrs = attrs;
        self.dirty = true;
        Ok(())
    }

    pub fn remove_run(&mut self, survey: &str, station: &str, id: &str) -> Result<()> {
        self.assert_writable()?;
        self.station_node_mut(survey, station)?
            .ensure_group(RUNS_GROUP)
            .remove_group(id)
            .ok_or_else(|| not_found(EntityKind::Run, id))?;
        self.dirty = true;
        debug!(survey, station, run = id, "removed run");
        Ok(())
    }

    pub fn run_ids(&self, survey: &str, station: &str) -> Result<Vec<String>> {
        Ok(self
            .station_node(survey, station)?
            .group(RUNS_GROUP)
            .map(GroupNode::group_names)
            .unwrap_or_default())
    }
}

// Channel operations.
impl MtArchive {
    /// Add a channel with its sample array. The channel id is the component
    /// code; the measurement class is derived from it.
    pub fn add_channel(
        &mut self,
        survey: &str,
        station: &str,
        run: &str,
        id: &str,
        samples: &[f64],
        metadata: Option<ChannelMetadata>,
    ) -> Result<()> {
        self.assert_writable()?;
        check_id(id)?;
        let mut metadata = metadata.unwrap_or_else(|| ChannelMetadata::new(id));
        metadata.component = id.to_string();
        metadata.kind = ChannelKind::classify(id);
        check_metadata(metadata.validate())?;
        let attrs = attr_map_from(&metadata)?;
        let dataset = ArrayDataset::from_samples(samples, DatasetEncoding::Zstd)?;

        let channels = self
            .run_node_mut(survey, station, run)?
            .ensure_group(CHANNELS_GROUP);
        if channels.group(id).is_some() {
            return Err(duplicate(EntityKind::Channel, id));
        }
        let mut node = GroupNode::new();
        node.attrs = attrs;
        node.set_dataset(SAMPLES_DATASET, Dataset::Array(dataset));
        channels.insert_group(id, node);
        self.dirty = true;
        debug!(survey, station, run, channel = id, samples = samples.len(), "added channel");
        Ok(())
    }

    pub fn get_channel(
        &self,
        survey: &str,
        station: &str,
        run: &str,
        id: &str,
    ) -> Result<ChannelMetadata> {
        attr_map_into(&self.channel_node(survey, station, run, id)?.attrs)
    }

    pub fn set_channel_metadata(
        &mut self,
        survey: &str,
        station: &str,
        run: &str,
        id: &str,
        mut metadata: ChannelMetadata,
    ) -> Result<()> {
        self.assert_writable()?;
        metadata.component = id.to_string();
        metadata.kind = ChannelKind::classify(id);
        check_metadata(metadata.validate())?;
        let attrs = attr_map_from(&metadata)?;
        let node = self
            .run_node_mut(survey, station, run)?
            .ensure_group(CHANNELS_GROUP)
            .group_mut(id)
            .ok_or_else(|| not_found(EntityKind::Channel, id))?;
        node.attrs = attrs;
        self.dirty = true;
        Ok(())
    }

    pub fn remove_channel(
        &mut self,
        survey: &str,
        station: &str,
        run: &str,
        id: &str,
    ) -> Result<()> {
        self.assert_writable()?;
        self.run_node_mut(survey, station, run)?
            .ensure_group(CHANNELS_GROUP)
            .remove_group(id)
            .ok_or_else(|| not_found(EntityKind::Channel, id))?;
        self.dirty = true;
        debug!(survey, station, run, channel = id, "removed channel");
        Ok(())
    }

    pub fn channel_ids(&self, survey: &str, station: &str, run: &str) -> Result<Vec<String>> {
        Ok(self
            .run_node(survey, station, run)?
            .group(CHANNELS_GROUP)
            .map(GroupNode::group_names)
            .unwrap_or_default())
    }

    pub fn channel_sample_count(
        &self,
        survey: &str,
        station: &str,
        run: &str,
        id: &str,
    ) -> Result<u64> {
        let node = self.channel_node(survey, station, run, id)?;
        Ok(node
            .dataset(SAMPLES_DATASET)
            .and_then(Dataset::as_array)
            .map_or(0, ArrayDataset::len))
    }

    /// Decode the full sample array, verifying its checksum.
    pub fn channel_samples(
        &self,
        survey: &str,
        station: &str,
        run: &str,
        id: &str,
    ) -> Result<Vec<f64>> {
        let node = self.channel_node(survey, station, run, id)?;
        match node.dataset(SAMPLES_DATASET).and_then(Dataset::as_array) {
            Some(array) => array.samples(),
            None => Ok(Vec::new()),
        }
    }

    /// Read a window of samples by offset and count. Out-of-range windows
    /// clamp to the available samples, like a slice of the decoded array.
    pub fn channel_samples_window(
        &self,
        survey: &str,
        station: &str,
        run: &str,
        id: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<f64>> {
        let samples = self.channel_samples(survey, station, run, id)?;
        let start = offset.min(samples.len());
        let end = offset.saturating_add(count).min(samples.len());
        Ok(samples[start..end].to_vec())
    }
}

// Survey-level filter registry.
impl MtArchive {
    pub fn add_filter(&mut self, survey: &str, record: FilterRecord) -> Result<()> {
        self.assert_writable()?;
        check_id(&record.name)?;
        let attrs = attr_map_from(&record)?;
        let name = record.name.clone();
        let filters = self.survey_node_mut(survey)?.ensure_group(FILTERS_GROUP);
        if filters.group(&name).is_some() {
            return Err(duplicate(EntityKind::Filter, &name));
        }
        let mut node = GroupNode::new();
        node.attrs = attrs;
        filters.insert_group(&name, node);
        self.dirty = true;
        debug!(survey, filter = %name, "added filter");
        Ok(())
    }

    pub fn get_filter(&self, survey: &str, name: &str) -> Result<FilterRecord> {
        let node = self
            .survey_node(survey)?
            .group(FILTERS_GROUP)
            .and_then(|group| group.group(name))
            .ok_or_else(|| not_found(EntityKind::Filter, name))?;
        attr_map_into(&node.attrs)
    }

    pub fn remove_filter(&mut self, survey: &str, name: &str) -> Result<()> {
        self.assert_writable()?;
        self.survey_node_mut(survey)?
            .ensure_group(FILTERS_GROUP)
            .remove_group(name)
            .ok_or_else(|| not_found(EntityKind::Filter, name))?;
        self.dirty = true;
        Ok(())
    }

    pub fn filter_names(&self, survey: &str) -> Result<Vec<String>> {
        Ok(self
            .survey_node(survey)?
            .group(FILTERS_GROUP)
            .map(GroupNode::group_names)
            .unwrap_or_default())
    }
}
