//! Container Backend: the generic group tree persisted in each archive file.
//!
//! The whole hierarchy is one recursive [`GroupNode`]. Groups carry typed
//! attributes, child groups, and datasets. Child groups and datasets keep
//! insertion order so listings are stable across a save/load cycle. Typed
//! archive operations navigate this tree; nothing in here knows about
//! surveys or stations.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArchiveError, Result};

/// Typed attribute value stored on a group.
///
/// Attributes round-trip through JSON when converting metadata records, so
/// non-finite floats collapse to `Null` on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttrValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    AttrValue::Float(f)
                } else {
                    AttrValue::Null
                }
            }
            Value::String(s) => AttrValue::Text(s.clone()),
            Value::Array(items) => {
                AttrValue::List(items.iter().map(AttrValue::from_json).collect())
            }
            Value::Object(map) => AttrValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttrValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Int(i) => Value::from(*i),
            AttrValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttrValue::Text(s) => Value::String(s.clone()),
            AttrValue::List(items) => {
                Value::Array(items.iter().map(AttrValue::to_json).collect())
            }
            AttrValue::Map(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Payload encoding for array datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetEncoding {
    Plain,
    Zstd,
}

/// Time-ordered f64 sample array, checksummed as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayDataset {
    encoding: DatasetEncoding,
    len: u64,
    checksum: [u8; 32],
    payload: Vec<u8>,
}

impl ArrayDataset {
    pub fn from_samples(samples: &[f64], encoding: DatasetEncoding) -> Result<Self> {
        let mut raw = Vec::with_capacity(samples.len() * 8);
        for sample in samples {
            raw.extend_from_slice(&sample.to_le_bytes());
        }
        let payload = match encoding {
            DatasetEncoding::Plain => raw,
            DatasetEncoding::Zstd => {
                zstd::encode_all(raw.as_slice(), zstd::DEFAULT_COMPRESSION_LEVEL)?
            }
        };
        let checksum = *blake3::hash(&payload).as_bytes();
        Ok(Self {
            encoding,
            len: samples.len() as u64,
            checksum,
            payload,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Verify the stored checksum without decoding the payload.
    pub fn verify_checksum(&self) -> bool {
        *blake3::hash(&self.payload).as_bytes() == self.checksum
    }

    /// Decode all samples, verifying the checksum first.
    pub fn samples(&self) -> Result<Vec<f64>> {
        if !self.verify_checksum() {
            return Err(ArchiveError::CorruptFormat {
                reason: "array dataset checksum mismatch".into(),
            });
        }
        let raw = match self.encoding {
            DatasetEncoding::Plain => self.payload.clone(),
            DatasetEncoding::Zstd => zstd::decode_all(self.payload.as_slice())?,
        };
        if raw.len() != self.len as usize * 8 {
            return Err(ArchiveError::CorruptFormat {
                reason: format!(
                    "array dataset length mismatch: {} bytes for {} samples",
                    raw.len(),
                    self.len
                ),
            });
        }
        let mut samples = Vec::with_capacity(self.len as usize);
        for chunk in raw.chunks_exact(8) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            samples.push(f64::from_le_bytes(bytes));
        }
        Ok(samples)
    }
}

/// Bincode-encoded row table, checksummed as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDataset {
    rows: u64,
    checksum: [u8; 32],
    payload: Vec<u8>,
}

impl TableDataset {
    pub fn from_rows<T: Serialize>(rows: &[T]) -> Result<Self> {
        let payload = bincode::serde::encode_to_vec(rows, bincode::config::standard())?;
        let checksum = *blake3::hash(&payload).as_bytes();
        Ok(Self {
            rows: rows.len() as u64,
            checksum,
            payload,
        })
    }

    pub fn len(&self) -> u64 {
        self.rows
    }

    pub fn verify_checksum(&self) -> bool {
        *blake3::hash(&self.payload).as_bytes() == self.checksum
    }

    pub fn rows<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        if !self.verify_checksum() {
            return Err(ArchiveError::CorruptFormat {
                reason: "table dataset checksum mismatch".into(),
            });
        }
        let (rows, _) =
            bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())?;
        Ok(rows)
    }
}

/// Dataset hanging off a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    Array(ArrayDataset),
    Table(TableDataset),
}

impl Dataset {
    pub fn as_array(&self) -> Option<&ArrayDataset> {
        match self {
            Dataset::Array(array) => Some(array),
            Dataset::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableDataset> {
        match self {
            Dataset::Table(table) => Some(table),
            Dataset::Array(_) => None,
        }
    }
}

/// One node of the archive tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    pub attrs: BTreeMap<String, AttrValue>,
    groups: Vec<(String, GroupNode)>,
    datasets: Vec<(String, Dataset)>,
}

impl GroupNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, name: &str) -> Option<&GroupNode> {
        self.groups
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut GroupNode> {
        self.groups
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    /// Insert a child group; `false` when the name is already taken.
    pub fn insert_group(&mut self, name: &str, node: GroupNode) -> bool {
        if self.group(name).is_some() {
            return false;
        }
        self.groups.push((name.to_string(), node));
        true
    }

    /// Fetch a child group, creating an empty one if absent.
    pub fn ensure_group(&mut self, name: &str) -> &mut GroupNode {
        if let Some(idx) = self.groups.iter().position(|(n, _)| n == name) {
            &mut self.groups[idx].1
        } else {
            self.groups.push((name.to_string(), GroupNode::new()));
            let last = self.groups.len() - 1;
            &mut self.groups[last].1
        }
    }

    /// Remove a child group and its whole subtree.
    pub fn remove_group(&mut self, name: &str) -> Option<GroupNode> {
        let idx = self.groups.iter().position(|(n, _)| n == name)?;
        Some(self.groups.remove(idx).1)
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &GroupNode)> {
        self.groups.iter().map(|(n, node)| (n.as_str(), node))
    }

    pub fn groups_mut(&mut self) -> impl Iterator<Item = (&str, &mut GroupNode)> {
        self.groups.iter_mut().map(|(n, node)| (n.as_str(), node))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ds)| ds)
    }

    /// Insert or replace a dataset.
    pub fn set_dataset(&mut self, name: &str, dataset: Dataset) {
        if let Some(idx) = self.datasets.iter().position(|(n, _)| n == name) {
            self.datasets[idx].1 = dataset;
        } else {
            self.datasets.push((name.to_string(), dataset));
        }
    }

    pub fn remove_dataset(&mut self, name: &str) -> Option<Dataset> {
        let idx = self.datasets.iter().position(|(n, _)| n == name)?;
        Some(self.datasets.remove(idx).1)
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn datasets(&self) -> impl Iterator<Item = (&str, &Dataset)> {
        self.datasets.iter().map(|(n, ds)| (n.as_str(), ds))
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: &str, value: AttrValue) {
        self.attrs.insert(name.to_string(), value);
    }
}

/// Encode the tree for the on-disk blob.
pub(crate) fn encode_tree(root: &GroupNode) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(root, bincode::config::standard())?)
}

/// Decode the on-disk blob back into the tree. Trailing bytes mean the blob
/// length in the header disagrees with the payload.
pub(crate) fn decode_tree(bytes: &[u8]) -> Result<GroupNode> {
    let (root, consumed): (GroupNode, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    if consumed != bytes.len() {
        return Err(ArchiveError::CorruptFormat {
            reason: format!(
                "tree blob has {} trailing bytes",
                bytes.len() - consumed
            ),
        });
    }
    Ok(root)
}

/// Serialize a metadata record into a group attribute map.
pub(crate) fn attr_map_from<T: Serialize>(record: &T) -> Result<BTreeMap<String, AttrValue>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), AttrValue::from_json(v)))
            .collect()),
        other => Err(ArchiveError::CorruptFormat {
            reason: format!("metadata record serialized to non-object {other:?}"),
        }),
    }
}

/// Deserialize a metadata record from a group attribute map.
pub(crate) fn attr_map_into<T: DeserializeOwned>(
    attrs: &BTreeMap<String, AttrValue>,
) -> Result<T> {
    let map: serde_json::Map<String, Value> = attrs
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    Ok(serde_json::from_value(Value::Object(map))?)
}
