//! Core data model types.
//!
//! Conversion is driven by a user-provided [`Schema`] (an ordered list of typed [`Column`]s).
//! Each raw [`Row`] is turned into a [`Record`]: a map from column name to encoded [`Feature`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConversionError;

/// Logical type of a column, as declared in the metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum FeatureType {
    /// UTF-8 text, stored as bytes.
    String,
    /// Raw bytes.
    Bytes,
    /// 64-bit float (stored as a 32-bit `FloatList` on the wire).
    Float,
    /// 64-bit signed integer.
    Int,
    /// Boolean, stored as `0`/`1` in an `Int64List`.
    Bool,
}

impl FeatureType {
    /// Metadata token for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "str",
            Self::Bytes => "bytes",
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "str" | "string" => Ok(Self::String),
            "bytes" => Ok(Self::Bytes),
            "float" => Ok(Self::Float),
            "int" => Ok(Self::Int),
            "bool" => Ok(Self::Bool),
            _ => Err(ConversionError::schema(format!(
                "unknown feature_type '{s}' (expected one of: str, bytes, float, int, bool)"
            ))),
        }
    }
}

impl TryFrom<String> for FeatureType {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Input file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Comma-separated values.
    Csv,
    /// Tab-separated values.
    Tsv,
}

impl FileType {
    /// Field delimiter for this layout.
    pub fn delimiter(self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }
}

impl FromStr for FileType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            _ => Err(ConversionError::config(format!(
                "file_type can only be 'csv' or 'tsv', got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Tsv => f.write_str("tsv"),
        }
    }
}

/// A single named, typed column in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Column {
    /// Column name; becomes the feature key in every [`Record`].
    pub name: String,
    /// Column type.
    pub feature_type: FeatureType,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, feature_type: FeatureType) -> Self {
        Self {
            name: name.into(),
            feature_type,
        }
    }
}

/// Dataset description: where rows come from, where records go, and how rows are typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Dataset name; prefix of every output file.
    pub dataset_name: String,
    /// Glob pattern matching the input files.
    pub source_path_pattern: String,
    /// Output directory. Always ends with a path separator.
    pub destination_path: String,
    /// Input layout.
    pub file_type: FileType,
    /// Whether the first line of every input file is a header.
    pub skip_header: bool,
    /// Ordered columns; position `i` maps to field `i` of each row.
    pub columns: Vec<Column>,
}

impl Schema {
    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Output directory as a path.
    pub fn destination_dir(&self) -> &Path {
        Path::new(&self.destination_path)
    }
}

/// Raw fields of one input line.
pub type Row = Vec<String>;

/// An encoded, single-column value.
///
/// Mirrors the `kind` oneof of `tf.train.Feature`: exactly one list is ever populated.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    /// `BytesList`.
    Bytes(Vec<Vec<u8>>),
    /// `FloatList`.
    Floats(Vec<f64>),
    /// `Int64List`.
    Int64s(Vec<i64>),
}

impl Feature {
    /// Single-valued bytes feature.
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(vec![value.into()])
    }

    /// Single-valued float feature.
    pub fn float(value: f64) -> Self {
        Self::Floats(vec![value])
    }

    /// Single-valued int64 feature.
    pub fn int64(value: i64) -> Self {
        Self::Int64s(vec![value])
    }

    /// Number of values in the populated list.
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(v) => v.len(),
            Self::Floats(v) => v.len(),
            Self::Int64s(v) => v.len(),
        }
    }

    /// Whether the populated list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encoded features of one input row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    features: BTreeMap<String, Feature>,
}

impl Record {
    /// Create a record from a feature map.
    pub fn new(features: BTreeMap<String, Feature>) -> Self {
        Self { features }
    }

    /// Feature stored under `name`, if present.
    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }

    /// Insert (or replace) a feature.
    pub fn insert(&mut self, name: impl Into<String>, feature: Feature) {
        self.features.insert(name.into(), feature);
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the record has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    /// Iterate `(name, feature)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Consume the record, returning its feature map.
    pub fn into_features(self) -> BTreeMap<String, Feature> {
        self.features
    }
}

impl FromIterator<(String, Feature)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Feature)>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}
