//! `tf.train.Example` protobuf messages.
//!
//! Hand-declared with `prost` derives so no `protoc` build step is needed. Field numbers match
//! `tensorflow/core/example/{example,feature}.proto`.

use std::collections::BTreeMap;

use crate::error::{ConversionError, ConversionResult};
use crate::types::{Feature as RecordFeature, Record};

#[derive(Clone, PartialEq, prost::Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Features {
    #[prost(btree_map = "string, message", tag = "1")]
    pub feature: BTreeMap<String, Feature>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Feature {
    #[prost(oneof = "Kind", tags = "1, 2, 3")]
    pub kind: Option<Kind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum Kind {
    #[prost(message, tag = "1")]
    BytesList(BytesList),
    #[prost(message, tag = "2")]
    FloatList(FloatList),
    #[prost(message, tag = "3")]
    Int64List(Int64List),
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

impl From<&RecordFeature> for Feature {
    fn from(feature: &RecordFeature) -> Self {
        let kind = match feature {
            RecordFeature::Bytes(v) => Kind::BytesList(BytesList { value: v.clone() }),
            // FloatList is single precision on the wire.
            RecordFeature::Floats(v) => Kind::FloatList(FloatList {
                value: v.iter().map(|&x| x as f32).collect(),
            }),
            RecordFeature::Int64s(v) => Kind::Int64List(Int64List { value: v.clone() }),
        };
        Self { kind: Some(kind) }
    }
}

impl From<&Record> for Example {
    fn from(record: &Record) -> Self {
        let feature = record
            .iter()
            .map(|(name, f)| (name.to_owned(), Feature::from(f)))
            .collect();
        Self {
            features: Some(Features { feature }),
        }
    }
}

/// Convert a decoded example back into a [`Record`].
///
/// `offset` is the byte offset of the frame, used in errors.
pub fn record_from_example(example: Example, offset: u64) -> ConversionResult<Record> {
    let features = example.features.unwrap_or_default();
    features
        .feature
        .into_iter()
        .map(|(name, feature)| {
            let decoded = match feature.kind {
                Some(Kind::BytesList(l)) => RecordFeature::Bytes(l.value),
                Some(Kind::FloatList(l)) => {
                    RecordFeature::Floats(l.value.into_iter().map(f64::from).collect())
                }
                Some(Kind::Int64List(l)) => RecordFeature::Int64s(l.value),
                None => {
                    return Err(ConversionError::CorruptFrame {
                        offset,
                        message: format!("feature '{name}' has no value list"),
                    });
                }
            };
            Ok((name, decoded))
        })
        .collect()
}
