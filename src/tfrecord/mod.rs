//! TFRecord output: `tf.train.Example` messages in CRC-protected frames, optionally compressed.
//!
//! - [`proto`]: protobuf message types and [`crate::types::Record`] conversion
//! - [`frame`]: length + checksum framing and a streaming [`frame::FrameReader`]
//! - [`writer`]: [`serialize`]/[`deserialize`], batching and output files
//!
//! ## Example
//!
//! ```rust
//! use tfrecord_converter::tfrecord::{deserialize, serialize, CompressionType};
//! use tfrecord_converter::types::{Feature, Record};
//!
//! let record: Record = [("id".to_string(), Feature::int64(7))].into_iter().collect();
//! let bytes = serialize(&[record.clone()], CompressionType::Gzip).unwrap();
//! assert_eq!(deserialize(&bytes, CompressionType::Gzip).unwrap(), vec![record]);
//! ```

pub mod frame;
pub mod proto;
pub mod writer;

pub use writer::{
    batch_of, deserialize, output_file_name, output_file_pattern, read_records, read_records_from_path,
    serialize, write_batch_file, write_batches, CompressionType, WrittenBatch, TFRECORD_EXTENSION,
};
