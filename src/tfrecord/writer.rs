//! Batching, compression and output files.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use prost::Message;
use rayon::prelude::*;

use crate::error::{ConversionError, ConversionResult};
use crate::types::Record;

use super::frame::{write_frame, FrameReader};
use super::proto::{record_from_example, Example};

/// Extension of every output file.
pub const TFRECORD_EXTENSION: &str = "tfrecord";

/// Whole-stream compression applied to a TFRecord file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    Gzip,
    Zlib,
    None,
}

impl FromStr for CompressionType {
    type Err = ConversionError;

    /// Accepts `GZIP`, `ZLIB`, `NONE` and the empty string (= `NONE`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GZIP" => Ok(Self::Gzip),
            "ZLIB" => Ok(Self::Zlib),
            "" | "NONE" => Ok(Self::None),
            _ => Err(ConversionError::config(format!(
                "invalid compression type '{s}'; expected one of: GZIP, ZLIB, \"\" (empty string)"
            ))),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gzip => f.write_str("GZIP"),
            Self::Zlib => f.write_str("ZLIB"),
            Self::None => f.write_str("NONE"),
        }
    }
}

enum CompressedWriter<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Zlib(ZlibEncoder<W>),
}

impl<W: Write> CompressedWriter<W> {
    fn new(inner: W, compression: CompressionType) -> Self {
        match compression {
            CompressionType::Gzip => Self::Gzip(GzEncoder::new(inner, Compression::default())),
            CompressionType::Zlib => Self::Zlib(ZlibEncoder::new(inner, Compression::default())),
            CompressionType::None => Self::Plain(inner),
        }
    }

    fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(w) => Ok(w),
            Self::Gzip(enc) => enc.finish(),
            Self::Zlib(enc) => enc.finish(),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(enc) => enc.write(buf),
            Self::Zlib(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(enc) => enc.flush(),
            Self::Zlib(enc) => enc.flush(),
        }
    }
}

fn write_records<W: Write>(inner: W, batch: &[Record], compression: CompressionType) -> io::Result<W> {
    let mut out = CompressedWriter::new(inner, compression);
    for record in batch {
        write_frame(&mut out, &Example::from(record).encode_to_vec())?;
    }
    out.finish()
}

/// Serialize a batch into TFRecord bytes: one frame per record, the whole stream compressed.
pub fn serialize(batch: &[Record], compression: CompressionType) -> ConversionResult<Vec<u8>> {
    Ok(write_records(Vec::new(), batch, compression)?)
}

/// Inverse of [`serialize`].
pub fn deserialize(bytes: &[u8], compression: CompressionType) -> ConversionResult<Vec<Record>> {
    read_records(bytes, compression)
}

/// Read every record from a (possibly compressed) TFRecord stream.
pub fn read_records<R: Read>(reader: R, compression: CompressionType) -> ConversionResult<Vec<Record>> {
    let reader: Box<dyn Read + '_> = match compression {
        CompressionType::Gzip => Box::new(GzDecoder::new(reader)),
        CompressionType::Zlib => Box::new(ZlibDecoder::new(reader)),
        CompressionType::None => Box::new(reader),
    };

    let mut frames = FrameReader::new(reader);
    let mut records = Vec::new();
    loop {
        let offset = frames.offset();
        match frames.next() {
            Some(frame) => {
                let example = Example::decode(frame?.as_slice())?;
                records.push(record_from_example(example, offset)?);
            }
            None => break,
        }
    }
    Ok(records)
}

/// Read every record from a TFRecord file on disk.
pub fn read_records_from_path(path: impl AsRef<Path>, compression: CompressionType) -> ConversionResult<Vec<Record>> {
    read_records(BufReader::new(File::open(path)?), compression)
}

/// Split `items` into consecutive batches of `batch_size` (the last one may be shorter).
///
/// # Panics
///
/// Panics if `batch_size == 0`.
pub fn batch_of<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    assert!(batch_size > 0, "batch_size must be > 0");
    items.chunks(batch_size).collect()
}

/// `<name>.<index, zero-padded to 4 digits>.tfrecord`
pub fn output_file_name(dataset_name: &str, index: usize) -> String {
    format!("{dataset_name}.{index:04}.{TFRECORD_EXTENSION}")
}

/// Glob matching every output file of `dataset_name` inside `dir`.
pub fn output_file_pattern(dir: &Path, dataset_name: &str) -> String {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let name = glob::Pattern::escape(dataset_name);
    if escaped.is_empty() {
        format!("{name}.*.{TFRECORD_EXTENSION}")
    } else {
        format!("{}/{name}.*.{TFRECORD_EXTENSION}", escaped.trim_end_matches('/'))
    }
}

/// Write `batch` to `path`, replacing any existing file.
pub fn write_batch_file(path: impl AsRef<Path>, batch: &[Record], compression: CompressionType) -> ConversionResult<()> {
    let file = BufWriter::new(File::create(path)?);
    let mut file = write_records(file, batch, compression)?;
    file.flush()?;
    Ok(())
}

/// One written output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBatch {
    pub index: usize,
    pub path: PathBuf,
    pub records: usize,
}

/// Batch `records` and write one file per batch into `dir`.
///
/// The directory is created if needed. File indices are assigned from batch order, so names
/// never collide and batches can be written in parallel (on the current rayon pool). Returns the
/// written files in index order.
pub fn write_batches(
    records: &[Record],
    dir: &Path,
    dataset_name: &str,
    batch_size: usize,
    compression: CompressionType,
) -> ConversionResult<Vec<WrittenBatch>> {
    std::fs::create_dir_all(dir)?;
    batch_of(records, batch_size)
        .into_par_iter()
        .enumerate()
        .map(|(index, batch)| {
            let path = dir.join(output_file_name(dataset_name, index));
            write_batch_file(&path, batch, compression)?;
            tracing::debug!(path = %path.display(), records = batch.len(), "wrote batch");
            Ok(WrittenBatch {
                index,
                path,
                records: batch.len(),
            })
        })
        .collect()
}
