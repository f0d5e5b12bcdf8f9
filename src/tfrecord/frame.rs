//! TFRecord framing.
//!
//! Each frame is:
//!
//! ```text
//! u64 LE  length
//! u32 LE  masked_crc32c(length bytes)
//! [u8]    data
//! u32 LE  masked_crc32c(data)
//! ```
//!
//! Frames are self-delimiting, so a file can be read sequentially without an index.

use std::io::{self, Read, Write};

use crate::error::{ConversionError, ConversionResult};

const MASK_DELTA: u32 = 0xa282_ead8;
const HEADER_LEN: usize = 12;
const FOOTER_LEN: usize = 4;

/// CRC32C of `data`, rotated and offset the way TFRecord stores it.
pub fn masked_crc(data: &[u8]) -> u32 {
    crc32c::crc32c(data).rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Write one frame wrapping `data`.
pub fn write_frame<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    let len = (data.len() as u64).to_le_bytes();
    w.write_all(&len)?;
    w.write_all(&masked_crc(&len).to_le_bytes())?;
    w.write_all(data)?;
    w.write_all(&masked_crc(data).to_le_bytes())
}

/// Streaming iterator over frame payloads.
///
/// Both checksums are verified. After the first error the iterator is exhausted.
pub struct FrameReader<R> {
    inner: R,
    offset: u64,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
        }
    }

    /// Byte offset of the next frame.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_header(&mut self) -> ConversionResult<Option<[u8; HEADER_LEN]>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(self.corrupt("truncated frame header")),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(header))
    }

    fn read_frame(&mut self) -> ConversionResult<Option<Vec<u8>>> {
        let Some(header) = self.read_header()? else {
            return Ok(None);
        };
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&header[..8]);
        let mut len_crc = [0u8; 4];
        len_crc.copy_from_slice(&header[8..]);
        if masked_crc(&len_bytes) != u32::from_le_bytes(len_crc) {
            return Err(self.corrupt("length checksum mismatch"));
        }
        let len = u64::from_le_bytes(len_bytes);
        let len = usize::try_from(len).map_err(|_| self.corrupt("frame length overflows usize"))?;

        let mut data = vec![0u8; len];
        self.read_body(&mut data)?;
        let mut footer = [0u8; FOOTER_LEN];
        self.read_body(&mut footer)?;
        if masked_crc(&data) != u32::from_le_bytes(footer) {
            return Err(self.corrupt("data checksum mismatch"));
        }

        self.offset += (HEADER_LEN + len + FOOTER_LEN) as u64;
        Ok(Some(data))
    }

    fn read_body(&mut self, buf: &mut [u8]) -> ConversionResult<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                self.corrupt("truncated frame body")
            } else {
                e.into()
            }
        })
    }

    fn corrupt(&self, message: &str) -> ConversionError {
        ConversionError::CorruptFrame {
            offset: self.offset,
            message: message.to_string(),
        }
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = ConversionResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(data)) => Some(Ok(data)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
