//! Binary codec for the index file format.
//!
//! All fixed-width integers are little-endian. Strings are UTF-8 prefixed with
//! their byte length as a varint. Document numbers are written with a per-file
//! width picked by [`reference_width`].

use crate::error::{IndexError, Result};
use std::io::{self, Write};

/// Encode a u32 as a variable-length integer
pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varint(buf: &[u8]) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 32 {
            return None; // Overflow
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Number of bytes used to store one document number, given the total
/// document count of the file: `<= 127` -> 1, `<= 32767` -> 2, otherwise 4.
pub fn reference_width(document_count: usize) -> u8 {
    if document_count <= 0x7F {
        1
    } else if document_count <= 0x7FFF {
        2
    } else {
        4
    }
}

/// Output stream that tracks its absolute position, so offsets of already
/// written blocks can be recorded in later blocks.
pub struct ByteWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Absolute position of the next byte
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Position as a 4-byte file offset
    pub fn offset(&self) -> io::Result<u32> {
        u32::try_from(self.position).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "index file exceeds 4 GiB")
        })
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> io::Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_varint(&mut self, value: u32) -> io::Result<()> {
        let mut buf = Vec::with_capacity(5);
        encode_varint(value, &mut buf);
        self.write_bytes(&buf)
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_str(&mut self, value: &str) -> io::Result<()> {
        let len = u32::try_from(value.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "string longer than 4 GiB")
        })?;
        self.write_varint(len)?;
        self.write_bytes(value.as_bytes())
    }

    /// Write a document number using `width` bytes (1, 2 or 4)
    pub fn write_doc_number(&mut self, number: u32, width: u8) -> io::Result<()> {
        match width {
            1 => self.write_u8(number as u8),
            2 => self.write_u16(number as u16),
            _ => self.write_u32(number),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Cursor over an in-memory (usually memory-mapped) index image.
/// Running past the end is reported as a format error, never a panic.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor positioned at an absolute offset
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        if offset > data.len() {
            return Err(IndexError::format(format!(
                "offset {} beyond end of file ({} bytes)",
                offset,
                data.len()
            )));
        }
        Ok(Self { data, pos: offset })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(IndexError::format(format!(
                "unexpected end of data at offset {} (needed {} bytes)",
                self.pos, len
            ))),
        }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_varint(&mut self) -> Result<u32> {
        let rest = &self.data[self.pos..];
        match decode_varint(rest) {
            Some((value, consumed)) => {
                self.pos += consumed;
                Ok(value)
            }
            None => Err(IndexError::format(format!(
                "malformed varint at offset {}",
                self.pos
            ))),
        }
    }

    pub fn read_str(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let len = self.read_varint()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| {
            IndexError::format(format!("invalid UTF-8 string at offset {}", start))
        })
    }

    pub fn read_doc_number(&mut self, width: u8) -> Result<u32> {
        match width {
            1 => Ok(self.read_u8()? as u32),
            2 => Ok(self.read_u16()? as u32),
            4 => self.read_u32(),
            other => Err(IndexError::format(format!(
                "invalid document reference width {}",
                other
            ))),
        }
    }
}
