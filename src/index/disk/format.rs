//! Index file prologue and header block.
//!
//! ```text
//! signature      str             SIGNATURE
//! header offset  i32             -1 until the header is written (empty index)
//! name chunks    ...             see names.rs
//! large arrays   ...             postings arrays of LARGE_ARRAY_SIZE or more
//! category tables ...            see table.rs
//! header         chunk count u32, last chunk size u8, reference width u8,
//!                chunk offsets u32*, start of categories u32,
//!                category count u32, (name str, offset u32, end u32)*
//! ```

use crate::error::{IndexError, Result};
use crate::index::types::{CHUNK_SIZE, SIGNATURE};
use crate::utils::encoding::{ByteReader, ByteWriter};
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Value of the header offset slot while no header exists
pub const EMPTY_HEADER_OFFSET: i32 = -1;

/// Byte range of one category table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryLocation {
    pub offset: u32,
    pub end: u32,
}

/// Everything needed to locate names and tables without reading them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub number_of_chunks: usize,
    pub size_of_last_chunk: usize,
    pub reference_width: u8,
    pub chunk_offsets: Vec<u32>,
    pub start_of_categories: u32,
    pub categories: BTreeMap<String, CategoryLocation>,
}

impl HeaderInfo {
    pub fn document_count(&self) -> usize {
        if self.number_of_chunks == 0 {
            0
        } else {
            (self.number_of_chunks - 1) * CHUNK_SIZE + self.size_of_last_chunk
        }
    }

    /// Number of names stored in `chunk`
    pub fn chunk_len(&self, chunk: usize) -> usize {
        if chunk + 1 == self.number_of_chunks {
            self.size_of_last_chunk
        } else {
            CHUNK_SIZE
        }
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut ByteWriter<W>) -> io::Result<()> {
        writer.write_u32(self.number_of_chunks as u32)?;
        writer.write_u8(self.size_of_last_chunk as u8)?;
        writer.write_u8(self.reference_width)?;
        for &offset in &self.chunk_offsets {
            writer.write_u32(offset)?;
        }
        writer.write_u32(self.start_of_categories)?;
        writer.write_u32(self.categories.len() as u32)?;
        for (name, location) in &self.categories {
            writer.write_str(name)?;
            writer.write_u32(location.offset)?;
            writer.write_u32(location.end)?;
        }
        Ok(())
    }

    fn read(reader: &mut ByteReader<'_>, file_len: usize) -> Result<Self> {
        let number_of_chunks = reader.read_u32()? as usize;
        let size_of_last_chunk = reader.read_u8()? as usize;
        let reference_width = reader.read_u8()?;

        if !matches!(reference_width, 1 | 2 | 4) {
            return Err(IndexError::format(format!(
                "invalid document reference width {}",
                reference_width
            )));
        }
        if number_of_chunks > 0 && !(1..=CHUNK_SIZE).contains(&size_of_last_chunk) {
            return Err(IndexError::format(format!(
                "invalid last chunk size {}",
                size_of_last_chunk
            )));
        }
        // Each chunk offset takes 4 bytes, so a huge count cannot be genuine
        if number_of_chunks > file_len / 4 {
            return Err(IndexError::format(format!(
                "chunk count {} exceeds file size",
                number_of_chunks
            )));
        }

        let mut chunk_offsets = Vec::with_capacity(number_of_chunks);
        for _ in 0..number_of_chunks {
            chunk_offsets.push(checked_offset(reader.read_u32()?, file_len)?);
        }
        let start_of_categories = checked_offset(reader.read_u32()?, file_len)?;

        let category_count = reader.read_u32()?;
        let mut categories = BTreeMap::new();
        for _ in 0..category_count {
            let name = reader.read_str()?.to_string();
            let offset = checked_offset(reader.read_u32()?, file_len)?;
            let end = checked_offset(reader.read_u32()?, file_len)?;
            if end < offset {
                return Err(IndexError::format(format!(
                    "category {:?} ends before it starts",
                    name
                )));
            }
            categories.insert(name, CategoryLocation { offset, end });
        }

        Ok(Self {
            number_of_chunks,
            size_of_last_chunk,
            reference_width,
            chunk_offsets,
            start_of_categories,
            categories,
        })
    }
}

fn checked_offset(offset: u32, file_len: usize) -> Result<u32> {
    if offset as usize > file_len {
        return Err(IndexError::format(format!(
            "offset {} beyond end of file ({} bytes)",
            offset, file_len
        )));
    }
    Ok(offset)
}

/// Write the signature and a placeholder header offset. Returns the
/// position of the placeholder so it can be patched later.
pub(crate) fn write_prologue<W: Write>(writer: &mut ByteWriter<W>) -> io::Result<u64> {
    writer.write_str(SIGNATURE)?;
    let slot = writer.position();
    writer.write_i32(EMPTY_HEADER_OFFSET)?;
    Ok(slot)
}

/// Validate the signature and parse the header of a whole file image.
/// `Ok(None)` means the file holds an empty index.
pub fn read_header(data: &[u8]) -> Result<Option<HeaderInfo>> {
    let mut reader = ByteReader::new(data);

    let signature = reader.read_str().map_err(|_| signature_error(data))?;
    if signature != SIGNATURE {
        return Err(IndexError::Signature {
            expected: SIGNATURE.to_string(),
            found: signature.to_string(),
        });
    }

    let header_offset = reader.read_i32()?;
    if header_offset == EMPTY_HEADER_OFFSET {
        return Ok(None);
    }
    if header_offset < 0 || (header_offset as usize) < reader.position() {
        return Err(IndexError::format(format!(
            "invalid header offset {}",
            header_offset
        )));
    }

    let mut reader = ByteReader::at(data, header_offset as usize)?;
    HeaderInfo::read(&mut reader, data.len()).map(Some)
}

fn signature_error(data: &[u8]) -> IndexError {
    let shown = &data[..data.len().min(32)];
    IndexError::Signature {
        expected: SIGNATURE.to_string(),
        found: String::from_utf8_lossy(shown).into_owned(),
    }
}
