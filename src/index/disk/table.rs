//! Per-category word -> postings tables.
//!
//! A table is a word count followed by `(word, value)` entries where `value`
//! is an i32:
//! - `value <= 0`: a single posting, document number `-value`
//! - `0 < value < LARGE_ARRAY_SIZE`: `value` document numbers follow inline
//! - `value == LARGE_ARRAY_SIZE`: a u32 file offset follows, pointing at a
//!   `(len u32, numbers)` array written before the table
//!
//! Document numbers use the file's reference width.

use super::format::{CategoryLocation, HeaderInfo};
use crate::error::{IndexError, Result};
use crate::index::types::{DocNumber, LARGE_ARRAY_SIZE};
use crate::utils::encoding::{ByteReader, ByteWriter};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Postings of one word as loaded from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postings {
    Numbers(Vec<DocNumber>),
    /// Large array left on disk, resolved on demand
    Deferred(u32),
}

/// One category's word table
#[derive(Debug, Default)]
pub struct CategoryTable {
    words: FxHashMap<String, Postings>,
}

impl CategoryTable {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<&Postings> {
        self.words.get(word)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Postings)> {
        self.words.iter().map(|(w, p)| (w.as_str(), p))
    }

    /// True if any large array is still on disk
    pub fn has_deferred(&self) -> bool {
        self.words
            .values()
            .any(|p| matches!(p, Postings::Deferred(_)))
    }
}

/// Write one category: its large arrays first, then the table itself.
/// Words must map to non-empty, sorted postings.
pub(crate) fn write_category_table<W: Write>(
    writer: &mut ByteWriter<W>,
    table: &BTreeMap<String, Vec<DocNumber>>,
    width: u8,
) -> io::Result<CategoryLocation> {
    let mut large_offsets: FxHashMap<&str, u32> = FxHashMap::default();
    for (word, numbers) in table {
        if numbers.len() >= LARGE_ARRAY_SIZE {
            large_offsets.insert(word.as_str(), writer.offset()?);
            write_document_numbers(writer, numbers, width)?;
        }
    }

    let offset = writer.offset()?;
    writer.write_u32(table.len() as u32)?;
    for (word, numbers) in table {
        writer.write_str(word)?;
        if let Some(&array_offset) = large_offsets.get(word.as_str()) {
            writer.write_i32(LARGE_ARRAY_SIZE as i32)?;
            writer.write_u32(array_offset)?;
        } else if let [single] = numbers.as_slice() {
            writer.write_i32(-(*single as i32))?;
        } else {
            writer.write_i32(numbers.len() as i32)?;
            for &number in numbers {
                writer.write_doc_number(number, width)?;
            }
        }
    }

    Ok(CategoryLocation {
        offset,
        end: writer.offset()?,
    })
}

fn write_document_numbers<W: Write>(
    writer: &mut ByteWriter<W>,
    numbers: &[DocNumber],
    width: u8,
) -> io::Result<()> {
    writer.write_u32(numbers.len() as u32)?;
    for &number in numbers {
        writer.write_doc_number(number, width)?;
    }
    Ok(())
}

/// Read one category table. With `resolve_large` every large array is read
/// immediately, otherwise it stays [`Postings::Deferred`].
pub(crate) fn read_category_table(
    data: &[u8],
    header: &HeaderInfo,
    location: CategoryLocation,
    resolve_large: bool,
) -> Result<CategoryTable> {
    let mut reader = ByteReader::at(data, location.offset as usize)?;
    let width = header.reference_width;
    let document_count = header.document_count();

    let count = reader.read_u32()? as usize;
    // Smallest entry: 1 byte word length + 4 byte value
    if count > (location.end - location.offset) as usize / 5 {
        return Err(IndexError::format(format!(
            "category table claims {} words in {} bytes",
            count,
            location.end - location.offset
        )));
    }

    let mut words = FxHashMap::with_capacity_and_hasher(count, Default::default());
    for _ in 0..count {
        let word = reader.read_str()?.to_string();
        let value = reader.read_i32()?;

        let postings = if value <= 0 {
            let number = value.unsigned_abs();
            check_number(number, document_count)?;
            Postings::Numbers(vec![number])
        } else if (value as usize) < LARGE_ARRAY_SIZE {
            let mut numbers = Vec::with_capacity(value as usize);
            for _ in 0..value {
                let number = reader.read_doc_number(width)?;
                check_number(number, document_count)?;
                numbers.push(number);
            }
            Postings::Numbers(numbers)
        } else if value as usize == LARGE_ARRAY_SIZE {
            let offset = reader.read_u32()?;
            if resolve_large {
                Postings::Numbers(read_document_numbers(data, header, offset)?)
            } else {
                Postings::Deferred(offset)
            }
        } else {
            return Err(IndexError::format(format!(
                "invalid postings value {} for word {:?}",
                value, word
            )));
        };

        words.insert(word, postings);
    }

    if reader.position() > location.end as usize {
        return Err(IndexError::format(format!(
            "category table overruns its end at offset {}",
            location.end
        )));
    }

    Ok(CategoryTable { words })
}

/// Read a large postings array written ahead of a table
pub(crate) fn read_document_numbers(
    data: &[u8],
    header: &HeaderInfo,
    offset: u32,
) -> Result<Vec<DocNumber>> {
    let mut reader = ByteReader::at(data, offset as usize)?;
    let width = header.reference_width;
    let document_count = header.document_count();

    let len = reader.read_u32()? as usize;
    let available = data.len() - reader.position();
    if len.saturating_mul(width as usize) > available {
        return Err(IndexError::format(format!(
            "postings array of {} entries at offset {} exceeds file size",
            len, offset
        )));
    }

    let mut numbers = Vec::with_capacity(len);
    for _ in 0..len {
        let number = reader.read_doc_number(width)?;
        check_number(number, document_count)?;
        numbers.push(number);
    }
    Ok(numbers)
}

fn check_number(number: DocNumber, document_count: usize) -> Result<()> {
    if number as usize >= document_count {
        return Err(IndexError::format(format!(
            "document number {} out of range ({} documents)",
            number, document_count
        )));
    }
    Ok(())
}
