//! Front/back compression of sorted document names.
//!
//! The first name of a chunk is stored literally. Every following name is
//! stored as `(prefix_len: u8, suffix_len: u8, middle: str)` relative to the
//! previous name, where the prefix and suffix are the characters it shares
//! with that name. Both lengths are clipped at 255; longer shared runs are
//! simply written out in the middle part.

use crate::error::{IndexError, Result};
use crate::utils::encoding::{ByteReader, ByteWriter};
use std::io::{self, Write};

const MAX_SHARED: usize = u8::MAX as usize;

/// Write one chunk of sorted names
pub fn write_chunk<W: Write>(writer: &mut ByteWriter<W>, names: &[String]) -> io::Result<()> {
    let Some((first, rest)) = names.split_first() else {
        return Ok(());
    };
    writer.write_str(first)?;

    let mut prev: Vec<char> = first.chars().collect();
    for name in rest {
        let current: Vec<char> = name.chars().collect();
        let (prefix, suffix) = shared_lengths(&prev, &current);

        writer.write_u8(prefix as u8)?;
        writer.write_u8(suffix as u8)?;
        let middle: String = current[prefix..current.len() - suffix].iter().collect();
        writer.write_str(&middle)?;

        prev = current;
    }
    Ok(())
}

/// Read `count` names written by [`write_chunk`]
pub fn read_chunk(reader: &mut ByteReader<'_>, count: usize) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(count);
    if count == 0 {
        return Ok(names);
    }

    let first = reader.read_str()?;
    let mut prev: Vec<char> = first.chars().collect();
    names.push(first.to_string());

    for _ in 1..count {
        let prefix = reader.read_u8()? as usize;
        let suffix = reader.read_u8()? as usize;
        let middle = reader.read_str()?;

        if prefix + suffix > prev.len() {
            return Err(IndexError::format(format!(
                "name chunk shares {}+{} characters with a {} character name",
                prefix,
                suffix,
                prev.len()
            )));
        }

        let mut current = Vec::with_capacity(prefix + middle.len() + suffix);
        current.extend_from_slice(&prev[..prefix]);
        current.extend(middle.chars());
        current.extend_from_slice(&prev[prev.len() - suffix..]);

        names.push(current.iter().collect());
        prev = current;
    }

    Ok(names)
}

/// Shared leading and trailing character counts, never overlapping in
/// either name and each clipped to 255
fn shared_lengths(prev: &[char], current: &[char]) -> (usize, usize) {
    let max_shared = prev.len().min(current.len());

    let mut prefix = 0;
    while prefix < max_shared && prefix < MAX_SHARED && prev[prefix] == current[prefix] {
        prefix += 1;
    }

    let max_suffix = (max_shared - prefix).min(MAX_SHARED);
    let mut suffix = 0;
    while suffix < max_suffix
        && prev[prev.len() - 1 - suffix] == current[current.len() - 1 - suffix]
    {
        suffix += 1;
    }

    (prefix, suffix)
}
