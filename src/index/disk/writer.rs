use super::format::{write_prologue, HeaderInfo};
use super::names::write_chunk;
use super::table::write_category_table;
use crate::index::types::{DocNumber, CHUNK_SIZE};
use crate::utils::encoding::{reference_width, ByteWriter};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Streams a complete index file: prologue, name chunks, category tables and
/// finally the header, whose offset is patched into the prologue slot.
pub(crate) struct IndexFileWriter {
    writer: ByteWriter<BufWriter<File>>,
    header_slot: u64,
    header: HeaderInfo,
    has_documents: bool,
}

impl IndexFileWriter {
    pub(crate) fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = ByteWriter::new(BufWriter::with_capacity(65536, file));
        let header_slot = write_prologue(&mut writer)?;

        Ok(Self {
            writer,
            header_slot,
            header: HeaderInfo {
                number_of_chunks: 0,
                size_of_last_chunk: 0,
                reference_width: 1,
                chunk_offsets: Vec::new(),
                start_of_categories: 0,
                categories: BTreeMap::new(),
            },
            has_documents: false,
        })
    }

    /// Write the sorted document names. Must be called once, before any category.
    pub(crate) fn write_document_names(&mut self, names: &[String]) -> io::Result<()> {
        for chunk in names.chunks(CHUNK_SIZE) {
            self.header.chunk_offsets.push(self.writer.offset()?);
            write_chunk(&mut self.writer, chunk)?;
        }

        self.header.number_of_chunks = self.header.chunk_offsets.len();
        self.header.size_of_last_chunk = match names.len() % CHUNK_SIZE {
            0 if !names.is_empty() => CHUNK_SIZE,
            n => n,
        };
        self.header.reference_width = reference_width(names.len());
        self.header.start_of_categories = self.writer.offset()?;
        self.has_documents = !names.is_empty();
        Ok(())
    }

    pub(crate) fn write_category(
        &mut self,
        category: &str,
        table: &BTreeMap<String, Vec<DocNumber>>,
    ) -> io::Result<()> {
        if table.is_empty() {
            return Ok(());
        }
        let location =
            write_category_table(&mut self.writer, table, self.header.reference_width)?;
        self.header.categories.insert(category.to_string(), location);
        Ok(())
    }

    /// Write the header, patch its offset into the prologue and flush.
    /// A file without documents keeps the empty-index marker.
    pub(crate) fn finish(mut self, sync: bool) -> io::Result<()> {
        let header_offset = if self.has_documents {
            let offset = self.writer.offset()?;
            self.header.write(&mut self.writer)?;
            Some(i32::try_from(offset).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "index header beyond 2 GiB")
            })?)
        } else {
            None
        };

        self.writer.flush()?;
        let mut file = self
            .writer
            .into_inner()
            .into_inner()
            .map_err(|e| e.into_error())?;

        if let Some(offset) = header_offset {
            file.seek(SeekFrom::Start(self.header_slot))?;
            file.write_all(&offset.to_le_bytes())?;
        }
        if sync {
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Sibling path a new snapshot is written to before it replaces `path`
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Move a finished file over `target`
pub(crate) fn replace_file(temp: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(temp, target) {
        Ok(()) => Ok(()),
        // Platforms that refuse to rename over an existing file
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
            ) && target.exists() =>
        {
            fs::remove_file(target)?;
            fs::rename(temp, target)
        }
        Err(error) => Err(error),
    }
}

/// Clean up after a failed write. The temp file is only removed while
/// `target` still exists; otherwise it is the sole remaining copy.
pub(crate) fn discard_temp(temp: &Path, target: &Path) {
    if !target.exists() {
        if temp.exists() {
            warn!(
                path = %temp.display(),
                target = %target.display(),
                "keeping temporary index file, target is missing"
            );
        }
        return;
    }
    if let Err(error) = fs::remove_file(temp) {
        if error.kind() != io::ErrorKind::NotFound {
            warn!(path = %temp.display(), %error, "could not remove temporary index file");
        }
    }
}

/// Write an index holding no documents
pub(crate) fn write_empty(path: &Path, sync: bool) -> io::Result<()> {
    let temp = temp_path_for(path);
    let result = IndexFileWriter::create(&temp)
        .and_then(|writer| writer.finish(sync))
        .and_then(|()| replace_file(&temp, path));
    if result.is_err() {
        discard_temp(&temp, path);
    }
    result
}
