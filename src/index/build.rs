use crate::index::facade::Index;
use crate::indexer::{FileDocument, Indexer, IndexerOutput, SourceIndexer};
use crate::utils::AppConfig;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Files extracted in parallel before their words are handed to the index
const BATCH_SIZE: usize = 1000;

/// How a source tree is indexed
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Only index files whose relative path matches one of these globs
    pub include: Vec<String>,
    /// Discard the existing index first
    pub force: bool,
    /// No progress output
    pub silent: bool,
}

/// Outcome of [`build_index`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Files re-supplied to the index
    pub indexed: usize,
    /// Indexed documents whose file no longer exists
    pub removed: usize,
    /// Files that could not be read
    pub errors: usize,
    /// Documents in the index after saving
    pub documents: usize,
}

/// A file found by the walk, named by its `/`-separated relative path
struct SourceFile {
    name: String,
    path: PathBuf,
}

/// Index every source file below `root` into `index_file`, then drop
/// documents whose files have disappeared and save.
pub fn build_index(
    root: &Path,
    index_file: &Path,
    options: &BuildOptions,
    config: &AppConfig,
) -> Result<BuildSummary> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Invalid path {}", root.display()))?;
    let mut index = open_for_build(index_file, options.force, config)?;

    if !options.silent {
        println!("Indexing: {}", root.display());
    }

    let spinner = (!options.silent)
        .then(|| discovery_spinner("Discovering files..."))
        .transpose()?;
    let include = build_globset(&options.include)?;
    let files = collect_files(&root, index_file, include.as_ref(), config);
    if let Some(spinner) = spinner {
        spinner.finish_with_message(format!("Found {} files", files.len()));
    }

    let mut summary = BuildSummary::default();

    // Everything on disk that the walk no longer finds is gone
    let present: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
    for name in index.snapshot().read_all_document_names()? {
        if !present.contains(name.as_str()) {
            index.remove(&name);
            summary.removed += 1;
        }
    }

    let progress = if options.silent {
        None
    } else {
        Some(progress_bar(files.len() as u64)?)
    };
    let indexer = SourceIndexer::new(config.max_file_size);

    for batch in files.chunks(BATCH_SIZE) {
        let extracted: Vec<(&str, crate::Result<IndexerOutput>)> = batch
            .par_iter()
            .map(|file| {
                let document = FileDocument::new(file.name.clone(), &file.path);
                let mut output = IndexerOutput::new();
                let result = indexer.index(&document, &mut output).map(|()| output);
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                (file.name.as_str(), result)
            })
            .collect();

        for (name, result) in extracted {
            match result {
                Ok(output) => {
                    index.add_output(name, &output)?;
                    summary.indexed += 1;
                }
                Err(error) => {
                    warn!(document = name, %error, "skipping unreadable file");
                    summary.errors += 1;
                }
            }
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Processed {} files", summary.indexed));
    }

    index.save().context("Failed to save index")?;
    summary.documents = index.snapshot().document_count();

    if !options.silent {
        println!("Index stored at: {}", index_file.display());
        if summary.errors > 0 {
            eprintln!("({} files could not be read)", summary.errors);
        }
    }

    Ok(summary)
}

/// Open the index to update. An unreadable file is replaced by a fresh one.
fn open_for_build(index_file: &Path, force: bool, config: &AppConfig) -> Result<Index> {
    if force || !index_file.exists() {
        return Index::create(index_file, config.index.clone())
            .with_context(|| format!("Failed to create index {}", index_file.display()));
    }

    match Index::open(index_file, config.index.clone()) {
        Ok(index) => Ok(index),
        Err(error) if error.is_format_error() => {
            warn!(path = %index_file.display(), %error, "rebuilding unreadable index");
            Index::create(index_file, config.index.clone())
                .with_context(|| {
                    format!("Failed to recreate index {}", index_file.display())
                })
        }
        Err(error) => Err(error)
            .with_context(|| format!("Failed to open index {}", index_file.display())),
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("Invalid glob {:?}", pattern))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

fn collect_files(
    root: &Path,
    index_file: &Path,
    include: Option<&GlobSet>,
    config: &AppConfig,
) -> Vec<SourceFile> {
    let filter_config = config.clone();
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(move |entry| {
            !filter_config.is_ignored(&entry.file_name().to_string_lossy())
        })
        .build();

    let index_file = index_file.canonicalize().ok();
    let mut files: Vec<SourceFile> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| index_file.as_deref() != Some(entry.path()))
        .filter_map(|entry| {
            let path = entry.into_path();
            let rel_path = path.strip_prefix(root).ok()?;
            if include.is_some_and(|set| !set.is_match(rel_path)) {
                return None;
            }
            let name = document_name(rel_path);
            // Temp files of an index living inside the tree
            if name.ends_with(".index.tmp") {
                return None;
            }
            Some(SourceFile { name, path })
        })
        .collect();

    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

/// Document name of a relative path, always `/`-separated
fn document_name(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn discovery_spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )?
            .progress_chars("█▓▒░  "),
    );
    pb.set_message("Extracting symbols...");
    Ok(pb)
}
