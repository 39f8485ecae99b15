use crate::index::disk::IndexStats;
use crate::index::types::IndexMeta;
use crate::utils::list_indexed_codebases;
use anyhow::Result;

/// Display index statistics
pub fn show_stats(stats: &IndexStats, meta: Option<&IndexMeta>) {
    println!("Index Statistics");
    println!("================");
    println!();
    if let Some(meta) = meta {
        println!("Root path:        {}", meta.root_path.display());
    }
    println!("Index file:       {}", stats.path.display());
    println!("Index size:       {}", format_size(stats.file_size));
    println!("Document count:   {}", stats.document_count);
    println!("Name chunks:      {}", stats.chunk_count);
    println!("Reference width:  {} byte(s)", stats.reference_width);

    if !stats.categories.is_empty() {
        println!();
        println!("Categories:");
        for category in &stats.categories {
            println!(
                "  {:15} {:>8} words  {}",
                category.name,
                category.words,
                format_size(category.bytes as u64)
            );
        }
    }

    if let Some(meta) = meta {
        println!();
        println!("Created:          {}", format_timestamp(meta.created_at));
        println!("Updated:          {}", format_timestamp(meta.updated_at));
    }
}

/// List all indexed codebases
pub fn list_indexes(json: bool) -> Result<()> {
    let codebases = list_indexed_codebases()?;

    if json {
        let metas: Vec<&IndexMeta> = codebases.iter().map(|c| &c.meta).collect();
        return crate::output::print_json(&metas);
    }

    if codebases.is_empty() {
        println!("No indexed codebases found.");
        return Ok(());
    }

    println!("Indexed Codebases");
    println!("=================");
    println!();

    for codebase in codebases {
        let status = if codebase.root_path.exists() { "" } else { " [missing]" };
        println!("  {}{}", codebase.root_path.display(), status);
        println!("    Index: {}", codebase.meta.index_file.display());
        println!("    Documents: {}", codebase.meta.doc_count);
        println!();
    }

    Ok(())
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format unix timestamp
fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    let datetime = UNIX_EPOCH + Duration::from_secs(ts);
    format!("{:?}", datetime)
}
