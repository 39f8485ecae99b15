//! Output formatting for query results

use crate::error::Result;
use crate::index::EntryResult;
use serde::Serialize;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// One result as written in JSON output
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResultRecord {
    pub word: String,
    pub documents: Vec<String>,
}

impl ResultRecord {
    pub fn from_result(result: &EntryResult) -> Result<Self> {
        Ok(Self {
            word: result.word().to_string(),
            documents: result.document_names()?,
        })
    }
}

pub fn to_records(results: &[EntryResult]) -> Result<Vec<ResultRecord>> {
    results.iter().map(ResultRecord::from_result).collect()
}

/// Stdout with colors enabled only when asked for and supported
pub fn color_stdout(color: bool) -> StandardStream {
    StandardStream::stdout(if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

/// Print each matched word followed by its documents
pub fn print_results(results: &[EntryResult], color: bool) -> Result<()> {
    write_results(&mut color_stdout(color), results)
}

pub fn write_results<W: WriteColor>(out: &mut W, results: &[EntryResult]) -> Result<()> {
    for result in results {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "{}", result.word())?;
        out.reset()?;

        let documents = result.document_names()?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(out, " ({})", documents.len())?;
        out.reset()?;

        for name in &documents {
            write!(out, "  ")?;
            write_name(out, name)?;
        }
    }
    Ok(())
}

/// Print a category header, used when dumping a whole index
pub fn write_category_heading<W: WriteColor>(out: &mut W, category: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    writeln!(out, "[{}]", category)?;
    out.reset()?;
    Ok(())
}

/// Print only document names (for the names command)
pub fn print_names(names: &[String], color: bool) -> Result<()> {
    let mut out = color_stdout(color);
    for name in names {
        write_name(&mut out, name)?;
    }
    Ok(())
}

fn write_name<W: WriteColor>(out: &mut W, name: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
    writeln!(out, "{}", name)?;
    out.reset()?;
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
