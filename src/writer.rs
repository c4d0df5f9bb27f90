use crate::extractor::FileRecord;
use crate::utils::collapse_newlines;
use anyhow::{Context, Result};
use log::{debug, info};
use std::borrow::Cow;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

pub struct MarkdownWriter<W: AsyncWrite + Unpin> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> MarkdownWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    /// Writes the `Folder Structure` heading and the fenced tree.
    pub async fn write_tree(&mut self, tree: &str) -> Result<()> {
        self.writer
            .write_all(format!("# Folder Structure\n```\n{tree}\n```").as_bytes())
            .await
            .context("Failed to write folder structure")
    }

    /// Writes the `File Contents` heading and one section per record.
    ///
    /// Does nothing when `records` is empty.
    pub async fn write_records(&mut self, records: &[FileRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        self.writer
            .write_all(b"\n\n# File Contents\n")
            .await
            .context("Failed to write contents heading")?;

        for record in records {
            debug!("Writing file: {}", record.relative_path.display());
            self.writer
                .write_all(record.to_string().as_bytes())
                .await
                .with_context(|| {
                    format!("Failed to write section for {}", record.relative_path.display())
                })?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.context("Failed to flush output")
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// True when a run has no sections to write and isn't tree-only.
pub fn nothing_to_write(records: &[FileRecord], map_only: bool) -> bool {
    let empty = records.is_empty() && !map_only;
    if empty {
        info!("No files in this directory. Done.");
    }
    empty
}

/// Writes the whole document to `output`.
///
/// Returns `false` without touching `output` when there are no records and
/// the run isn't map-only.
pub async fn write_document(
    output: &Path,
    tree: &str,
    records: &[FileRecord],
    map_only: bool,
) -> Result<bool> {
    if nothing_to_write(records, map_only) {
        return Ok(false);
    }

    let file = File::create(output)
        .await
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let mut md_writer = MarkdownWriter::new(file);

    md_writer.write_tree(tree).await?;
    md_writer.write_records(records).await?;
    md_writer.flush().await?;

    Ok(true)
}

/// Rewrites `path` with runs of blank lines collapsed.
pub async fn clean_up_text(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read back {}", path.display()))?;

    if let Cow::Owned(cleaned) = collapse_newlines(&text) {
        fs::write(path, cleaned)
            .await
            .with_context(|| format!("Failed to rewrite {}", path.display()))?;
    }
    Ok(())
}
