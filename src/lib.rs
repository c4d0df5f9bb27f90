//! # dir2md Library
//!
//! Collects the files of a folder into a single Markdown document: a rendered
//! directory tree followed by one fenced section per file. PDF, PPTX, DOCX and
//! XLSX files are converted to text first.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dir2md::{Config, run_dir2md};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("my-project")?
//!         .include_types([".rs", ".toml"])
//!         .exclude_folders(["target"]);
//!
//!     match run_dir2md(config).await? {
//!         Some(path) => println!("Wrote {}", path.display()),
//!         None => println!("Nothing to do"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! A custom converter can be plugged in through [`run_with_converter`]; any
//! `Fn(&Path) -> anyhow::Result<String>` works.

pub mod cli;
pub mod extractor;
pub mod filewalker;
pub mod office;
pub mod tree;
pub mod utils;
pub mod writer;

pub use cli::{Config, DEFAULT_FILE_NAME, STANDARD_EXCLUDED_FILE_TYPES, STANDARD_EXCLUDED_FOLDERS};
pub use extractor::{CommandConverter, DocumentConverter, FileRecord};
pub use filewalker::collect_files;
pub use office::OfficeConverter;
pub use tree::render_tree;
pub use writer::MarkdownWriter;

use anyhow::Result;
use log::info;
use std::path::PathBuf;

/// Generates the Markdown document described by `config`.
///
/// Uses the external converter from `config.converter_command` when one is
/// set, the built-in [`OfficeConverter`] otherwise.
pub async fn run_dir2md(config: Config) -> Result<Option<PathBuf>> {
    match &config.converter_command {
        Some(command) => {
            let converter = CommandConverter::new(command)?;
            run_with_converter(config, &converter).await
        }
        None => run_with_converter(config, &OfficeConverter).await,
    }
}

/// Collects, writes and cleans up the document.
///
/// Returns the path of the written file, or `None` when there was nothing to
/// write.
pub async fn run_with_converter(
    config: Config,
    converter: &dyn DocumentConverter,
) -> Result<Option<PathBuf>> {
    info!("Fetching all files...");
    let records = collect_files(&config, converter)?;
    if writer::nothing_to_write(&records, config.map_only) {
        return Ok(None);
    }
    let tree = render_tree(&config.root, &config.excluded_names())?;

    let output = config.output_file();
    if !writer::write_document(&output, &tree, &records, config.map_only).await? {
        return Ok(None);
    }

    info!("Cleaning up file...");
    writer::clean_up_text(&output).await?;

    info!("Done.");
    Ok(Some(output))
}
