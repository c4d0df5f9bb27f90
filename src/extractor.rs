//! Turns eligible files into markdown sections.
//!
//! Plain files are decoded as UTF-8, replacing invalid sequences. PDF, PPTX,
//! DOCX and XLSX files are handed to a [`DocumentConverter`], so the rest of
//! the crate never depends on a particular conversion backend.

use crate::utils::{extension_label, relative_to};
use anyhow::{Context, Result, bail};
use content_inspector::inspect;
use log::{debug, info, warn};
use memmap2::MmapOptions;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Extensions whose text comes from a [`DocumentConverter`].
pub const DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "pptx", "docx", "xlsx"];

/// Converts a document into plain text.
pub trait DocumentConverter {
    fn convert(&self, path: &Path) -> Result<String>;
}

impl<F> DocumentConverter for F
where
    F: Fn(&Path) -> Result<String>,
{
    fn convert(&self, path: &Path) -> Result<String> {
        self(path)
    }
}

/// Runs an external program with the document path as its last argument and
/// takes whatever it prints as the text.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .context("Converter command is empty")?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl DocumentConverter for CommandConverter {
    fn convert(&self, path: &Path) -> Result<String> {
        debug!("Running `{}` on {}", self.program, path.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .with_context(|| format!("Failed to run converter `{}`", self.program))?;

        if !output.status.success() {
            bail!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// One collected file, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub relative_path: PathBuf,
    /// Extension without the leading dot, empty when there is none.
    pub extension: String,
    pub content: String,
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "## {}\n```{}\n{}\n```\n\n",
            self.relative_path.display(),
            self.extension,
            self.content
        )
    }
}

pub fn is_document(path: &Path) -> bool {
    let extension = extension_label(path);
    DOCUMENT_EXTENSIONS.contains(&extension.as_str())
}

/// Reads `path` into a [`FileRecord`].
///
/// Failures are logged and reported as `None`; the caller simply moves on to
/// the next file.
pub fn extract_file(
    path: &Path,
    root: &Path,
    converter: &dyn DocumentConverter,
) -> Option<FileRecord> {
    let content = if is_document(path) {
        converter.convert(path)
    } else {
        read_text(path)
    };

    match content {
        Ok(content) => {
            let size = fs::metadata(path).map(|m| m.len()).unwrap_or_default();
            info!("Processed file {}: size {} bytes", path.display(), size);

            Some(FileRecord {
                relative_path: relative_to(path, root).to_path_buf(),
                extension: extension_label(path),
                content,
            })
        }
        Err(err) => {
            warn!("Error processing file {}: {:#}", path.display(), err);
            None
        }
    }
}

/// Decodes a file as UTF-8, substituting U+FFFD for invalid sequences.
pub fn read_text(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat file: {}", path.display()))?
        .len();
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read once and dropped before returning.
    let mmap = unsafe {
        MmapOptions::new()
            .map(&file)
            .with_context(|| format!("Failed to mmap file: {}", path.display()))?
    };

    let sample_size = std::cmp::min(8192, mmap.len());
    if inspect(&mmap[..sample_size]).is_binary() {
        debug!(
            "{} looks binary, writing it as text anyway",
            path.display()
        );
    }

    Ok(String::from_utf8_lossy(&mmap).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use tempfile::tempdir;

    fn never_called(_: &Path) -> Result<String> {
        Err(anyhow!("converter should not run"))
    }

    #[test]
    fn formats_record_as_markdown_section() {
        let record = FileRecord {
            relative_path: PathBuf::from("src").join("main.py"),
            extension: "py".into(),
            content: "print(1)".into(),
        };

        let expected = format!(
            "## {}\n```py\nprint(1)\n```\n\n",
            Path::new("src").join("main.py").display()
        );
        assert_eq!(record.to_string(), expected);
    }

    #[test]
    fn decodes_invalid_utf8_with_replacement() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        fs::write(&path, [b'o', b'k', 0xFF, 0xFE, b'!']).unwrap();

        let record = extract_file(&path, dir.path(), &never_called).unwrap();
        assert_eq!(record.content, "ok\u{FFFD}\u{FFFD}!");
        assert_eq!(record.extension, "bin");
        assert_eq!(record.relative_path, PathBuf::from("blob.bin"));
    }

    #[test]
    fn binary_looking_valid_utf8_is_kept_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.dat");
        fs::write(&path, b"id\x00name\x00\nok").unwrap();

        let record = extract_file(&path, dir.path(), &never_called).unwrap();
        assert_eq!(record.content, "id\u{0}name\u{0}\nok");
    }

    #[test]
    fn empty_file_has_empty_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();

        let record = extract_file(&path, dir.path(), &never_called).unwrap();
        assert!(record.content.is_empty());
    }

    #[test]
    fn documents_go_through_the_converter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        fs::write(&path, b"%PDF-1.4 not really").unwrap();

        let converter = |p: &Path| -> Result<String> {
            Ok(format!("converted {}", p.file_name().unwrap().to_string_lossy()))
        };

        let record = extract_file(&path, dir.path(), &converter).unwrap();
        assert_eq!(record.content, "converted report.pdf");
        assert_eq!(record.extension, "pdf");
    }

    #[test]
    fn converter_failure_drops_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slides.pptx");
        fs::write(&path, b"garbage").unwrap();

        assert!(extract_file(&path, dir.path(), &never_called).is_none());
    }

    #[test]
    fn missing_file_is_a_soft_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");

        assert!(extract_file(&path, dir.path(), &never_called).is_none());
    }

    #[test]
    fn recognises_document_extensions() {
        assert!(is_document(Path::new("a.pdf")));
        assert!(is_document(Path::new("deck.pptx")));
        assert!(is_document(Path::new("dir/notes.docx")));
        assert!(is_document(Path::new("book.xlsx")));
        assert!(!is_document(Path::new("notes.doc")));
        assert!(!is_document(Path::new("pdf")));
    }

    #[test]
    fn empty_converter_command_is_rejected() {
        assert!(CommandConverter::new(&[]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_converter_captures_stdout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        fs::write(&path, "hello from cat").unwrap();

        let converter = CommandConverter::new(&["cat".to_string()]).unwrap();
        assert_eq!(converter.convert(&path).unwrap(), "hello from cat");
    }

    #[cfg(unix)]
    #[test]
    fn command_converter_reports_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.docx");

        let converter = CommandConverter::new(&["cat".to_string()]).unwrap();
        let err = converter.convert(&path).unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }
}
