use crate::cli::Config;
use crate::extractor::{DocumentConverter, FileRecord, extract_file};
use crate::utils::relative_to;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Patterns read from the root `.gitignore`.
///
/// This is a loose approximation of gitignore: each line is a regular
/// expression in which `*` matches any run of characters, tested against the
/// whole path relative to the root. Negation, anchoring and `**` have no
/// special meaning.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Regex>,
}

impl IgnorePatterns {
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let patterns = lines
            .into_iter()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let source = format!("^(?:{})$", line.replace('*', ".*"));
                match Regex::new(&source) {
                    Ok(re) => Some(re),
                    Err(err) => {
                        warn!("Ignoring unusable .gitignore line {line:?}: {err}");
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    /// Loads `<root>/.gitignore`; a missing file yields no patterns.
    pub fn from_gitignore(root: &Path) -> Result<Self> {
        let path = root.join(".gitignore");
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let patterns = Self::from_lines(text.lines());
        debug!("Loaded {} ignore patterns", patterns.len());
        Ok(patterns)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_ignored(&self, relative: &Path) -> bool {
        let relative = relative.to_string_lossy();
        self.patterns.iter().any(|re| re.is_match(&relative))
    }
}

/// Extension filter applied to file names.
///
/// Exclusions are checked first; both conditions must hold.
pub fn matches_criteria(
    file_name: &str,
    included: &HashSet<String>,
    excluded: &HashSet<String>,
) -> bool {
    let not_excluded =
        excluded.is_empty() || !excluded.iter().any(|ext| file_name.ends_with(ext.as_str()));
    let is_included =
        included.is_empty() || included.iter().any(|ext| file_name.ends_with(ext.as_str()));
    not_excluded && is_included
}

/// Walks the root and extracts every eligible file, in traversal order.
///
/// Returns nothing in map-only mode.
pub fn collect_files(config: &Config, converter: &dyn DocumentConverter) -> Result<Vec<FileRecord>> {
    if config.map_only {
        return Ok(Vec::new());
    }

    let root = config.root.clone();
    let ignored = IgnorePatterns::from_gitignore(&root)?;

    let mut builder = WalkBuilder::new(&root);
    builder
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    {
        let root = root.clone();
        let ignored = ignored.clone();
        let excluded_folders = config.excluded_folders().clone();
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|t| t.is_dir()) {
                return true;
            }
            let excluded = entry
                .file_name()
                .to_str()
                .is_some_and(|name| excluded_folders.contains(name));
            !excluded && !ignored.is_ignored(relative_to(entry.path(), &root))
        });
    }

    let mut records = Vec::new();

    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Error walking path: {err}");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if ignored.is_ignored(relative_to(path, &root)) {
            info!("Skipping file {}: matched .gitignore pattern", path.display());
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !matches_criteria(&name, &config.included_types, config.excluded_types()) {
            debug!("Filtered out: {}", path.display());
            continue;
        }

        if let Some(record) = extract_file(path, &root, converter) {
            records.push(record);
        }
    }

    Ok(records)
}
