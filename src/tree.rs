//! Text rendering of the directory structure, in the style of `tree`.

use anyhow::{Context, Result};
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

struct Node {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

/// Renders every entry below `root`, directories first, then by name.
///
/// Entries whose name appears in `excluded_names` are left out together with
/// their contents. Directories that can't be read for lack of permission are
/// skipped.
pub fn render_tree(root: &Path, excluded_names: &HashSet<String>) -> Result<String> {
    let mut lines = Vec::new();
    render_dir(root, "", excluded_names, &mut lines)?;
    Ok(lines.join("\n"))
}

fn render_dir(
    dir: &Path,
    prefix: &str,
    excluded_names: &HashSet<String>,
    lines: &mut Vec<String>,
) -> Result<()> {
    let nodes = match list_dir(dir, excluded_names) {
        Ok(nodes) => nodes,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            debug!("Skipping unreadable directory {}", dir.display());
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to list {}", dir.display()));
        }
    };

    let count = nodes.len();
    for (i, node) in nodes.into_iter().enumerate() {
        let is_last = i + 1 == count;
        let branch = if is_last { LAST_BRANCH } else { BRANCH };
        lines.push(format!("{prefix}{branch}{}", node.name));

        if node.is_dir {
            let extension = if is_last { SPACE } else { PIPE };
            render_dir(
                &node.path,
                &format!("{prefix}{extension}"),
                excluded_names,
                lines,
            )?;
        }
    }

    Ok(())
}

fn list_dir(dir: &Path, excluded_names: &HashSet<String>) -> io::Result<Vec<Node>> {
    let mut nodes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if excluded_names.contains(&name) {
            continue;
        }
        let path = entry.path();
        nodes.push(Node {
            is_dir: path.is_dir(),
            name,
            path,
        });
    }

    nodes.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(nodes)
}
