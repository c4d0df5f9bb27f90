use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::Path;

static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("newline pattern is valid"));

/// Label for the code fence: the file's last extension without the dot.
pub fn extension_label(path: &Path) -> String {
    path.extension()
        .and_then(OsStr::to_str)
        .unwrap_or("")
        .to_string()
}

/// Collapses every run of three or more newlines down to two.
pub fn collapse_newlines(text: &str) -> Cow<'_, str> {
    EXCESS_NEWLINES.replace_all(text, "\n\n")
}

/// Path relative to `root`, or the path itself when it lies outside.
pub fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
