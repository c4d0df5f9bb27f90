use anyhow::{Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::HashSet;
use std::path::PathBuf;

/// Name of the generated document when no output path is given.
pub const DEFAULT_FILE_NAME: &str = "Merged.md";

/// Suffixes that are never collected, whatever the caller asks for.
pub const STANDARD_EXCLUDED_FILE_TYPES: [&str; 4] =
    [".DS_Store", ".gitignore", ".lock", DEFAULT_FILE_NAME];

/// Folder names that are never descended into.
pub const STANDARD_EXCLUDED_FOLDERS: [&str; 4] = [".git", ".venv", "__pycache__", ".ruff_cache"];

/// Settings for a single run.
///
/// The exclusion sets are private so that the standard entries can't be
/// removed after construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub output_path: Option<PathBuf>,
    pub included_types: HashSet<String>,
    excluded_types: HashSet<String>,
    excluded_folders: HashSet<String>,
    pub map_only: bool,
    /// External program (and leading arguments) used to convert documents.
    pub converter_command: Option<Vec<String>>,
    pub verbosity: u8,
    pub quiet: bool,
}

impl Config {
    /// Creates a configuration for `root` holding only the standard exclusions.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("Not a directory: {}", root.display());
        }

        Ok(Self {
            root,
            output_path: None,
            included_types: HashSet::new(),
            excluded_types: STANDARD_EXCLUDED_FILE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_folders: STANDARD_EXCLUDED_FOLDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            map_only: false,
            converter_command: None,
            verbosity: 0,
            quiet: false,
        })
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn include_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn exclude_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn exclude_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_folders
            .extend(folders.into_iter().map(Into::into));
        self
    }

    pub fn map_only(mut self, map_only: bool) -> Self {
        self.map_only = map_only;
        self
    }

    pub fn with_converter_command(mut self, command: Vec<String>) -> Self {
        self.converter_command = Some(command);
        self
    }

    pub fn excluded_types(&self) -> &HashSet<String> {
        &self.excluded_types
    }

    pub fn excluded_folders(&self) -> &HashSet<String> {
        &self.excluded_folders
    }

    /// Names hidden from the directory tree.
    ///
    /// Entries are compared by their full name, so a suffix like `.lock`
    /// only hides an entry literally called `.lock`.
    pub fn excluded_names(&self) -> HashSet<String> {
        self.excluded_folders
            .union(&self.excluded_types)
            .cloned()
            .collect()
    }

    /// Where the document is written.
    pub fn output_file(&self) -> PathBuf {
        match &self.output_path {
            None => self.root.join(DEFAULT_FILE_NAME),
            Some(path) if path.is_dir() => path.join(DEFAULT_FILE_NAME),
            Some(path) => path.clone(),
        }
    }
}

fn build_command() -> Command {
    Command::new("dir2md")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Merges the files of a folder and its directory tree into a single .md file")
        .arg(
            Arg::new("directory")
                .value_name("DIRECTORY")
                .help("Path to the folder to process")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output-name")
                .alias("output_name")
                .value_name("PATH")
                .help(format!(
                    "Output file, relative to DIRECTORY. Defaults to {DEFAULT_FILE_NAME}"
                ))
                .num_args(1),
        )
        .arg(
            Arg::new("exclude_types")
                .short('e')
                .long("exclude-types")
                .alias("exclude_types")
                .value_name("EXT")
                .help("File types to exclude (e.g. .svg .png)")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("include_types")
                .short('i')
                .long("include-types")
                .alias("include_types")
                .value_name("EXT")
                .help("File types to include (e.g. .txt .py)")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("exclude_folders")
                .short('x')
                .long("exclude-folders")
                .alias("exclude_folders")
                .value_name("NAME")
                .help("Folders to exclude from processing (e.g. node_modules target)")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("map_only")
                .short('m')
                .long("map-only")
                .alias("map_only")
                .help("Write the folder structure only, no file contents")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("converter")
                .long("converter")
                .value_name("PROGRAM")
                .help("External program used to convert PDF/PPTX/DOCX/XLSX files to text")
                .num_args(1),
        )
        .arg(
            Arg::new("converter_arg")
                .long("converter-arg")
                .alias("converter_arg")
                .value_name("ARG")
                .help("Argument passed to the converter before the file path (repeatable)")
                .num_args(1)
                .allow_hyphen_values(true)
                .action(ArgAction::Append)
                .requires("converter"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v debug, -vv trace)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only report warnings and errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
}

pub fn parse_args() -> Result<Config> {
    config_from_matches(&build_command().get_matches())
}

/// Same as [`parse_args`] but over an explicit argument list.
pub fn parse_from<I, T>(args: I) -> Result<Config>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    config_from_matches(&build_command().try_get_matches_from(args)?)
}

fn config_from_matches(matches: &ArgMatches) -> Result<Config> {
    let directory = matches
        .get_one::<String>("directory")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let values = |id: &str| -> Vec<String> {
        matches
            .get_many::<String>(id)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default()
    };

    let mut config = Config::new(&directory)?
        .include_types(values("include_types"))
        .exclude_types(values("exclude_types"))
        .exclude_folders(values("exclude_folders"))
        .map_only(matches.get_flag("map_only"));

    if let Some(name) = matches.get_one::<String>("output") {
        // Relative names land inside the processed directory.
        config = config.with_output_path(directory.join(name));
    }

    if let Some(program) = matches.get_one::<String>("converter") {
        let mut command = vec![program.clone()];
        command.extend(values("converter_arg"));
        config = config.with_converter_command(command);
    }

    config.verbosity = matches.get_count("verbose");
    config.quiet = matches.get_flag("quiet");

    Ok(config)
}
