//! Error types for the typelint library and CLI.

use std::path::PathBuf;

/// Errors from config decoding, exceptional filesystem failures, and engines.
///
/// Ordinary absence (no project config, no manifest, unresolved specifier)
/// is never an error; those paths return `None`.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Cannot read a project config file from disk.
    ConfigRead(PathBuf, std::io::Error),
    /// Project config file is not valid JSON (comments and trailing commas
    /// allowed) or has the wrong shape.
    ConfigParse(PathBuf, json5::Error),
    /// Project config decoded but a value failed validation.
    ConfigInvalid(PathBuf, String),
    /// A source file exists but could not be read.
    FileRead(PathBuf, std::io::Error),
    /// An I/O failure other than not-found while checking the filesystem.
    Stat(PathBuf, std::io::Error),
    /// The type-checking engine failed.
    Engine(String),
    /// No lintable files were found in the given paths.
    NoInputs,
}

impl Error {
    /// User-facing hint to accompany the error message.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::ConfigParse(..) => Some("project config must be a JSON object"),
            Self::ConfigInvalid(..) => {
                Some("supported targets: ES3, ES5, ES2015-ES2022, ESNext")
            }
            Self::Stat(..) => Some("check file permissions in the project tree"),
            Self::NoInputs => Some("pass .ts/.tsx files or directories containing them"),
            _ => None,
        }
    }

    /// True for errors that come from decoding a project config. These are
    /// reported against the linted file instead of aborting the run.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigRead(..) | Self::ConfigParse(..) | Self::ConfigInvalid(..)
        )
    }
}

// Display: lowercase, no trailing punctuation, so it composes into
// larger error messages.
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigRead(path, source) => {
                write!(f, "cannot read project config '{}': {source}", path.display())
            }
            Self::ConfigParse(path, source) => {
                write!(f, "invalid project config '{}': {source}", path.display())
            }
            Self::ConfigInvalid(path, msg) => {
                write!(f, "invalid project config '{}': {msg}", path.display())
            }
            Self::FileRead(path, source) => {
                write!(f, "cannot read '{}': {source}", path.display())
            }
            Self::Stat(path, source) => {
                write!(f, "cannot inspect '{}': {source}", path.display())
            }
            Self::Engine(msg) => write!(f, "type-check engine: {msg}"),
            Self::NoInputs => write!(f, "no lintable files found"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigRead(_, e) | Self::FileRead(_, e) | Self::Stat(_, e) => Some(e),
            Self::ConfigParse(_, e) => Some(e),
            _ => None,
        }
    }
}
