use crate::error::{Error, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Source scanner for Rust projects.
///
/// The `SourceScanner` recursively walks a project directory, collects every `.rs` file
/// and parses it with `syn`. It skips the `target` directory and hidden directories
/// (those starting with `.`).
///
/// # Example
///
/// ```no_run
/// use openapi_catalog::source::scanner::SourceScanner;
/// use std::path::PathBuf;
///
/// let scanned = SourceScanner::new(PathBuf::from("./my-service")).scan().unwrap();
/// println!("Parsed {} Rust files", scanned.files.len());
/// ```
pub struct SourceScanner {
    root_path: PathBuf,
}

/// A successfully parsed Rust file
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// The parsed syntax tree
    pub syntax_tree: syn::File,
}

impl ParsedFile {
    /// File name without extension, used to name groups of free handler functions
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Result of a scan
#[derive(Debug)]
pub struct ScanResult {
    /// Every file that was read and parsed
    pub files: Vec<ParsedFile>,
    /// Warning messages for paths that could not be accessed, read or parsed
    pub warnings: Vec<String>,
}

impl SourceScanner {
    /// Creates a new `SourceScanner` for the specified root directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Collects and parses all `.rs` files below the root.
    ///
    /// Inaccessible directories and files that cannot be read or parsed are logged and
    /// recorded as warnings; scanning continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the root path does not exist or is not a directory.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "Project path is not a directory: {}",
                self.root_path.display()
            )));
        }

        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }

            match Self::parse_file(path) {
                Ok(parsed) => files.push(parsed),
                Err(e) => {
                    let warning = e.to_string();
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        debug!(
            "Scanned {}: {} files parsed, {} warnings",
            self.root_path.display(),
            files.len(),
            warnings.len()
        );

        Ok(ScanResult { files, warnings })
    }

    /// Parses a single Rust source file.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::ParseError {
            file: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;
        let syntax_tree = syn::parse_file(&content).map_err(|e| Error::ParseError {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            syntax_tree,
        })
    }
}
