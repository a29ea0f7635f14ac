//! Dynamic library loading for the compiler engine
//!
//! Locates libtcc using `libloading`, handling platform-specific naming
//! conventions and search paths. The binding table keeps the loaded library
//! alive for the rest of the process.

use libloading::Library;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the libtcc shared library (file or directory)
pub const LIBRARY_ENV: &str = "EMBEDCC_LIBRARY";

/// Base name of the compiler library
pub const LIBRARY_NAME: &str = "tcc";

/// Library loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No candidate file exists in the search paths
    #[error("library '{name}' not found in {searched} search path(s)")]
    LibraryNotFound { name: String, searched: usize },

    /// The dynamic loader rejected the file
    #[error("failed to load library {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    /// The library lacks one of the required entry points
    #[error("entry point '{symbol}' missing from {}: {reason}", library.display())]
    MissingEntryPoint {
        library: PathBuf,
        symbol: &'static str,
        reason: String,
    },
}

/// Locates and opens libtcc
///
/// # Safety
///
/// Loading a dynamic library executes its initialization code in this
/// process. Only point the loader at a trusted libtcc build.
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    /// Explicit library file, tried before any search
    explicit: Option<PathBuf>,
    /// Directories searched in order
    search_paths: Vec<PathBuf>,
}

impl LibraryLoader {
    /// Create a loader with the platform default search paths
    pub fn new() -> Self {
        Self {
            explicit: None,
            search_paths: Self::default_search_paths(),
        }
    }

    /// Create a loader honouring `EMBEDCC_LIBRARY`
    ///
    /// The variable may name the library file itself or a directory holding it.
    pub fn from_env() -> Self {
        let mut loader = Self::new();
        if let Some(value) = std::env::var_os(LIBRARY_ENV) {
            let path = PathBuf::from(value);
            if path.is_dir() {
                loader.add_search_path(path);
            } else {
                loader.explicit = Some(path);
            }
        }
        loader
    }

    /// Use exactly this library file
    pub fn with_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Get platform-specific default library search paths
    ///
    /// - Linux: /usr/lib, /usr/local/lib, /lib (+ lib64 and tcc subdirectories)
    /// - macOS: /usr/lib, /usr/local/lib, /opt/homebrew/lib
    /// - Windows: ./tcc next to the working directory
    /// - All platforms: current working directory first
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/usr/lib/x86_64-linux-gnu"));
            paths.push(PathBuf::from("/usr/lib/aarch64-linux-gnu"));
            paths.push(PathBuf::from("/lib"));

            if cfg!(target_pointer_width = "64") {
                paths.push(PathBuf::from("/usr/lib64"));
                paths.push(PathBuf::from("/lib64"));
            }
            paths.push(PathBuf::from("/usr/local/lib/tcc"));
            paths.push(PathBuf::from("/usr/lib/tcc"));
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
        }

        if let Ok(cwd) = std::env::current_dir() {
            #[cfg(target_os = "windows")]
            paths.push(cwd.join("tcc"));
            paths.insert(0, cwd);
        }

        paths
    }

    /// Candidate file names, in priority order
    fn candidate_names() -> Vec<String> {
        if cfg!(target_os = "windows") {
            vec![format!("lib{}.dll", LIBRARY_NAME), format!("{}.dll", LIBRARY_NAME)]
        } else if cfg!(target_os = "macos") {
            vec![
                format!("lib{}.dylib", LIBRARY_NAME),
                format!("lib{}.so", LIBRARY_NAME),
            ]
        } else {
            vec![
                format!("lib{}.so", LIBRARY_NAME),
                format!("lib{}.so.1", LIBRARY_NAME),
            ]
        }
    }

    /// Resolve the library file to load
    pub fn resolve(&self) -> Result<PathBuf, LoadError> {
        if let Some(path) = &self.explicit {
            return Ok(path.clone());
        }

        let names = Self::candidate_names();
        for dir in &self.search_paths {
            for name in &names {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        Err(LoadError::LibraryNotFound {
            name: LIBRARY_NAME.to_string(),
            searched: self.search_paths.len(),
        })
    }

    /// Resolve and open the library
    pub fn open(&self) -> Result<(PathBuf, Library), LoadError> {
        let path = self.resolve()?;
        log::debug!("loading compiler library from {}", path.display());
        let library = unsafe { Library::new(&path) }.map_err(|e| LoadError::LoadFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok((path, library))
    }

    /// Add a custom search path (prepended to search list)
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.insert(0, path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn explicit_library(&self) -> Option<&Path> {
        self.explicit.as_deref()
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_search_paths_not_empty() {
        let paths = LibraryLoader::default_search_paths();
        assert!(!paths.is_empty());

        if let Ok(cwd) = std::env::current_dir() {
            assert_eq!(paths[0], cwd);
        }
    }

    #[test]
    fn test_custom_search_path_first() {
        let mut loader = LibraryLoader::new();
        loader.add_search_path("/custom/path");
        assert_eq!(loader.search_paths()[0], PathBuf::from("/custom/path"));
    }

    #[test]
    fn test_resolve_finds_candidate_in_search_path() {
        let dir = TempDir::new().unwrap();
        let name = &LibraryLoader::candidate_names()[0];
        fs::write(dir.path().join(name), b"not really a library").unwrap();

        let mut loader = LibraryLoader::new();
        loader.add_search_path(dir.path());
        assert_eq!(loader.resolve().unwrap(), dir.path().join(name));
    }

    #[test]
    fn test_explicit_library_wins() {
        let loader = LibraryLoader::new().with_library("/opt/tcc/libtcc.so");
        assert_eq!(loader.resolve().unwrap(), PathBuf::from("/opt/tcc/libtcc.so"));
        assert_eq!(loader.explicit_library(), Some(Path::new("/opt/tcc/libtcc.so")));
    }

    #[test]
    fn test_open_rejects_non_library() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("libbogus.so");
        fs::write(&bogus, b"garbage").unwrap();

        let loader = LibraryLoader::new().with_library(&bogus);
        let result = loader.open();
        assert!(matches!(result, Err(LoadError::LoadFailed { .. })));
    }

    #[test]
    fn test_not_found_reports_search_count() {
        let loader = LibraryLoader {
            explicit: None,
            search_paths: vec![PathBuf::from("/definitely/not/here")],
        };
        assert_eq!(
            loader.resolve(),
            Err(LoadError::LibraryNotFound {
                name: "tcc".to_string(),
                searched: 1,
            })
        );
    }
}
