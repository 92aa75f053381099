//! Per-analysis temporary files under the session root.
//!
//! Layout: `<root>/resources/<analysis id>/<file>`. Files are named relative
//! to the root with `/` separators; that relative name is what analyses put
//! into their `keep` lists.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_warn};
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;
use worker_core::AnalysisId;

const RESOURCES_DIR: &str = "resources";

#[derive(Debug, Error)]
pub enum TempFileError {
    #[error("session root missing or not writable: {0}")]
    Root(String),
    #[error("invalid temp file name '{0}'")]
    InvalidName(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A file handed out to an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFile {
    pub root: PathBuf,
    pub relative: String,
}

impl TempFile {
    pub fn path(&self) -> PathBuf {
        self.relative
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

#[derive(Debug, Clone)]
pub struct TempFileStore {
    root: PathBuf,
}

/// Ensure the session root exists and is writable; create if missing.
fn ensure_root(dir: &Path) -> Result<(), TempFileError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| TempFileError::Root(e.to_string()))?;
        if !meta.is_dir() {
            return Err(TempFileError::Root("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| TempFileError::Root(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| TempFileError::Root(e.to_string()))?;
    Ok(())
}

impl TempFileStore {
    pub fn attach(root: impl Into<PathBuf>) -> Result<Self, TempFileError> {
        let root = root.into();
        ensure_root(&root)?;
        engine_debug!("temp files attached at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn analysis_dir(&self, id: AnalysisId) -> PathBuf {
        self.root.join(RESOURCES_DIR).join(id.to_string())
    }

    fn relative_name(id: AnalysisId, file_name: &str) -> String {
        format!("{RESOURCES_DIR}/{id}/{file_name}")
    }

    /// A fresh, uniquely named file with the given extension.
    pub fn create(&self, extension: &str, id: AnalysisId) -> Result<TempFile, TempFileError> {
        let dir = self.analysis_dir(id);
        fs::create_dir_all(&dir)?;
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension.trim_start_matches('.'))
        };
        let (_, path) = Builder::new()
            .prefix("_")
            .suffix(&suffix)
            .tempfile_in(&dir)?
            .keep()
            .map_err(|err| TempFileError::Io(err.error))?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| TempFileError::InvalidName(path.display().to_string()))?;
        Ok(TempFile {
            root: self.root.clone(),
            relative: Self::relative_name(id, file_name),
        })
    }

    /// A file with a fixed name; the same name always maps to the same path.
    ///
    /// Only the analysis directory is created. The caller writes the file.
    pub fn create_specific(&self, name: &str, id: AnalysisId) -> Result<TempFile, TempFileError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(TempFileError::InvalidName(name.to_string()));
        }
        fs::create_dir_all(self.analysis_dir(id))?;
        Ok(TempFile {
            root: self.root.clone(),
            relative: Self::relative_name(id, name),
        })
    }

    /// Relative names of all files attributed to `id`, sorted.
    pub fn retrieve_list(&self, id: AnalysisId) -> Vec<String> {
        let entries = match fs::read_dir(self.analysis_dir(id)) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .map(|name| Self::relative_name(id, &name))
            .collect();
        names.sort();
        names
    }

    /// Deletes the listed files; missing files are ignored.
    pub fn delete_list(&self, relative_names: &[String]) {
        for relative in relative_names {
            let file = TempFile {
                root: self.root.clone(),
                relative: relative.clone(),
            };
            match fs::remove_file(file.path()) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => engine_warn!("could not delete temp file {relative}: {err}"),
            }
        }
    }

    /// Deletes every file of `id` that is not in `keep`.
    pub fn prune(&self, id: AnalysisId, keep: &[String]) {
        let mut doomed = self.retrieve_list(id);
        doomed.retain(|name| !keep.contains(name));
        self.delete_list(&doomed);
    }

    pub fn delete_for(&self, id: AnalysisId) {
        self.delete_list(&self.retrieve_list(id));
    }

    /// Removes every analysis resource of the session.
    pub fn delete_all(&self) -> Result<(), TempFileError> {
        let resources = self.root.join(RESOURCES_DIR);
        match fs::remove_dir_all(&resources) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
