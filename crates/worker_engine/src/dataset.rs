//! Read access to the shared dataset description.
use std::fs;
use std::path::{Path, PathBuf};

use engine_logging::engine_warn;
use serde::Deserialize;

pub const DATA_SET_FILE: &str = "dataset.json";

/// What the worker needs to know about the dataset the coordinator shares.
pub trait DataSetSource {
    /// `None` while no dataset is loaded.
    fn column_names(&mut self) -> Option<Vec<String>>;
    fn row_count(&mut self) -> usize;
    /// Drops any cached view; the next access reloads.
    fn unload(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSetDescription {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    row_count: usize,
}

/// Dataset description stored as `dataset.json` in the session root.
#[derive(Debug)]
pub struct FileDataSet {
    path: PathBuf,
    loaded: Option<DataSetDescription>,
}

impl FileDataSet {
    pub fn in_session(root: &Path) -> Self {
        Self::new(root.join(DATA_SET_FILE))
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path, loaded: None }
    }

    fn load(&mut self) -> Option<&DataSetDescription> {
        if self.loaded.is_none() {
            let raw = fs::read_to_string(&self.path).ok()?;
            match serde_json::from_str(&raw) {
                Ok(description) => self.loaded = Some(description),
                Err(err) => {
                    engine_warn!("ignoring unreadable {}: {err}", self.path.display());
                    return None;
                }
            }
        }
        self.loaded.as_ref()
    }
}

impl DataSetSource for FileDataSet {
    fn column_names(&mut self) -> Option<Vec<String>> {
        self.load().map(|description| description.columns.clone())
    }

    fn row_count(&mut self) -> usize {
        self.load().map_or(0, |description| description.row_count)
    }

    fn unload(&mut self) {
        self.loaded = None;
    }
}

/// Fixed dataset, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSet {
    columns: Option<Vec<String>>,
    rows: usize,
    unloads: usize,
}

impl InMemoryDataSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<I, S>(columns: I, rows: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            rows,
            unloads: 0,
        }
    }

    /// How often the engine released the dataset.
    pub fn unloads(&self) -> usize {
        self.unloads
    }
}

impl DataSetSource for InMemoryDataSet {
    fn column_names(&mut self) -> Option<Vec<String>> {
        self.columns.clone()
    }

    fn row_count(&mut self) -> usize {
        self.rows
    }

    fn unload(&mut self) {
        self.unloads += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_data_set_reloads_after_unload() {
        let dir = tempfile::tempdir().unwrap();
        let mut data_set = FileDataSet::in_session(dir.path());
        assert_eq!(data_set.column_names(), None);
        assert_eq!(data_set.row_count(), 0);

        fs::write(
            dir.path().join(DATA_SET_FILE),
            r#"{"columns":["age","weight kg"],"rowCount":4}"#,
        )
        .unwrap();
        assert_eq!(
            data_set.column_names(),
            Some(vec!["age".to_string(), "weight kg".to_string()])
        );

        fs::write(dir.path().join(DATA_SET_FILE), r#"{"columns":["x"],"rowCount":1}"#).unwrap();
        assert_eq!(data_set.row_count(), 4);
        data_set.unload();
        assert_eq!(data_set.row_count(), 1);
    }
}
