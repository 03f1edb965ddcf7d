use std::path::{Path, PathBuf};

use csv::StringRecord;
use engine_logging::{engine_info, engine_warn};
use harvester_core::{
    parse_collected_flag, CheckpointSet, PullKey, RepoKey, NUMBER_COLUMN, REPOSITORY_COLUMN,
    REPOSITORY_COLUMNS,
};

use crate::persist::{read_table, rewrite_csv, PersistError};
use crate::HarvestError;

/// Durable record of finished work items.
///
/// `mark_done` may only be called once every record of the item is on disk.
/// Marks are never taken back.
pub trait CheckpointStore<K> {
    fn is_done(&self, key: &K) -> bool;

    fn mark_done(&mut self, key: K) -> Result<(), PersistError>;
}

/// The repository list, whose `pr_collected` column is the per-repository checkpoint.
///
/// Rows are kept as read and written back unchanged apart from the flag cell,
/// so columns and rows this type does not understand survive a rewrite.
#[derive(Debug, Clone)]
pub struct RepositoryFlags {
    path: PathBuf,
    header: Vec<String>,
    rows: Vec<StringRecord>,
    name: usize,
    owner: usize,
    flag: usize,
    done: CheckpointSet<RepoKey>,
}

impl RepositoryFlags {
    /// A missing or empty list loads as empty. An existing one needs `name`,
    /// `owner` and `pr_collected` columns.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, HarvestError> {
        let path = path.into();
        let table = match read_table(&path)? {
            Some(table) if !table.header.is_empty() => table,
            _ => {
                return Ok(Self {
                    path,
                    header: REPOSITORY_COLUMNS.iter().map(|c| c.to_string()).collect(),
                    rows: Vec::new(),
                    name: 0,
                    owner: 1,
                    flag: 2,
                    done: CheckpointSet::new(),
                })
            }
        };
        let column = |name: &str| {
            table.column(name).ok_or_else(|| HarvestError::MissingColumn {
                path: path.clone(),
                column: name.to_string(),
            })
        };
        let (name, owner, flag) = (column("name")?, column("owner")?, column("pr_collected")?);

        let mut flags = Self {
            header: table.header,
            rows: table.records,
            name,
            owner,
            flag,
            done: CheckpointSet::new(),
            path,
        };
        for row in &flags.rows {
            let Some(key) = flags.key_of(row) else {
                continue;
            };
            match parse_collected_flag(&row[flags.flag]) {
                Some(true) => {
                    flags.done.mark_done(key);
                }
                Some(false) => {}
                None => engine_warn!(
                    "{:?}: {} has pr_collected {:?}, treating it as pending",
                    flags.path,
                    key,
                    &row[flags.flag]
                ),
            }
        }
        engine_info!(
            "Loaded {} repositories from {:?}, {} already collected",
            flags.len(),
            flags.path,
            flags.done.len()
        );
        Ok(flags)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct repositories in the list.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every repository in list order, each once.
    pub fn keys(&self) -> Vec<RepoKey> {
        let mut seen = CheckpointSet::new();
        self.rows
            .iter()
            .filter_map(|row| self.key_of(row))
            .filter(|key| seen.mark_done(key.clone()))
            .collect()
    }

    /// Sets every flag to `collected(key)` and rewrites the list.
    pub fn reset_flags<F>(&mut self, collected: F) -> Result<usize, PersistError>
    where
        F: Fn(&RepoKey) -> bool,
    {
        let rows: Vec<StringRecord> = self
            .rows
            .iter()
            .map(|row| match self.key_of(row) {
                Some(key) => self.with_flag(row, collected(&key)),
                None => row.clone(),
            })
            .collect();
        rewrite_csv(&self.path, &self.header, &rows)?;
        self.rows = rows;
        self.done = self.keys().into_iter().filter(|key| collected(key)).collect();
        Ok(self.done.len())
    }

    /// `None` for rows of the wrong width or with an empty owner or name.
    fn key_of(&self, row: &StringRecord) -> Option<RepoKey> {
        if row.len() != self.header.len() {
            return None;
        }
        let (owner, name) = (row[self.owner].trim(), row[self.name].trim());
        (!owner.is_empty() && !name.is_empty()).then(|| RepoKey::new(owner, name))
    }

    fn with_flag(&self, row: &StringRecord, collected: bool) -> StringRecord {
        let value = if collected { "true" } else { "false" };
        row.iter()
            .enumerate()
            .map(|(index, field)| if index == self.flag { value } else { field })
            .collect()
    }
}

impl CheckpointStore<RepoKey> for RepositoryFlags {
    fn is_done(&self, key: &RepoKey) -> bool {
        self.done.is_done(key)
    }

    fn mark_done(&mut self, key: RepoKey) -> Result<(), PersistError> {
        if self.done.is_done(&key) {
            return Ok(());
        }
        let rows: Vec<StringRecord> = self
            .rows
            .iter()
            .map(|row| match self.key_of(row) {
                Some(row_key) if row_key == key => self.with_flag(row, true),
                _ => row.clone(),
            })
            .collect();
        // The set only learns about the key once the rewrite is durable.
        rewrite_csv(&self.path, &self.header, &rows)?;
        self.rows = rows;
        self.done.mark_done(key);
        Ok(())
    }
}

/// Pull request keys present in a dataset with `repository` and `number` columns.
/// The rows themselves are the durable marker.
#[derive(Debug, Clone, Default)]
pub struct RowCheckpoint {
    done: CheckpointSet<PullKey>,
}

impl RowCheckpoint {
    /// A missing dataset loads as empty. Rows whose key does not parse are ignored.
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let Some(table) = read_table(path)? else {
            engine_info!("No dataset at {:?}, starting fresh", path);
            return Ok(Self::default());
        };
        if table.header.is_empty() && table.records.is_empty() {
            return Ok(Self::default());
        }

        let column = |name: &str| {
            table.column(name).ok_or_else(|| HarvestError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
        };
        let repository = column(REPOSITORY_COLUMN)?;
        let number = column(NUMBER_COLUMN)?;

        let mut done = CheckpointSet::new();
        for row in table.rows() {
            let (Some(repo), Some(num)) = (row.get(repository), row.get(number)) else {
                continue;
            };
            match PullKey::parse(repo, num) {
                Ok(key) => {
                    done.mark_done(key);
                }
                Err(err) => engine_warn!("{:?}: ignoring row with bad key: {}", path, err),
            }
        }
        engine_info!("Found {} processed rows in {:?}", done.len(), path);
        Ok(Self { done })
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Repositories with at least one row.
    pub fn repositories(&self) -> CheckpointSet<RepoKey> {
        self.done.iter().map(|key| key.repository.clone()).collect()
    }
}

impl CheckpointStore<PullKey> for RowCheckpoint {
    fn is_done(&self, key: &PullKey) -> bool {
        self.done.is_done(key)
    }

    fn mark_done(&mut self, key: PullKey) -> Result<(), PersistError> {
        self.done.mark_done(key);
        Ok(())
    }
}
