use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use engine_logging::engine_warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path:?} has header {found:?}, expected {expected:?}")]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl PersistError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Fail early if the directory is not writable.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

fn inner_error<W>(err: csv::IntoInnerError<W>) -> PersistError {
    let source = err.error();
    PersistError::Io(io::Error::new(source.kind(), source.to_string()))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Writer for the directory that holds `target`.
    pub fn for_target(target: &Path) -> Self {
        Self::new(parent_dir(target).to_path_buf())
    }

    pub fn write(
        &self,
        filename: &str,
        content: impl AsRef<[u8]>,
    ) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_ref())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Replaces `path` with `header` and `rows` in one rename. Rows are written as
/// given, whatever their width.
pub fn rewrite_csv<S: AsRef<str>>(
    path: &Path,
    header: &[S],
    rows: &[StringRecord],
) -> Result<(), PersistError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(Vec::new());
    writer
        .write_record(header.iter().map(AsRef::as_ref))
        .map_err(|err| PersistError::csv(path, err))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|err| PersistError::csv(path, err))?;
    }
    let bytes = writer.into_inner().map_err(inner_error)?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PersistError::OutputDir(format!("{path:?} has no file name")))?;
    AtomicFileWriter::for_target(path).write(filename, bytes)?;
    Ok(())
}

/// Append-only CSV destination.
///
/// Every call to `append*` reopens the file in append mode and syncs it before
/// returning, so rows written before a crash survive it.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    header: Vec<String>,
}

impl CsvSink {
    /// Creates the file with `header` if it is missing or empty. An existing file
    /// must carry the same header. A final line cut short by a crash is terminated
    /// so new rows start on their own line.
    pub fn open<S: AsRef<str>>(
        path: impl Into<PathBuf>,
        header: &[S],
    ) -> Result<Self, PersistError> {
        let path = path.into();
        let header: Vec<String> = header.iter().map(|c| c.as_ref().to_string()).collect();
        ensure_output_dir(parent_dir(&path))?;

        let existing_len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => 0,
            Err(err) => return Err(err.into()),
        };

        let sink = Self { path, header };
        if existing_len == 0 {
            sink.write_with(|writer| writer.write_record(&sink.header))?;
        } else {
            let found = read_header(&sink.path)?;
            if found != sink.header {
                return Err(PersistError::HeaderMismatch {
                    path: sink.path.clone(),
                    expected: sink.header.clone(),
                    found,
                });
            }
            terminate_torn_tail(&sink.path)?;
        }
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn append<S: Serialize>(&self, records: &[S]) -> Result<usize, PersistError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.write_with(|writer| {
            for record in records {
                writer.serialize(record)?;
            }
            Ok(())
        })?;
        Ok(records.len())
    }

    pub fn append_rows(&self, rows: &[StringRecord]) -> Result<usize, PersistError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.write_with(|writer| {
            for row in rows {
                writer.write_record(row)?;
            }
            Ok(())
        })?;
        Ok(rows.len())
    }

    fn write_with<F>(&self, write: F) -> Result<(), PersistError>
    where
        F: FnOnce(&mut csv::Writer<File>) -> Result<(), csv::Error>,
    {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        write(&mut writer).map_err(|err| PersistError::csv(&self.path, err))?;
        writer.flush()?;
        let file = writer.into_inner().map_err(inner_error)?;
        file.sync_data()?;
        Ok(())
    }
}

fn terminate_torn_tail(path: &Path) -> Result<(), PersistError> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        engine_warn!("{:?} ends mid-line, terminating the partial row", path);
        file.write_all(b"\n")?;
        file.sync_data()?;
    }
    Ok(())
}

fn reader_for(path: &Path) -> Result<csv::Reader<File>, PersistError> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| PersistError::csv(path, err))
}

fn read_header(path: &Path) -> Result<Vec<String>, PersistError> {
    let mut reader = reader_for(path)?;
    let header = reader
        .headers()
        .map_err(|err| PersistError::csv(path, err))?;
    Ok(header.iter().map(str::to_string).collect())
}

/// A whole CSV file held in memory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Vec<String>,
    /// Every readable row in file order, including ones of the wrong width.
    pub records: Vec<StringRecord>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    pub fn is_complete(&self, row: &StringRecord) -> bool {
        row.len() == self.header.len()
    }

    /// Rows as wide as the header. A row cut short by a crash is not among them.
    pub fn rows(&self) -> impl Iterator<Item = &StringRecord> {
        self.records.iter().filter(|row| self.is_complete(row))
    }
}

/// Reads every row of `path`; `None` when the file does not exist.
/// Rows of the wrong width are kept in `records` but not yielded by `rows()`.
pub fn read_table(path: &Path) -> Result<Option<Table>, PersistError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = reader_for(path)?;
    let header = reader
        .headers()
        .map_err(|err| PersistError::csv(path, err))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut table = Table {
        header,
        records: Vec::new(),
    };
    for (index, row) in reader.records().enumerate() {
        match row {
            Ok(row) => {
                if !table.is_complete(&row) {
                    engine_warn!(
                        "{:?} row {}: {} fields for {} columns, ignoring",
                        path,
                        index + 1,
                        row.len(),
                        table.header.len()
                    );
                }
                table.records.push(row);
            }
            Err(err) => {
                engine_warn!("{:?} row {}: unreadable, skipping ({})", path, index + 1, err)
            }
        }
    }
    Ok(Some(table))
}

/// Deserializes every row of `path`. A missing file reads as empty; rows that do
/// not parse, such as one torn by a crash, are skipped with a warning.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = reader_for(path)?;
    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<T>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(err) => {
                engine_warn!("{:?} row {}: unreadable, skipping ({})", path, index + 1, err)
            }
        }
    }
    Ok(records)
}
