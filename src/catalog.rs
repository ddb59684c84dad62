//! Raw catalog ingestion.
//!
//! Reads the upstream anime CSV, checks that the title/genre/synopsis columns
//! exist, drops incomplete rows and writes a cleaned table holding one labelled
//! document per title.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::CatalogError;

/// Header of the single column in the cleaned table.
pub const DOCUMENT_COLUMN: &str = "document";

/// Column names the raw catalog must provide.
///
/// The defaults match the upstream dataset verbatim, including its
/// `sypnopsis` spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumns {
    /// Column holding the title.
    pub title: String,
    /// Column holding the free-form genre list.
    pub genres: String,
    /// Column holding the synopsis.
    pub synopsis: String,
}

impl Default for CatalogColumns {
    fn default() -> Self {
        Self {
            title: "Name".to_string(),
            genres: "Genres".to_string(),
            synopsis: "sypnopsis".to_string(),
        }
    }
}

impl CatalogColumns {
    /// Resolves header positions, failing with every missing column name.
    fn locate(&self, headers: &StringRecord) -> Result<[usize; 3], CatalogError> {
        let position = |name: &str| headers.iter().position(|header| header == name);
        let wanted = [&self.title, &self.genres, &self.synopsis];
        let found = wanted.map(|name| position(name.as_str()));
        let missing: Vec<String> = wanted
            .iter()
            .zip(found.iter())
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        match found {
            [Some(title), Some(genres), Some(synopsis)] => Ok([title, genres, synopsis]),
            _ => Err(CatalogError::MissingColumns { missing }),
        }
    }
}

/// One validated catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    /// Anime title.
    pub title: String,
    /// Genre list as written in the catalog.
    pub genres: String,
    /// Plot synopsis.
    pub synopsis: String,
}

impl CatalogRow {
    /// Trims the fields and returns `None` if any of them is empty.
    pub fn new(title: &str, genres: &str, synopsis: &str) -> Option<Self> {
        let (title, genres, synopsis) = (title.trim(), genres.trim(), synopsis.trim());
        if title.is_empty() || genres.is_empty() || synopsis.is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            genres: genres.to_string(),
            synopsis: synopsis.to_string(),
        })
    }

    /// Renders the labelled document for this row.
    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument::from_row(self)
    }
}

/// Labelled text document built from a [`CatalogRow`]; the unit of indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDocument(String);

impl CatalogDocument {
    /// Formats `row` with the fixed label layout.
    pub fn from_row(row: &CatalogRow) -> Self {
        Self(format_document(&row.title, &row.genres, &row.synopsis))
    }

    /// Document text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the document and returns its text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CatalogDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed `Title` / `Genres` / `Synopsis` layout shared by every document.
pub fn format_document(title: &str, genres: &str, synopsis: &str) -> String {
    format!("Title: {title}\nGenres: {genres}\nSynopsis: {synopsis}")
}

/// Outcome of a catalog load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Path of the cleaned table.
    pub output: PathBuf,
    /// Documents written.
    pub documents: usize,
    /// Rows dropped because a required field was missing or blank.
    pub dropped: usize,
    /// Rows skipped because they could not be parsed.
    pub malformed: usize,
}

/// Converts the raw catalog into the cleaned document table.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    source: PathBuf,
    destination: PathBuf,
    columns: CatalogColumns,
}

impl CatalogLoader {
    /// Loader reading `source` and writing the cleaned table to `destination`.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            columns: CatalogColumns::default(),
        }
    }

    /// Overrides the required column names.
    pub fn with_columns(mut self, columns: CatalogColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Raw catalog path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Cleaned table path.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Writes the cleaned table and returns its path.
    pub fn load_and_process(&self) -> Result<PathBuf, CatalogError> {
        self.process().map(|report| report.output)
    }

    /// Writes the cleaned table and returns row counts alongside its path.
    ///
    /// Nothing is written when a required column is missing. The table is
    /// staged next to the destination and only replaces an existing file once
    /// the whole catalog has been read. Rows with more fields than the header
    /// count as malformed and are skipped.
    pub fn process(&self) -> Result<LoadReport, CatalogError> {
        let read_err = |source: csv::Error| CatalogError::Read {
            path: self.source.clone(),
            source,
        };
        let write_err = |source: csv::Error| CatalogError::Write {
            path: self.destination.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.source)
            .map_err(read_err)?;
        let headers = reader.headers().map_err(read_err)?.clone();
        let [title, genres, synopsis] = self.columns.locate(&headers)?;

        let parent = match self.destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|err| write_err(err.into()))?;
        let staged = NamedTempFile::new_in(parent).map_err(|err| write_err(err.into()))?;
        let mut writer = csv::Writer::from_writer(staged.as_file());
        writer.write_record([DOCUMENT_COLUMN]).map_err(write_err)?;

        let mut documents = 0usize;
        let mut dropped = 0usize;
        let mut malformed = 0usize;
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(err) if err.is_io_error() => return Err(read_err(err)),
                Err(err) => {
                    malformed += 1;
                    warn!(row = line + 1, error = %err, "skipping malformed catalog row");
                    continue;
                }
            };
            if record.len() > headers.len() {
                malformed += 1;
                warn!(
                    row = line + 1,
                    fields = record.len(),
                    expected = headers.len(),
                    "skipping catalog row with extra fields"
                );
                continue;
            }
            let field = |pos: usize| record.get(pos).unwrap_or("");
            match CatalogRow::new(field(title), field(genres), field(synopsis)) {
                Some(row) => {
                    writer
                        .write_record([row.to_document().as_str()])
                        .map_err(write_err)?;
                    documents += 1;
                }
                None => dropped += 1,
            }
        }
        writer.flush().map_err(|err| write_err(err.into()))?;
        drop(writer);
        staged
            .as_file()
            .sync_all()
            .map_err(|err| write_err(err.into()))?;
        staged
            .persist(&self.destination)
            .map_err(|err| write_err(err.error.into()))?;

        let report = LoadReport {
            output: self.destination.clone(),
            documents,
            dropped,
            malformed,
        };
        info!(
            source = %self.source.display(),
            output = %report.output.display(),
            documents,
            dropped,
            malformed,
            "catalog processed"
        );
        Ok(report)
    }
}
