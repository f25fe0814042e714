//! Employee registry.
//!
//! One directory per employee under the employees root, holding
//! `employee.json` metadata plus the registration face image. The
//! external recognizer indexes the same directory tree, so layout is
//! contract, not convenience. Entries are immutable once written.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{Local, Timelike};
use thiserror::Error;

use crate::types::Employee;

/// Metadata file name inside each employee directory.
pub const METADATA_FILE: &str = "employee.json";

const MAX_ID_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("invalid employee id {0:?}: use 1-{MAX_ID_LEN} characters from [A-Za-z0-9_-]")]
    InvalidId(String),
    #[error("employee name must not be empty")]
    EmptyName,
    #[error("employee {0:?} is already registered")]
    AlreadyRegistered(String),
    #[error("employee {0:?} is not registered")]
    NotFound(String),
    #[error("roster I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad employee metadata at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Check an operator-supplied employee id.
///
/// The id becomes a directory name, so the charset is restricted: no
/// separators, no dots, nothing that could escape the employees root.
pub fn validate_id(id: &str) -> Result<(), RosterError> {
    let ok = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(RosterError::InvalidId(id.to_string()))
    }
}

/// Handle to the employees directory.
pub struct Roster {
    root: PathBuf,
}

impl Roster {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn employee_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Register a new employee with their face image.
    ///
    /// Fails without touching the filesystem on an invalid id, empty
    /// name, or an id that already exists. The face image is written
    /// before the metadata, so a half-written entry has no metadata and
    /// is skipped (with a warning) by [`Roster::list`].
    pub fn register(
        &self,
        id: &str,
        name: &str,
        image: &[u8],
        image_ext: &str,
    ) -> Result<Employee, RosterError> {
        validate_id(id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }

        let dir = self.employee_dir(id);
        if dir.exists() {
            return Err(RosterError::AlreadyRegistered(id.to_string()));
        }
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let mut ext = image_ext.trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() {
            ext = "img".to_string();
        }
        let face_path = dir.join(format!("face.{ext}"));
        fs::write(&face_path, image).map_err(|e| io_err(&face_path, e))?;

        let registered_at = Local::now().naive_local();
        let employee = Employee {
            id: id.to_string(),
            name: name.to_string(),
            registered_at: registered_at.with_nanosecond(0).unwrap_or(registered_at),
        };

        let meta_path = dir.join(METADATA_FILE);
        let meta = serde_json::to_vec_pretty(&employee).map_err(|e| RosterError::Malformed {
            path: meta_path.clone(),
            source: e,
        })?;
        fs::write(&meta_path, meta).map_err(|e| io_err(&meta_path, e))?;

        tracing::info!(id, name, face = %face_path.display(), "registered employee");
        Ok(employee)
    }

    /// Look up one employee by id.
    pub fn get(&self, id: &str) -> Result<Employee, RosterError> {
        if validate_id(id).is_err() {
            return Err(RosterError::NotFound(id.to_string()));
        }
        let dir = self.employee_dir(id);
        match read_employee(&dir) {
            Err(RosterError::Io { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
                Err(RosterError::NotFound(id.to_string()))
            }
            other => other,
        }
    }

    /// All registered employees, sorted by id.
    ///
    /// A missing employees directory is an empty roster, not an error.
    /// Entries with unreadable or mismatched metadata are skipped with a
    /// warning, mirroring the record store's read policy.
    pub fn list(&self) -> Result<Vec<Employee>, RosterError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.root, e)),
        };

        let mut employees = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            match read_employee(&path) {
                Ok(employee) if employee.id == dir_name => employees.push(employee),
                Ok(employee) => tracing::warn!(
                    dir = %path.display(),
                    id = %employee.id,
                    "employee metadata id does not match its directory; skipping"
                ),
                Err(e) => tracing::warn!(
                    dir = %path.display(),
                    error = %e,
                    "skipping unreadable roster entry"
                ),
            }
        }

        employees.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(employees)
    }
}

fn read_employee(dir: &Path) -> Result<Employee, RosterError> {
    let path = dir.join(METADATA_FILE);
    let bytes = fs::read(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| RosterError::Malformed { path, source: e })
}

fn io_err(path: &Path, source: std::io::Error) -> RosterError {
    RosterError::Io {
        path: path.to_path_buf(),
        source,
    }
}
