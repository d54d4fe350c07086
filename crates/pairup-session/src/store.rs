//! File-backed persistence for the session handle and keyword.
//!
//! Two files live under the state directory:
//!
//! ```text
//! <state_dir>/handle.json   token, principal, role, participant id, expiry
//! <state_dir>/keyword       the session keyword, plain text
//! ```
//!
//! Each is written to a temporary sibling and renamed into place, so a
//! crash mid-write leaves either the old file or the new one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::SessionError;
use crate::session::HandleRecord;

const HANDLE_FILE: &str = "handle.json";
const KEYWORD_FILE: &str = "keyword";

#[derive(Debug, Clone)]
pub(crate) struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn read_handle(&self) -> Result<Option<HandleRecord>, SessionError> {
        match read_optional(&self.dir.join(HANDLE_FILE))? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(SessionError::Corrupt),
            None => Ok(None),
        }
    }

    pub fn write_handle(&self, record: &HandleRecord) -> Result<(), SessionError> {
        let json = serde_json::to_vec_pretty(record).map_err(SessionError::Corrupt)?;
        self.write_atomic(HANDLE_FILE, &json)
    }

    pub fn read_keyword(&self) -> Result<Option<String>, SessionError> {
        Ok(read_optional(&self.dir.join(KEYWORD_FILE))?
            .map(|raw| raw.trim().to_string())
            .filter(|kw| !kw.is_empty()))
    }

    pub fn write_keyword(&self, keyword: &str) -> Result<(), SessionError> {
        self.write_atomic(KEYWORD_FILE, keyword.as_bytes())
    }

    pub fn clear_handle(&self) -> Result<(), SessionError> {
        remove_optional(&self.dir.join(HANDLE_FILE))
    }

    pub fn clear_keyword(&self) -> Result<(), SessionError> {
        remove_optional(&self.dir.join(KEYWORD_FILE))
    }

    fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(".{name}.tmp"));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, self.dir.join(name))?;
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, SessionError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_optional(path: &Path) -> Result<(), SessionError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
