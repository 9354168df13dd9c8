use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::Result;

/// Why a document could not be read. Callers decide which of these are "normal".
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("document not found")]
    NotFound,

    #[error("document unreadable: {0}")]
    Unreadable(io::Error),

    #[error("document malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> std::result::Result<T, LoadError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(LoadError::NotFound),
        Err(e) => return Err(LoadError::Unreadable(e)),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Load a document, substituting `default` when it is missing or broken.
pub fn load_or_default<T: DeserializeOwned>(path: &Path, default: T) -> T {
    match read_json(path) {
        Ok(value) => value,
        Err(LoadError::NotFound) => default,
        Err(e) => {
            tracing::debug!("Using default for {:?}: {}", path, e);
            default
        }
    }
}

/// Write `value` as indented JSON next to `path`, then rename it into place.
pub fn save_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
