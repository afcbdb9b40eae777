//! Single-line sysfs and procfs node helpers
//!
//! Kernel control nodes hold one line of text. Reads return that line
//! without its terminator; writes replace it.

mod nodes;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub use nodes::{vibrator_present, KernelControl, VibratorStrength};

use crate::settings::SettingsError;

#[derive(Debug, thiserror::Error)]
pub enum SysfsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} does not hold a number: {value:?}")]
    Parse { path: PathBuf, value: String },

    #[error("{0} is not supported on this device")]
    Unsupported(PathBuf),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Read the first line of a node
pub fn read_one_line(path: &Path) -> Result<String, SysfsError> {
    let read_err = |source| SysfsError::Read {
        path: path.to_owned(),
        source,
    };

    let file = File::open(path).map_err(read_err)?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).map_err(read_err)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Write one line to a node
pub fn write_line(path: &Path, value: &str) -> Result<(), SysfsError> {
    fs::write(path, format!("{value}\n")).map_err(|source| SysfsError::Write {
        path: path.to_owned(),
        source,
    })
}

pub fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && !meta.permissions().readonly())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_round_trip_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("enable");

        assert_ok!(write_line(&node, "1"));
        assert_eq!(assert_ok!(read_one_line(&node)), "1");
        assert!(is_writable(&node));
    }

    #[test]
    fn test_only_first_line_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("level");
        fs::write(&node, "2088\r\nignored\n").unwrap();

        assert_eq!(read_one_line(&node).unwrap(), "2088");
    }

    #[test]
    fn test_missing_node() {
        let node = Path::new("/nonexistent/proc/touchpanel/camera_enable");
        assert!(matches!(
            assert_err!(read_one_line(node)),
            SysfsError::Read { .. }
        ));
        assert!(!is_writable(node));
    }
}
