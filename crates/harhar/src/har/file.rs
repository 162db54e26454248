//! Reading and writing archive files.
//!
//! A path of `-` means standard input (for reads) or standard output (for
//! writes) instead of a file.

use super::model::Archive;
use crate::error::HarError;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

pub const STDIO_PATH: &str = "-";

pub fn parse_archive(text: &str, origin: &str) -> Result<Archive, HarError> {
    serde_json::from_str(text).map_err(|source| HarError::Json {
        path: origin.to_string(),
        source,
    })
}

pub fn read_archive<P: AsRef<Path>>(path: P) -> Result<Archive, HarError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let text = if origin == STDIO_PATH {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|source| HarError::Io {
                path: origin.clone(),
                source,
            })?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(|source| HarError::Io {
            path: origin.clone(),
            source,
        })?
    };

    let archive = parse_archive(&text, &origin)?;
    debug!(
        "Read archive {} with {} entries",
        origin,
        archive.log.entries.len()
    );
    Ok(archive)
}

pub fn write_archive<P: AsRef<Path>>(path: P, archive: &Archive) -> Result<(), HarError> {
    let path = path.as_ref();
    let target = path.display().to_string();
    let text = serde_json::to_string_pretty(archive).map_err(|source| HarError::Json {
        path: target.clone(),
        source,
    })?;

    let io_error = |source| HarError::Io {
        path: target.clone(),
        source,
    };

    if target == STDIO_PATH {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes()).map_err(io_error)?;
        stdout.write_all(b"\n").map_err(io_error)?;
        stdout.flush().map_err(io_error)?;
    } else {
        std::fs::write(path, text).map_err(io_error)?;
        info!(
            "Wrote {} entries to {}",
            archive.log.entries.len(),
            target
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::{Entry, Request, Response};

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.har");
        let archive = Archive::new(vec![Entry::new(
            Request::new("GET", "http://localhost/"),
            Response::default(),
        )]);

        write_archive(&path, &archive).unwrap();
        let loaded = read_archive(&path).unwrap();
        assert_eq!(loaded, archive);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_archive("/definitely/not/here.har").unwrap_err();
        assert!(matches!(err, HarError::Io { .. }));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_archive("{not json", "inline").unwrap_err();
        assert!(matches!(err, HarError::Json { .. }));
    }
}
