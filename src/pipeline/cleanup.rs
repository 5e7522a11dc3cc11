//! Scoped ownership of intermediate artifacts.
//!
//! Every file a pipeline creates besides the caller's final output is
//! registered here. Dropping the guard deletes all of them, on success, on
//! early return and on unwind alike.

use crate::format::FormatId;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

const PREFIX: &str = "eqconvert-";

#[derive(Debug)]
pub struct Intermediates {
    dir: Option<PathBuf>,
    temps: Vec<TempPath>,
    extra: Vec<PathBuf>,
}

impl Intermediates {
    /// Guard creating its files in `dir`, or the system temp dir when `None`.
    pub fn new(dir: Option<&Path>) -> Self {
        Self {
            dir: dir.map(Path::to_path_buf),
            temps: Vec::new(),
            extra: Vec::new(),
        }
    }

    /// Reserve a collision-resistant, initially empty file named
    /// `eqconvert-XXXXXX.<format>` and return its path.
    pub fn create(&mut self, format: &FormatId) -> io::Result<PathBuf> {
        let suffix = format!(".{format}");
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX).suffix(&suffix);
        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let temp = file.into_temp_path();
        let path = temp.to_path_buf();
        debug!("Reserved intermediate {}", path.display());
        self.temps.push(temp);
        Ok(path)
    }

    /// Take ownership of a file created by someone else (e.g. a `.bak`
    /// written while normalizing an intermediate).
    pub fn track(&mut self, path: PathBuf) {
        self.extra.push(path);
    }

    /// Number of files currently owned.
    pub fn len(&self) -> usize {
        self.temps.len() + self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Intermediates {
    fn drop(&mut self) {
        for path in self.extra.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        for temp in self.temps.drain(..) {
            let path = temp.to_path_buf();
            if let Err(e) = temp.close() {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove intermediate {}: {}", path.display(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn drop_removes_everything() {
        let dir = TempDir::new().unwrap();
        let fmt = FormatId::parse("html").unwrap();
        let (a, b, extra) = {
            let mut guard = Intermediates::new(Some(dir.path()));
            let a = guard.create(&fmt).unwrap();
            let b = guard.create(&fmt).unwrap();
            let extra = dir.path().join("work.html.bak");
            std::fs::write(&extra, b"x").unwrap();
            guard.track(extra.clone());
            assert_eq!(guard.len(), 3);
            assert!(a.exists() && b.exists());
            (a, b, extra)
        };
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(!extra.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn names_are_unique_and_suffixed() {
        let dir = TempDir::new().unwrap();
        let mut guard = Intermediates::new(Some(dir.path()));
        let fmt = FormatId::parse("csv").unwrap();
        let a = guard.create(&fmt).unwrap();
        let b = guard.create(&fmt).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "csv");
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(PREFIX));
    }

    #[test]
    fn already_removed_files_are_fine() {
        let dir = TempDir::new().unwrap();
        let mut guard = Intermediates::new(Some(dir.path()));
        let a = guard.create(&FormatId::parse("txt").unwrap()).unwrap();
        std::fs::remove_file(&a).unwrap();
        guard.track(dir.path().join("never-created"));
        drop(guard);
    }
}
