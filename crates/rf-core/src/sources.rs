//! The newline-delimited list of feed sources.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One source per line: a URL or a shell command line.
#[derive(Debug, Clone)]
pub struct SourceList {
    path: PathBuf,
}

impl SourceList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sources in file order, blank lines and repeats dropped. A missing file
    /// is an empty list.
    pub fn read(&self) -> io::Result<Vec<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut sources: Vec<String> = Vec::new();
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !sources.iter().any(|s| s == line) {
                sources.push(line.to_string());
            }
        }
        Ok(sources)
    }

    pub fn append(&self, source: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", source.trim())
    }

    /// Rewrite the file without any line equal to `source`. Returns whether
    /// something was removed.
    pub fn remove(&self, source: &str) -> io::Result<bool> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        let source = source.trim();
        let kept: Vec<&str> = contents.lines().filter(|l| l.trim() != source).collect();
        if kept.len() == contents.lines().count() {
            return Ok(false);
        }
        let mut rewritten = kept.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }
        fs::write(&self.path, rewritten)?;
        Ok(true)
    }
}
