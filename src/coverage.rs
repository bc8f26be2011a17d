//! Offline coverage check of the pattern catalog against a payload corpus.
//!
//! A corpus is a directory tree of `*.txt` files with one payload per line,
//! e.g. a checkout of a public SQL-injection payload list. Files whose path
//! carries a dialect marker (`MSSQL`, `MySQL`, `PostgresSQL`, `Oracle`, `DB2`,
//! `NoSQL`) are only read when that dialect is enabled.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::detect;
use crate::dialect::{Dialect, DialectSet};
use crate::error::Result;

fn marker(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::MsSql => "MSSQL",
        Dialect::MySql => "MySQL",
        Dialect::PgSql => "PostgresSQL",
        Dialect::Oracle => "Oracle",
        Dialect::Db2 => "DB2",
        Dialect::NoSql => "NoSQL",
    }
}

/// Summary of one corpus run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    /// Payload files read.
    pub files: usize,
    /// Distinct non-empty payloads tested.
    pub checked: usize,
    /// Payloads no pattern matched, sorted.
    pub missed: Vec<String>,
}

impl CoverageReport {
    pub fn detected(&self) -> usize {
        self.checked - self.missed.len()
    }

    /// Write the missed payloads to `path`, one per line.
    pub fn write_missed(&self, path: &Path) -> Result<()> {
        let mut out = self.missed.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }
}

/// Whether `path` belongs to a dialect outside `dialects`.
fn excluded(path: &Path, dialects: DialectSet) -> bool {
    let path = path.to_string_lossy();
    dialects
        .complement()
        .iter()
        .any(|d| path.contains(marker(d)))
}

fn collect_txt_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_txt_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "txt") {
            out.push(path);
        }
    }
    Ok(())
}

/// Run every payload under `dir` through the detector for `dialects`.
pub fn check_corpus(dir: &Path, dialects: DialectSet) -> Result<CoverageReport> {
    let mut files = Vec::new();
    collect_txt_files(dir, &mut files)?;
    files.sort();

    let mut report = CoverageReport::default();
    let mut payloads = BTreeSet::new();
    for file in &files {
        if excluded(file.strip_prefix(dir).unwrap_or(file), dialects) {
            debug!(file = %file.display(), "Skipping payload file for disabled dialect");
            continue;
        }
        report.files += 1;
        let content = std::fs::read_to_string(file)?;
        payloads.extend(
            content
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }

    report.checked = payloads.len();
    report.missed = payloads
        .into_iter()
        .filter(|payload| !detect::is_match(payload, dialects))
        .collect();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_follow_file_names() {
        let mssql_only = DialectSet::only(Dialect::MsSql);
        assert!(!excluded(Path::new("Datas/Generic/MSSQL-Auth.txt"), mssql_only));
        assert!(excluded(Path::new("Datas/MySQL/blind.txt"), mssql_only));
        assert!(excluded(Path::new("Datas/PostgresSQL.txt"), mssql_only));
        assert!(!excluded(Path::new("Datas/Generic/error-based.txt"), mssql_only));
        assert!(!excluded(Path::new("Datas/NoSQL.txt"), DialectSet::all()));
    }

    #[test]
    fn report_counts() {
        let report = CoverageReport {
            files: 2,
            checked: 5,
            missed: vec!["a".into(), "b".into()],
        };
        assert_eq!(report.detected(), 3);
    }

    #[test]
    fn write_missed_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missed.txt");
        let report = CoverageReport {
            files: 1,
            checked: 3,
            missed: vec!["abc".into(), "def".into()],
        };
        report.write_missed(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc\ndef\n");
    }
}
