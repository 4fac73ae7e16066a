//! Recognizing and rewriting `IMPORT ... FROM LOCAL CSV` statements.

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};

use crate::error::ImportError;

/// Resource name the rewritten statement asks the server to fetch.
pub const IMPORT_FILE_NAME: &str = "data.csv";

static LOCAL_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*IMPORT\s+INTO\b.*\bFROM\s+LOCAL\s+CSV\b")
        .expect("local import pattern is valid")
});

static IMPORT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*IMPORT\b").expect("import prefix pattern is valid"));

static LOCAL_CSV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bLOCAL\s+CSV\b").expect("local csv pattern is valid"));

static FILE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bFILE\s+(?:'(?P<single>[^']*)'|"(?P<double>[^"]*)") ?"#)
        .expect("file clause pattern is valid")
});

static ROW_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bROW\s+SEPARATOR\s*=\s*['"]?\s*([A-Za-z]+)"#)
        .expect("row separator pattern is valid")
});

/// Whether `sql` loads client-local files.
pub fn is_import_query(sql: &str) -> bool {
    LOCAL_IMPORT.is_match(sql)
}

/// Every quoted path following a `FILE` keyword, in statement order.
pub fn file_paths(sql: &str) -> Result<Vec<String>, ImportError> {
    if !IMPORT_PREFIX.is_match(sql) {
        return Err(ImportError::InvalidImportQuery);
    }

    let paths: Vec<String> = FILE_CLAUSE
        .captures_iter(sql)
        .filter_map(|caps| {
            caps.name("single")
                .or_else(|| caps.name("double"))
                .map(|m| m.as_str().to_string())
        })
        .collect();

    if paths.is_empty() {
        return Err(ImportError::InvalidImportQuery);
    }
    Ok(paths)
}

/// Line terminator declared by an import statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowSeparator {
    #[default]
    Lf,
    Cr,
    CrLf,
}

impl RowSeparator {
    /// The separator declared in `sql`, `LF` when none is recognized.
    pub fn from_query(sql: &str) -> Self {
        ROW_SEPARATOR
            .captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|m| match m.as_str().to_ascii_uppercase().as_str() {
                "CRLF" => RowSeparator::CrLf,
                "CR" => RowSeparator::Cr,
                _ => RowSeparator::Lf,
            })
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowSeparator::Lf => "\n",
            RowSeparator::Cr => "\r",
            RowSeparator::CrLf => "\r\n",
        }
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

impl fmt::Display for RowSeparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RowSeparator::Lf => "LF",
            RowSeparator::Cr => "CR",
            RowSeparator::CrLf => "CRLF",
        };
        f.write_str(name)
    }
}

/// Point a local import at the HTTP listener on `host:port`.
///
/// `LOCAL CSV` becomes `CSV AT 'http://host:port'` and all `FILE` clauses
/// collapse into one `FILE 'data.csv'`. Everything else is kept as written.
pub fn rewrite_import_query(sql: &str, host: &str, port: u16) -> String {
    let address = if host.contains(':') {
        format!("http://[{}]:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    };

    let mut first = true;
    let collapsed = FILE_CLAUSE.replace_all(sql, |_: &Captures<'_>| {
        if std::mem::take(&mut first) {
            format!("FILE '{}' ", IMPORT_FILE_NAME)
        } else {
            String::new()
        }
    });

    let target = format!("CSV AT '{}'", address);
    LOCAL_CSV
        .replace(&collapsed, NoExpand(&target))
        .into_owned()
}
