//! discovery.rs
//!
//! Finds `.h` / `.cpp` files under the codebase directory and turns each
//! one into a `SourceUnit`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UnitKind {
    Header,
    Implementation,
}

impl UnitKind {
    pub fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("h") => Some(UnitKind::Header),
            Some("cpp") => Some(UnitKind::Implementation),
            _ => None,
        }
    }

    fn companion_extension(self) -> &'static str {
        match self {
            UnitKind::Header => "cpp",
            UnitKind::Implementation => "h",
        }
    }
}

/// One discovered source file. Immutable for the duration of a pipeline run.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub kind: UnitKind,
    pub content: String,
    /// The other half of the header/implementation pair, if present on disk.
    pub companion: Option<PathBuf>,
    /// Symbols the generated tests must call.
    pub symbols: Vec<String>,
}

impl SourceUnit {
    pub fn new(path: PathBuf, content: String, symbols: Vec<String>) -> Option<Self> {
        let kind = UnitKind::of(&path)?;
        let candidate = companion_path(&path, kind);
        let companion = candidate.is_file().then_some(candidate);

        Some(Self {
            path,
            kind,
            content,
            companion,
            symbols,
        })
    }

    pub fn is_paired(&self) -> bool {
        self.companion.is_some()
    }

    /// The `.cpp` half: compiled and measured for coverage.
    pub fn implementation_path(&self) -> Option<&Path> {
        match self.kind {
            UnitKind::Implementation => Some(&self.path),
            UnitKind::Header => self.companion.as_deref(),
        }
    }

    /// The `.h` half: copied next to the test and included by it.
    pub fn header_path(&self) -> Option<&Path> {
        match self.kind {
            UnitKind::Header => Some(&self.path),
            UnitKind::Implementation => self.companion.as_deref(),
        }
    }

    /// Base name of the header (`calc.h`), even when the header is missing.
    pub fn header_name(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("example");
        format!("{stem}.h")
    }

    pub fn display_name(&self) -> String {
        self.path.display().to_string()
    }
}

pub fn companion_path(path: &Path, kind: UnitKind) -> PathBuf {
    path.with_extension(kind.companion_extension())
}

/* ============================================================
   Public API
   ============================================================ */

/// Reads every `.h` / `.cpp` file under `root`. Any walk or read error
/// aborts discovery.
pub fn read_codebase(root: &Path, symbols: &[String]) -> io::Result<Vec<SourceUnit>> {
    tracing::info!("Reading codebase directory: {}", root.display());

    let mut units = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            e.into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg))
        })?;

        if !entry.file_type().is_file() || UnitKind::of(entry.path()).is_none() {
            continue;
        }

        let path = entry.into_path();
        tracing::debug!("Found file: {}", path.display());

        // Non-UTF-8 bytes (a Latin-1 comment, say) are replaced, not fatal.
        let content = String::from_utf8_lossy(&fs::read(&path)?).into_owned();
        tracing::debug!("Read {} ({} bytes)", path.display(), content.len());

        if let Some(unit) = SourceUnit::new(path, content, symbols.to_vec()) {
            units.push(unit);
        }
    }

    tracing::info!("Found {} files in codebase", units.len());
    Ok(units)
}
