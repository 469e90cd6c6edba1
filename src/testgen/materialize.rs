use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::discovery::SourceUnit;

/* ============================================================
   Public entry
   ============================================================ */

/// Writes accepted test code to `<out_dir>/<stem>_test.cpp`, replacing any
/// previous file for the same stem.
pub fn materialize_test(out_dir: &Path, unit: &SourceUnit, test_code: &str) -> io::Result<PathBuf> {
    let path = test_output_path(out_dir, &unit.path);
    ensure_parent_dir(&path)?;
    fs::write(&path, test_code)?;
    Ok(path)
}

/// `calc.cpp` and `calc.h` both map to `calc_test.cpp`.
pub fn test_output_path(out_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unit");
    out_dir.join(format!("{stem}_test.cpp"))
}

/* ============================================================
   Helpers
   ============================================================ */

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
