//! Migration file collection

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use walkdir::WalkDir;

/// Expand the command-line paths into `.sql` files
///
/// Files are taken as given. Directories are walked recursively and their
/// `.sql` files added in sorted order. A path that does not exist is an
/// error.
pub fn collect_sql_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_sql(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("{} not found", path.display());
        }
    }

    Ok(files)
}

fn is_sql(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("sql"))
        .unwrap_or(false)
}

/// Path as shown in reports and matched against the allowlist
pub fn display_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
