//! Collision-safe naming for generated files.
//!
//! When a target filename is taken, the next free name is found by inserting a numeric
//! disambiguator before the extension: `name.yaml`, `name-1.yaml`, `name-2.yaml`, ...
//! With `force_overwrite` the first candidate is returned even if it exists.

use std::path::{Path, PathBuf};

/// Pick a path in `dir` for `stem` + `extension` (`extension` includes the dot, or is empty).
#[must_use]
pub fn next_available_path(
    dir: &Path,
    stem: &str,
    extension: &str,
    force_overwrite: bool,
) -> PathBuf {
    let first = dir.join(format!("{stem}{extension}"));
    if force_overwrite || !first.exists() {
        return first;
    }

    let mut n: u32 = 1;
    loop {
        let candidate = dir.join(format!("{stem}-{n}{extension}"));
        if !candidate.exists() {
            tracing::debug!(path = %candidate.display(), "target exists, using disambiguated name");
            return candidate;
        }
        n += 1;
    }
}

/// Pick a path in `dir` for `file_name`, splitting the extension off its last dot.
#[must_use]
pub fn available_file_path(dir: &Path, file_name: &str, force_overwrite: bool) -> PathBuf {
    let (stem, extension) = split_extension(file_name);
    next_available_path(dir, stem, extension, force_overwrite)
}

/// Pick a path next to `file` named `<file name><suffix>`, e.g. `pets.yaml-config.yaml`.
#[must_use]
pub fn adjacent_file_path(file: &Path, suffix: &str, force_overwrite: bool) -> PathBuf {
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    let base = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (suffix_stem, extension) = split_extension(suffix);
    next_available_path(dir, &format!("{base}{suffix_stem}"), extension, force_overwrite)
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}
