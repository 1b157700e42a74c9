use std::io;
use std::path::{Component, Path, PathBuf};

/// Canonicalize a path, stripping the Windows extended path prefix (\\?\) if present.
/// On Windows, std::fs::canonicalize returns paths with this prefix, which breaks
/// exact string comparison against paths git reports.
pub fn safe_canonicalize(path: &Path) -> io::Result<PathBuf> {
    let canonical = std::fs::canonicalize(path)?;
    Ok(strip_extended_path_prefix(canonical))
}

/// Strip the Windows extended path prefix (\\?\) from a path.
#[cfg(windows)]
pub fn strip_extended_path_prefix(path: PathBuf) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        path
    }
}

#[cfg(not(windows))]
pub fn strip_extended_path_prefix(path: PathBuf) -> PathBuf {
    path
}

/// Normalize a path that may not exist yet.
///
/// The deepest existing ancestor is canonicalized (resolving symlinks) and the
/// remaining components are appended lexically, dropping `.` and popping on `..`.
/// Existing paths are simply canonicalized.
pub fn normalize_path(path: &Path) -> io::Result<PathBuf> {
    if path.exists() {
        return safe_canonicalize(path);
    }

    let cleaned = lexical_clean(path);
    let mut existing = cleaned.clone();
    let mut pending = Vec::new();
    while !existing.exists() {
        let Some(name) = existing.file_name() else {
            return Ok(cleaned);
        };
        pending.push(name.to_os_string());
        if !existing.pop() {
            return Ok(cleaned);
        }
    }

    let mut normalized = safe_canonicalize(&existing)?;
    for name in pending.into_iter().rev() {
        normalized.push(name);
    }
    Ok(normalized)
}

fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
