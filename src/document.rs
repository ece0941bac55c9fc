// document.rs - Reading and atomically writing on-disk artifacts

use crate::error::{ElevateError, Result};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Return true if `path` exists and is a regular file.
pub fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Return true if the directory containing `path` exists.
pub fn parent_exists(path: &Path) -> bool {
    path.parent().map(|p| p.is_dir()).unwrap_or(false)
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ElevateError::io(path, e))
}

/// Parse a JSON artifact that must hold an object.
///
/// A parse failure here is fatal, unlike config loading.
pub fn parse_object(path: &Path, raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).map_err(|source| ElevateError::MalformedDocument {
            path: path.to_path_buf(),
            source,
        })?;
    if !value.is_object() {
        return Err(ElevateError::NotAnObject {
            path: path.to_path_buf(),
        });
    }
    Ok(value)
}

pub fn read_object(path: &Path) -> Result<(String, Value)> {
    let raw = read_text(path)?;
    let value = parse_object(path, &raw)?;
    Ok((raw, value))
}

/// Compact JSON with key order preserved.
pub fn to_compact(value: &Value) -> String {
    // Serializing a Value cannot fail: all map keys are strings.
    serde_json::to_string(value).unwrap_or_default()
}

/// Atomically replace `path` with `contents` via tempfile + rename.
///
/// Existing files keep their permission bits; new files get 0644. A symlink
/// is written through: its target is replaced and the link stays.
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let resolved = resolve_link(path)?;
    let path = resolved.as_path();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| ElevateError::io(parent, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| ElevateError::io(tmp.path(), e))?;

    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(perms) = permissions {
        fs::set_permissions(tmp.path(), perms).map_err(|e| ElevateError::io(tmp.path(), e))?;
    }

    tmp.persist(path).map_err(|e| ElevateError::io(path, e.error))?;
    Ok(())
}

const MAX_LINK_DEPTH: usize = 40;

/// Follow symlinks at `path` to the file that should actually be replaced.
/// The final target need not exist yet.
fn resolve_link(path: &Path) -> Result<PathBuf> {
    let mut current = path.to_path_buf();
    for _ in 0..MAX_LINK_DEPTH {
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(&current).map_err(|e| ElevateError::io(&current, e))?;
                current = match current.parent() {
                    Some(dir) if target.is_relative() => dir.join(target),
                    _ => target,
                };
            }
            _ => return Ok(current),
        }
    }
    Err(ElevateError::io(
        path,
        std::io::Error::new(std::io::ErrorKind::Other, "too many levels of symbolic links"),
    ))
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
