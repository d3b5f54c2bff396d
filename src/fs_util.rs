use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::KiraError;

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), KiraError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", parent.display())))?;

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.write_all(bytes)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.flush()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| KiraError::Filesystem(format!("write {}: {}", path.display(), err.error)))?;
    Ok(())
}
