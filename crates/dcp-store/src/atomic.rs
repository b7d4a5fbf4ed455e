use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::StoreError;

/// Write `bytes` to `path` atomically: a uniquely-named temp file in the
/// same directory, flushed, then renamed into place. A rename landing on a
/// pre-existing file (another writer won the race) is not distinguished
/// from success — content-addressing guarantees the target already holds
/// identical bytes whenever that can happen.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .expect("store paths always have a parent directory");
    fs_err::create_dir_all(dir).map_err(|e| {
        let e = StoreError::io("create directory", dir, e);
        debug!("{e}");
        e
    })?;

    let tmp_name = format!(".tmp-{}", nanoid::nanoid!());
    let tmp_path = dir.join(tmp_name);

    let mut file = fs_err::File::create(&tmp_path).map_err(|e| {
        let e = StoreError::io("create", &tmp_path, e);
        debug!("{e}");
        e
    })?;
    file.write_all(bytes).map_err(|e| {
        let e = StoreError::io("write", &tmp_path, e);
        debug!("{e}");
        e
    })?;
    file.sync_all().map_err(|e| {
        let e = StoreError::io("sync", &tmp_path, e);
        debug!("{e}");
        e
    })?;
    drop(file);

    fs_err::rename(&tmp_path, path).map_err(|e| {
        let e = StoreError::io("rename", path, e);
        debug!("{e}");
        e
    })?;
    Ok(())
}
