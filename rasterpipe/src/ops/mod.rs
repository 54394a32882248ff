//! Raster operations shared by the tile generator and the task adapters.
//!
//! Every operation that writes a raster file follows the same reuse
//! protocol: when the destination already exists it is either reopened
//! as-is (`clear = false`) or deleted and regenerated (`clear = true`).
//! Reuse makes interrupted runs resumable without redoing finished work.

use std::path::Path;

use crate::raster::{BackendError, RasterBackend};

mod encode;
mod reproject;
mod write_raster;

pub use encode::{encode_image, EncodeOptions};
pub use reproject::{reproject, ReprojectOptions};
pub use write_raster::{write_raster, WriteOptions};

/// Decides whether an existing file at `path` should be reused.
///
/// With `clear = true` any existing file is removed and `false` is
/// returned, forcing regeneration. With `clear = false` the answer is
/// simply whether the file exists.
pub async fn reusable(path: &Path, clear: bool) -> Result<bool, BackendError> {
    let exists = tokio::fs::metadata(path).await.is_ok();
    if !exists {
        return Ok(false);
    }
    if clear {
        tokio::fs::remove_file(path)
            .await
            .map_err(|source| BackendError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(false);
    }
    Ok(true)
}

/// Creates the parent directory of `path` if it does not exist yet.
pub async fn ensure_parent(path: &Path) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BackendError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

/// A raster input for an operation: either a handle somebody else owns,
/// or a path the operation opens (and closes) itself.
pub enum SourceRef<'a, H> {
    Handle(&'a H),
    Path(&'a Path),
}

/// A resolved source. Owned handles (opened from a path) are released by
/// [`SourceGuard::release`]; borrowed ones are left to their owner.
pub struct SourceGuard<'a, B: RasterBackend> {
    borrowed: Option<&'a B::Handle>,
    owned: Option<B::Handle>,
}

impl<'a, B: RasterBackend> SourceGuard<'a, B> {
    pub fn handle(&self) -> &B::Handle {
        match (&self.borrowed, &self.owned) {
            (Some(h), _) => h,
            (None, Some(h)) => h,
            // resolve() always fills exactly one side
            (None, None) => unreachable!("empty source guard"),
        }
    }

    /// Closes the handle if this guard opened it.
    pub async fn release(self, backend: &B) -> Result<(), BackendError> {
        if let Some(handle) = self.owned {
            backend.close(handle).await?;
        }
        Ok(())
    }
}

/// Turns a [`SourceRef`] into a usable handle, opening the dataset when
/// given a path.
pub async fn resolve<'a, B: RasterBackend>(
    backend: &B,
    source: SourceRef<'a, B::Handle>,
) -> Result<SourceGuard<'a, B>, BackendError> {
    match source {
        SourceRef::Handle(handle) => Ok(SourceGuard {
            borrowed: Some(handle),
            owned: None,
        }),
        SourceRef::Path(path) => {
            let handle = backend.open(path).await?;
            Ok(SourceGuard {
                borrowed: None,
                owned: Some(handle),
            })
        }
    }
}
