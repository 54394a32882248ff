//! Image encoding of rasters into PNG or JPEG files.
//!
//! Works on either a single raster or a tile map: a tile map keeps its
//! `band-z-x-y` layout under a separate image folder, a single raster
//! becomes one image file named after its source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coord::TileId;
use crate::pipeline::{Artifact, RasterData, TaskData};
use crate::raster::{BackendError, EncodeParams, RasterBackend, RasterFormat};

use super::{ensure_parent, reusable};

/// Parameters for [`encode_image`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Delete existing images instead of keeping them.
    pub clear: bool,
    /// Output image format; [`RasterFormat::GTiff`] is rejected.
    pub format: RasterFormat,
    /// JPEG quality, ignored for PNG.
    pub quality: u8,
    /// Subfolder the images land in.
    pub image_folder: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            clear: true,
            format: RasterFormat::Png,
            quality: 90,
            image_folder: "png".to_string(),
        }
    }
}

impl EncodeOptions {
    fn params(&self) -> EncodeParams {
        EncodeParams {
            quality: self.quality,
        }
    }
}

fn image_path(folder: &Path, subfolder: &str, id: &TileId, extension: &str) -> PathBuf {
    let mut path = folder.join(subfolder);
    if !id.band.is_empty() {
        path = path.join(&id.band);
    }
    path.join(id.coord.z.to_string())
        .join(id.coord.x.to_string())
        .join(format!("{}.{}", id.coord.y, extension))
}

/// Encodes the raster(s) carried by `data` as images under `folder`.
///
/// A tile-map artifact yields a tile map of image paths with all handles
/// closed; a single raster yields one image path plus an open handle to
/// the encoded dataset.
pub async fn encode_image<B: RasterBackend>(
    backend: &B,
    data: &mut TaskData<B::Handle>,
    folder: &Path,
    options: &EncodeOptions,
) -> Result<(), BackendError> {
    if matches!(options.format, RasterFormat::GTiff) {
        return Err(BackendError::UnsupportedFormat("GTiff".to_string()));
    }
    let extension = options.format.extension();

    match data.artifact.clone() {
        Artifact::Tiles(sources) => {
            // a stray handle from an earlier stage is no longer needed
            if let RasterData::Single(handle) = data.data.take() {
                backend.close(handle).await?;
            }
            let mut images = BTreeMap::new();
            for (id, source) in &sources {
                let path = image_path(folder, &options.image_folder, id, extension);
                if reusable(&path, options.clear).await? {
                    images.insert(id.clone(), path);
                    continue;
                }
                ensure_parent(&path).await?;
                let src = backend.open(source).await?;
                let result = backend
                    .encode(&src, &path, options.format, options.params())
                    .await;
                backend.close(src).await?;
                backend.close(result?).await?;
                images.insert(id.clone(), path);
            }
            debug!(count = images.len(), format = extension, "encoded tile images");
            data.artifact = Artifact::Tiles(images);
            data.data = RasterData::None;
        }
        artifact => {
            let stem = artifact
                .primary_path()
                .and_then(|p| p.file_stem())
                .and_then(|s| s.to_str())
                .unwrap_or("raster")
                .to_string();
            let path = folder
                .join(&options.image_folder)
                .join(format!("{stem}.{extension}"));

            if reusable(&path, options.clear).await? {
                if let RasterData::Single(handle) = data.data.take() {
                    backend.close(handle).await?;
                }
                data.artifact = Artifact::Path(path.clone());
                data.data = RasterData::Single(backend.open(&path).await?);
                return Ok(());
            }
            ensure_parent(&path).await?;

            let encoded = match data.data.take() {
                RasterData::Single(handle) => {
                    let encoded = backend
                        .encode(&handle, &path, options.format, options.params())
                        .await?;
                    backend.close(handle).await?;
                    encoded
                }
                RasterData::None => {
                    let source = artifact
                        .primary_path()
                        .ok_or_else(|| BackendError::Open {
                            path: folder.to_path_buf(),
                            message: "nothing to encode".to_string(),
                        })?;
                    let src = backend.open(source).await?;
                    let result = backend
                        .encode(&src, &path, options.format, options.params())
                        .await;
                    backend.close(src).await?;
                    result?
                }
                RasterData::Tiles(_) => {
                    return Err(BackendError::UnsupportedFormat(
                        "tile handles without a tile-map artifact".to_string(),
                    ))
                }
            };
            debug!(path = %path.display(), format = extension, "encoded image");
            data.artifact = Artifact::Path(path);
            data.data = RasterData::Single(encoded);
        }
    }
    Ok(())
}
