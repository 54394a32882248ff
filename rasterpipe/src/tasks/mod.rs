//! Task implementations for the pipeline engine.
//!
//! Each task is a thin [`Stage`](crate::pipeline::Stage) adapter around
//! an operation in [`crate::ops`], [`crate::tiler`] or [`crate::store`]:
//! it resolves its input from the artifact triple, calls the operation,
//! and appends one provenance record.
//!
//! # Data Flow
//!
//! ```text
//! ReadData      → Path artifact + open source handle
//! Reproject     → Path artifact + warped handle
//! WriteRaster   → Path artifact + copied/normalized handle
//! GenerateTiles → Tiles artifact, handles closed
//! EncodeImage   → Path or Tiles artifact of PNG/JPEG files
//! WriteArchive  → artifact unchanged, tiles pushed to a TileArchive
//! Upload        → artifact unchanged, files pushed to an ObjectStore
//! ```

mod encode_image;
mod generate_tiles;
mod read_data;
mod reproject;
mod upload;
mod write_archive;
mod write_raster;

pub use encode_image::EncodeImageTask;
pub use generate_tiles::GenerateTilesTask;
pub use read_data::ReadDataTask;
pub use reproject::ReprojectTask;
pub use upload::UploadTask;
pub use write_archive::WriteArchiveTask;
pub use write_raster::WriteRasterTask;

use serde::Serialize;

/// Serializes stage options for the provenance record.
fn options_value<T: Serialize>(options: &T) -> serde_json::Value {
    serde_json::to_value(options).unwrap_or(serde_json::Value::Null)
}
