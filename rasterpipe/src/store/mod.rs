//! External storage capability traits
//!
//! Tile archives (MBTiles-style containers) and remote object stores are
//! external collaborators: the core only depends on their result
//! contracts. Adapter stages in [`crate::tasks`] consume these traits;
//! concrete implementations live outside the crate.

use std::path::Path;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::coord::TileCoord;

/// Errors from a tile archive writer.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive could not be opened or its session started.
    #[error("failed to open archive: {0}")]
    Open(String),

    /// Writing a single tile failed.
    #[error("failed to store tile {tile}: {message}")]
    PutTile { tile: TileCoord, message: String },

    /// Finalizing the archive failed.
    #[error("failed to finalize archive: {0}")]
    Finalize(String),
}

/// A writable tile container (e.g. an MBTiles file).
///
/// The write session is bracketed: `begin` before any tile, `finish`
/// after the last one. Implementations decide what either means.
pub trait TileArchive: Send + Sync {
    /// Starts a write session.
    fn begin<'a>(&'a self) -> BoxFuture<'a, Result<(), ArchiveError>>;

    /// Stores one encoded tile.
    fn put_tile<'a>(
        &'a self,
        tile: TileCoord,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ArchiveError>>;

    /// Ends the write session, making the archive durable.
    fn finish<'a>(&'a self) -> BoxFuture<'a, Result<(), ArchiveError>>;
}

/// Errors from a remote object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uploading a single object failed.
    #[error("failed to upload {key}: {message}")]
    Upload { key: String, message: String },
}

/// A remote object store (e.g. an OSS/S3 bucket).
pub trait ObjectStore: Send + Sync {
    /// Uploads a local file under the given key.
    fn put<'a>(&'a self, local: &'a Path, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}
