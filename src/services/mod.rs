//! Outbound collaborators of the capture task.

pub mod object_store;
pub mod screenshot;

pub use object_store::{
    build_object_store, HttpObjectStore, LocalObjectStore, ObjectStore, StorageBackend,
    StorageConfig, StorageError,
};
pub use screenshot::{HttpScreenshotClient, ScreenshotConfig, ScreenshotError, ScreenshotService};
