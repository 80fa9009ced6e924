pub mod blob;
pub mod config;
pub mod db;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use config::StoreConfig;
