pub mod backend;
pub mod blob_store;
pub mod local_fs;
#[cfg(feature = "gcs")]
pub mod object_store_backend;

pub use backend::BlobBackend;
pub use blob_store::BlobStore;
pub use local_fs::LocalFsBackend;
#[cfg(feature = "gcs")]
pub use object_store_backend::ObjectStoreBackend;
