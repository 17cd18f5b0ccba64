mod error;
mod hash;
mod kind;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use filesystem::FilesystemFileStore;
pub use hash::ContentHash;
pub use kind::UploadKind;
pub use traits::{BoxReader, FileStore, StoredFile};
