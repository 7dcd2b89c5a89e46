pub mod config;
pub mod credentials;

use crate::error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
