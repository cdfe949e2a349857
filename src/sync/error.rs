use thiserror::Error;

use crate::feed::FetchError;
use crate::store::StoreError;

/// Why a sync pass stopped early.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Store failed: {0}")]
    Store(#[from] StoreError),
}
