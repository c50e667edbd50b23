//! Error types for selection resolution
//!
//! An unresolvable selection rejects the transition: the previous state and
//! its live bindings stay intact, and no view is bound for the failed
//! command. Unrecognized commands are not an error case here at all: the
//! command vocabulary is a closed enum, so they cannot be constructed.

use thiserror::Error;

use crate::ids::{AccountId, FolderId};
use crate::store::FolderType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewingError {
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("folder not found: {0}")]
    FolderNotFound(FolderId),

    #[error("account {account} has no folder of type {folder_type:?}")]
    NoFolderWithType {
        account: AccountId,
        folder_type: FolderType,
    },
}
