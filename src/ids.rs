//! Hierarchical identifiers for accounts, folders, conversations and messages
//!
//! Ids are dot-separated paths rooted at the owning account
//! (`a0`, `a0.inbox`, `a0.c17`, `a0.c17.m3`), so the account id of any
//! finer-grained id is derivable from its first segment. Selection commands
//! rely on this: `SelectFolder` carries only a folder id and recovers the
//! account from it.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

id_type!(
    /// Identifier of an account, the root of the id hierarchy.
    AccountId
);
id_type!(
    /// Identifier of a folder within an account.
    FolderId
);
id_type!(
    /// Identifier of a conversation within an account.
    ConversationId
);
id_type!(
    /// Identifier of a message within a conversation.
    MessageId
);

/// First dot-separated segment of an id (the whole id if undotted).
fn account_prefix(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}

impl FolderId {
    /// Derive the owning account id from a folder id.
    pub fn account_id(&self) -> AccountId {
        AccountId::new(account_prefix(&self.0))
    }
}

impl ConversationId {
    /// Derive the owning account id from a conversation id.
    pub fn account_id(&self) -> AccountId {
        AccountId::new(account_prefix(&self.0))
    }
}
