//! Command vocabulary accepted by the viewing controller
//!
//! A closed enum: the compiler enforces exhaustive handling, so an
//! unrecognized command is unrepresentable rather than a runtime throw.

use crate::filter::TextFilter;
use crate::ids::{AccountId, FolderId, MessageId};
use crate::store::{Conversation, FolderType};

#[derive(Debug, Clone)]
pub enum ViewingCommand {
    /// Select an account and land in its first folder of the given type.
    SelectAccount {
        account_id: AccountId,
        folder_type: FolderType,
    },
    /// Select a folder; the account is derived from the folder id.
    SelectFolder { folder_id: FolderId },
    /// Select a conversation within the current folder.
    SelectConversation { conversation: Conversation },
    /// Select a message within the current conversation. Leaves all live
    /// bindings untouched.
    SelectMessage { message_id: MessageId },
    /// Jump to a draft: its account's local-drafts folder, the draft's
    /// conversation, and the draft message itself.
    NavigateToDraft {
        conversation: Conversation,
        draft_message_id: MessageId,
    },
    /// Replace the free-text filter.
    ModifyTextFilter { text_filter: TextFilter },
    /// Apply structured filter changes in order; `None` deletes the key.
    ModifyFilter {
        changes: Vec<(String, Option<String>)>,
    },
    /// Reserved for facet-visualization bookkeeping; currently a no-op.
    AddVis,
    /// Reserved; currently a no-op.
    ModifyVis,
    /// Reserved; currently a no-op.
    RemoveVis,
}
