//! Backing data collaborator interface
//!
//! The storage/search engine behind the live views is external to this crate;
//! [`MailStore`] is its consumed surface. The controller receives a store at
//! construction (never through a global), so tests and alternative backends
//! substitute freely. [`memory::MemoryStore`] is the reference collaborator.

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ViewingError;
use crate::filter::FilterSpec;
use crate::ids::{AccountId, ConversationId, FolderId, MessageId};
use crate::view::LiveView;

/// Well-known folder roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    Inbox,
    Sent,
    Drafts,
    /// Drafts stored only on this device.
    LocalDrafts,
    Trash,
    Spam,
    Archive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub folder_type: FolderType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub folders: Vec<Folder>,
}

impl Account {
    pub fn folder_by_id(&self, id: &FolderId) -> Option<&Folder> {
        self.folders.iter().find(|f| &f.id == id)
    }

    pub fn first_folder_with_type(&self, folder_type: FolderType) -> Option<&Folder> {
        self.folders.iter().find(|f| f.folder_type == folder_type)
    }
}

/// Conversation summary payload, as rendered in a conversations list row.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub subject: String,
    /// Senders of messages in the conversation.
    pub authors: Vec<String>,
    /// Everyone on the conversation, senders and recipients.
    pub participants: Vec<String>,
    pub snippet: String,
    pub date: DateTime<Utc>,
    pub message_count: u32,
    pub unread_count: u32,
}

/// Message payload, as rendered in a messages list row.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub author: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub is_draft: bool,
    pub is_read: bool,
}

/// The backing collaborator. Lookups are synchronous (or pre-resolved);
/// view acquisition returns the handle immediately and populates it
/// asynchronously, signalling readiness via the first `Seeked` event.
///
/// Acquisition itself does not fail: resolving a usable view or failing the
/// surrounding operation is the collaborator's responsibility.
pub trait MailStore {
    fn account_by_id(&self, id: &AccountId) -> Result<Account, ViewingError>;

    fn folder_by_id(&self, id: &FolderId) -> Result<Folder, ViewingError>;

    fn first_folder_with_type(
        &self,
        account_id: &AccountId,
        folder_type: FolderType,
    ) -> Result<Folder, ViewingError>;

    /// Plain enumeration of a folder's conversations.
    fn view_folder_conversations(&self, folder: &Folder) -> LiveView<Conversation>;

    /// Filtered search over a folder's conversations.
    fn search_folder_conversations(
        &self,
        folder: &Folder,
        filter: FilterSpec,
    ) -> LiveView<Conversation>;

    /// Plain enumeration of a conversation's messages.
    fn view_conversation_messages(&self, conversation: &Conversation) -> LiveView<Message>;

    /// Filtered search over a conversation's messages.
    fn search_conversation_messages(
        &self,
        conversation: &Conversation,
        filter: FilterSpec,
    ) -> LiveView<Message>;
}
