//! Viewing state types
//!
//! All state for "what is the user looking at" lives here: the selection
//! path, the active filter snapshot, and the live bindings the controller
//! maintains against the backing store. The UI layer reads this; it never
//! constructs or mutates it.

pub mod command;
pub mod controller;

use std::sync::Arc;

use crate::filter::FilterState;
use crate::ids::{AccountId, ConversationId, FolderId, MessageId};
use crate::store::{Account, Conversation, Folder, Message};
use crate::view::{LiveView, ViewHandle};

/// The strictly nested selection path: account ⊇ folder ⊇ conversation ⊇
/// message. Any coarser id changing invalidates everything beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub account_id: Option<AccountId>,
    pub folder_id: Option<FolderId>,
    pub conversation_id: Option<ConversationId>,
    pub message_id: Option<MessageId>,
}

/// How a view slot is currently bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BindingMode {
    /// No parent selected; no view.
    #[default]
    Unbound,
    /// Bound via plain enumeration.
    Plain,
    /// Bound via filtered search.
    Filtered,
}

/// A named binding point for one live view (conversations or messages),
/// tracking the view together with how it was acquired.
#[derive(Debug)]
pub struct ViewSlot<T> {
    view: Option<LiveView<T>>,
    mode: BindingMode,
}

impl<T> Default for ViewSlot<T> {
    fn default() -> Self {
        Self {
            view: None,
            mode: BindingMode::Unbound,
        }
    }
}

impl<T: Clone> ViewSlot<T> {
    pub fn view(&self) -> Option<&LiveView<T>> {
        self.view.as_ref()
    }

    /// Mutable access for event polling; rebinding goes through the
    /// controller only.
    pub fn view_mut(&mut self) -> Option<&mut LiveView<T>> {
        self.view.as_mut()
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    pub fn handle(&self) -> Option<ViewHandle> {
        self.view.as_ref().map(LiveView::handle)
    }

    pub fn is_bound(&self) -> bool {
        self.view.is_some()
    }

    pub(crate) fn take_view(&mut self) -> Option<LiveView<T>> {
        self.mode = BindingMode::Unbound;
        self.view.take()
    }

    pub(crate) fn bind(&mut self, view: LiveView<T>, mode: BindingMode) {
        debug_assert!(self.view.is_none(), "binding over an unreleased view");
        self.view = Some(view);
        self.mode = mode;
    }
}

/// The live bindings backing the current selection.
#[derive(Debug, Default)]
pub struct LiveBindings {
    pub account: Option<Account>,
    pub folder: Option<Folder>,
    /// Non-null iff `folder` is non-null.
    pub conversations: ViewSlot<Conversation>,
    pub conversation: Option<Conversation>,
    /// Non-null iff `conversation` is non-null.
    pub messages: ViewSlot<Message>,
}

/// Aggregate root: selection, filtering and live bindings.
///
/// Owned by the controller and rebuilt on every accepted transition;
/// consumers read it through `ViewingController::state`. The filter snapshot
/// is shared (`Arc`) and replaced wholesale on any filter-affecting command,
/// never mutated in place.
#[derive(Debug)]
pub struct ViewingState {
    pub selections: SelectionState,
    pub filtering: Arc<FilterState>,
    pub live: LiveBindings,
    epoch: u64,
}

impl Default for ViewingState {
    fn default() -> Self {
        Self {
            selections: SelectionState::default(),
            filtering: Arc::new(FilterState::default()),
            live: LiveBindings::default(),
            epoch: 0,
        }
    }
}

impl ViewingState {
    /// Count of accepted transitions; stamps acquisitions so stale
    /// completions are attributable in traces.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn advance_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }
}
