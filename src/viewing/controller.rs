//! View lifecycle controller
//!
//! Applies viewing commands to the aggregate state and keeps the two view
//! slots (conversations, messages) correctly bound across selection and
//! filter transitions. Both slots run the same algorithm:
//!
//! 1. If a binding exists and both the parent identity and the filter
//!    snapshot are unchanged, reuse it. The filter check is `Arc::ptr_eq`:
//!    filter state is replaced wholesale on every filter-affecting command,
//!    so reference equality is a correct, cheap proxy for "nothing changed".
//! 2. Otherwise release the existing binding first, unconditionally, before
//!    any new acquisition, so at most one view per slot is ever live.
//! 3. No parent, no view.
//! 4. Otherwise acquire: a filtered search when the free text reaches the
//!    configured minimum length or any structured filter is set, a plain
//!    enumeration otherwise.
//!
//! The store is injected at construction. Resolution failures reject the
//! whole transition: the previous state and its bindings stay intact.

use std::sync::Arc;

use crate::config::ViewingConfig;
use crate::error::ViewingError;
use crate::filter::{FilterSpec, FilterState, build_filter_spec};
use crate::store::{Account, Conversation, Folder, FolderType, MailStore};
use crate::view::LiveView;
use crate::viewing::command::ViewingCommand;
use crate::viewing::{BindingMode, SelectionState, ViewSlot, ViewingState};

pub struct ViewingController<S: MailStore> {
    store: S,
    config: ViewingConfig,
    state: ViewingState,
}

impl<S: MailStore> ViewingController<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ViewingConfig::default())
    }

    pub fn with_config(store: S, config: ViewingConfig) -> Self {
        Self {
            store,
            config,
            state: ViewingState::default(),
        }
    }

    /// Read-only snapshot of the viewing state after the last accepted
    /// command.
    pub fn state(&self) -> &ViewingState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ViewingConfig {
        &self.config
    }

    /// Drain pending events on both bound views. Returns true if any window
    /// changed (the consumer should re-render).
    pub fn poll_views(&mut self) -> bool {
        let mut dirty = false;
        if let Some(view) = self.state.live.conversations.view_mut() {
            dirty |= view.poll_events();
        }
        if let Some(view) = self.state.live.messages.view_mut() {
            dirty |= view.poll_events();
        }
        dirty
    }

    /// Release both bound views. The controller remains usable; the next
    /// selection command rebinds as usual.
    pub fn shutdown(&mut self) {
        if let Some(view) = self.state.live.conversations.take_view() {
            view.release();
        }
        if let Some(view) = self.state.live.messages.take_view() {
            view.release();
        }
    }

    /// Apply one command. On error the transition is rejected wholesale.
    pub fn apply(&mut self, command: ViewingCommand) -> Result<(), ViewingError> {
        tracing::debug!(?command, epoch = self.state.epoch(), "applying viewing command");
        match command {
            ViewingCommand::SelectAccount {
                account_id,
                folder_type,
            } => {
                let account = self.store.account_by_id(&account_id)?;
                let folder = self.store.first_folder_with_type(&account_id, folder_type)?;
                let selections = SelectionState {
                    account_id: Some(account.id.clone()),
                    folder_id: Some(folder.id.clone()),
                    conversation_id: None,
                    message_id: None,
                };
                let filtering = Arc::clone(&self.state.filtering);
                self.commit(selections, filtering, Some(account), Some(folder), None);
            }

            ViewingCommand::SelectFolder { folder_id } => {
                let account = self.store.account_by_id(&folder_id.account_id())?;
                let folder = self.store.folder_by_id(&folder_id)?;
                let selections = SelectionState {
                    account_id: Some(account.id.clone()),
                    folder_id: Some(folder.id.clone()),
                    conversation_id: None,
                    message_id: None,
                };
                let filtering = Arc::clone(&self.state.filtering);
                self.commit(selections, filtering, Some(account), Some(folder), None);
            }

            ViewingCommand::SelectConversation { conversation } => {
                let selections = SelectionState {
                    account_id: self.state.selections.account_id.clone(),
                    folder_id: self.state.selections.folder_id.clone(),
                    conversation_id: Some(conversation.id.clone()),
                    message_id: None,
                };
                let filtering = Arc::clone(&self.state.filtering);
                let account = self.state.live.account.clone();
                let folder = self.state.live.folder.clone();
                self.commit(selections, filtering, account, folder, Some(conversation));
            }

            ViewingCommand::SelectMessage { message_id } => {
                // Nothing in `live` changes or needs to change.
                self.state.advance_epoch();
                self.state.selections.message_id = Some(message_id);
            }

            ViewingCommand::NavigateToDraft {
                conversation,
                draft_message_id,
            } => {
                let account_id = conversation.id.account_id();
                let account = self.store.account_by_id(&account_id)?;
                let folder = self
                    .store
                    .first_folder_with_type(&account_id, FolderType::LocalDrafts)?;
                let selections = SelectionState {
                    account_id: Some(account.id.clone()),
                    folder_id: Some(folder.id.clone()),
                    conversation_id: Some(conversation.id.clone()),
                    message_id: Some(draft_message_id),
                };
                let filtering = Arc::clone(&self.state.filtering);
                self.commit(
                    selections,
                    filtering,
                    Some(account),
                    Some(folder),
                    Some(conversation),
                );
            }

            ViewingCommand::ModifyTextFilter { text_filter } => {
                let filtering = self.state.filtering.with_text_filter(text_filter);
                self.commit_filter_change(filtering);
            }

            ViewingCommand::ModifyFilter { changes } => {
                let filtering = self.state.filtering.with_structured_changes(&changes);
                self.commit_filter_change(filtering);
            }

            // Reserved for facet-visualization bookkeeping.
            ViewingCommand::AddVis | ViewingCommand::ModifyVis | ViewingCommand::RemoveVis => {
                tracing::debug!("visualization command accepted (reserved no-op)");
            }
        }
        Ok(())
    }

    /// A filter change keeps the selection and its parents but re-evaluates
    /// both slots against the new filter snapshot.
    fn commit_filter_change(&mut self, filtering: Arc<FilterState>) {
        let selections = self.state.selections.clone();
        let account = self.state.live.account.clone();
        let folder = self.state.live.folder.clone();
        let conversation = self.state.live.conversation.clone();
        self.commit(selections, filtering, account, folder, conversation);
    }

    /// Install a new state, re-evaluating both view slots.
    fn commit(
        &mut self,
        selections: SelectionState,
        filtering: Arc<FilterState>,
        account: Option<Account>,
        folder: Option<Folder>,
        conversation: Option<Conversation>,
    ) {
        let epoch = self.state.advance_epoch();
        let filter_unchanged = Arc::ptr_eq(&self.state.filtering, &filtering);
        let min_text_len = self.config.min_text_filter_len;
        let store = &self.store;

        let folder_unchanged = self.state.selections.folder_id == selections.folder_id;
        let mut slot = std::mem::take(&mut self.state.live.conversations);
        ensure_slot(
            &mut slot,
            folder_unchanged && filter_unchanged,
            folder.as_ref(),
            &filtering,
            min_text_len,
            epoch,
            "conversations",
            |f| store.view_folder_conversations(f),
            |f, spec| store.search_folder_conversations(f, spec),
        );
        self.state.live.conversations = slot;

        let conversation_unchanged =
            self.state.selections.conversation_id == selections.conversation_id;
        let mut slot = std::mem::take(&mut self.state.live.messages);
        ensure_slot(
            &mut slot,
            conversation_unchanged && filter_unchanged,
            conversation.as_ref(),
            &filtering,
            min_text_len,
            epoch,
            "messages",
            |c| store.view_conversation_messages(c),
            |c, spec| store.search_conversation_messages(c, spec),
        );
        self.state.live.messages = slot;

        self.state.selections = selections;
        self.state.filtering = filtering;
        self.state.live.account = account;
        self.state.live.folder = folder;
        self.state.live.conversation = conversation;

        debug_assert_eq!(
            self.state.live.conversations.is_bound(),
            self.state.live.folder.is_some(),
        );
        debug_assert_eq!(
            self.state.live.messages.is_bound(),
            self.state.live.conversation.is_some(),
        );
    }
}

/// The per-slot binding algorithm. See the module docs for the four steps.
#[allow(clippy::too_many_arguments)]
fn ensure_slot<T, P>(
    slot: &mut ViewSlot<T>,
    reusable: bool,
    parent: Option<&P>,
    filtering: &FilterState,
    min_text_len: usize,
    epoch: u64,
    slot_name: &'static str,
    plain: impl FnOnce(&P) -> LiveView<T>,
    filtered: impl FnOnce(&P, FilterSpec) -> LiveView<T>,
) where
    T: Clone,
{
    if slot.is_bound() && reusable {
        tracing::debug!(slot = slot_name, epoch, "reusing bound live view");
        return;
    }
    // Release strictly before any new acquisition is requested, so at most
    // one view per slot is ever outstanding.
    if let Some(view) = slot.take_view() {
        tracing::debug!(slot = slot_name, epoch, handle = %view.handle(), "releasing superseded view");
        view.release();
    }
    let Some(parent) = parent else {
        return;
    };
    if filtering.wants_search(min_text_len) {
        let view = filtered(parent, build_filter_spec(filtering));
        tracing::debug!(slot = slot_name, epoch, handle = %view.handle(), "bound filtered search view");
        slot.bind(view, BindingMode::Filtered);
    } else {
        let view = plain(parent);
        tracing::debug!(slot = slot_name, epoch, handle = %view.handle(), "bound plain enumeration view");
        slot.bind(view, BindingMode::Plain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterScopes, TextFilter};
    use crate::ids::{AccountId, ConversationId, FolderId, MessageId};
    use crate::store::memory::{LifecycleEvent, MemoryStore};
    use crate::store::{FolderType, Message};
    use crate::view::ViewHandle;
    use chrono::DateTime;

    fn date(secs: i64) -> chrono::DateTime<chrono::Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn make_conversation(n: u32, author: &str) -> Conversation {
        Conversation {
            id: ConversationId::new(format!("a0.c{n}")),
            subject: format!("Subject {n}"),
            authors: vec![author.to_string()],
            participants: vec![author.to_string(), "me@example.com".to_string()],
            snippet: "snippet".to_string(),
            date: date(i64::from(n) * 1000),
            message_count: 1,
            unread_count: 0,
        }
    }

    fn make_message(conv: &str, n: u32) -> Message {
        Message {
            id: MessageId::new(format!("{conv}.m{n}")),
            author: "alice@example.com".to_string(),
            recipients: vec!["me@example.com".to_string()],
            subject: format!("Message {n}"),
            body: "body".to_string(),
            date: date(i64::from(n) * 10),
            is_draft: false,
            is_read: true,
        }
    }

    /// One account `a0` with an inbox `a0.f1`, a drafts folder `a0.drafts`,
    /// and a handful of conversations from alice and bob.
    fn seeded_controller() -> ViewingController<MemoryStore> {
        let store = MemoryStore::new();
        store.add_account(Account {
            id: AccountId::new("a0"),
            name: "Test".to_string(),
            folders: vec![
                Folder {
                    id: FolderId::new("a0.f1"),
                    name: "Inbox".to_string(),
                    folder_type: FolderType::Inbox,
                },
                Folder {
                    id: FolderId::new("a0.drafts"),
                    name: "Drafts".to_string(),
                    folder_type: FolderType::LocalDrafts,
                },
            ],
        });
        store.set_conversations(
            &FolderId::new("a0.f1"),
            vec![
                make_conversation(1, "alice@example.com"),
                make_conversation(2, "bob@example.com"),
                make_conversation(3, "alice@example.com"),
            ],
        );
        store.set_messages(
            &ConversationId::new("a0.c1"),
            vec![make_message("a0.c1", 0), make_message("a0.c1", 1)],
        );
        ViewingController::new(store.clone())
    }

    fn select_folder(controller: &mut ViewingController<MemoryStore>, id: &str) {
        controller
            .apply(ViewingCommand::SelectFolder {
                folder_id: FolderId::new(id),
            })
            .unwrap();
    }

    fn set_text_filter(controller: &mut ViewingController<MemoryStore>, text: &str) {
        controller
            .apply(ViewingCommand::ModifyTextFilter {
                text_filter: TextFilter::new(text, FilterScopes::SENDER),
            })
            .unwrap();
    }

    fn released_handles(store: &MemoryStore) -> Vec<ViewHandle> {
        store
            .lifecycle()
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Released(h) => Some(*h),
                LifecycleEvent::Acquired(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_select_folder_binds_plain_enumeration() {
        let mut controller = seeded_controller();
        select_folder(&mut controller, "a0.f1");

        let state = controller.state();
        assert_eq!(state.selections.account_id, Some(AccountId::new("a0")));
        assert_eq!(state.live.folder.as_ref().unwrap().id, FolderId::new("a0.f1"));
        assert_eq!(state.live.conversations.mode(), BindingMode::Plain);
        assert!(state.live.conversations.is_bound());
        assert!(!state.live.messages.is_bound());
    }

    #[test]
    fn test_reuse_invariant_across_conversation_selection() {
        let mut controller = seeded_controller();
        select_folder(&mut controller, "a0.f1");
        let handle = controller.state().live.conversations.handle().unwrap();

        controller
            .apply(ViewingCommand::SelectConversation {
                conversation: make_conversation(1, "alice@example.com"),
            })
            .unwrap();

        // Folder identity and filter snapshot both unchanged: same view.
        assert_eq!(
            controller.state().live.conversations.handle(),
            Some(handle)
        );
        assert_eq!(controller.state().live.messages.mode(), BindingMode::Plain);
        assert_eq!(
            controller.state().selections.conversation_id,
            Some(ConversationId::new("a0.c1"))
        );
    }

    #[test]
    fn test_selection_nesting_invariant() {
        let mut controller = seeded_controller();
        select_folder(&mut controller, "a0.f1");
        controller
            .apply(ViewingCommand::SelectConversation {
                conversation: make_conversation(1, "alice@example.com"),
            })
            .unwrap();
        controller
            .apply(ViewingCommand::SelectMessage {
                message_id: MessageId::new("a0.c1.m0"),
            })
            .unwrap();
        assert_eq!(
            controller.state().selections.message_id,
            Some(MessageId::new("a0.c1.m0"))
        );

        // Re-selecting a conversation resets the message, keeps the folder.
        controller
            .apply(ViewingCommand::SelectConversation {
                conversation: make_conversation(3, "alice@example.com"),
            })
            .unwrap();
        let selections = &controller.state().selections;
        assert_eq!(selections.folder_id, Some(FolderId::new("a0.f1")));
        assert_eq!(selections.conversation_id, Some(ConversationId::new("a0.c3")));
        assert_eq!(selections.message_id, None);

        // Re-selecting the folder resets everything beneath it.
        select_folder(&mut controller, "a0.f1");
        let selections = &controller.state().selections;
        assert_eq!(selections.conversation_id, None);
        assert_eq!(selections.message_id, None);
    }

    #[test]
    fn test_select_message_leaves_live_bindings_untouched() {
        let mut controller = seeded_controller();
        select_folder(&mut controller, "a0.f1");
        controller
            .apply(ViewingCommand::SelectConversation {
                conversation: make_conversation(1, "alice@example.com"),
            })
            .unwrap();
        let conv_handle = controller.state().live.conversations.handle();
        let msg_handle = controller.state().live.messages.handle();

        controller
            .apply(ViewingCommand::SelectMessage {
                message_id: MessageId::new("a0.c1.m1"),
            })
            .unwrap();

        assert_eq!(controller.state().live.conversations.handle(), conv_handle);
        assert_eq!(controller.state().live.messages.handle(), msg_handle);
        assert!(released_handles(controller.store()).is_empty());
    }

    #[test]
    fn test_threshold_behavior() {
        let mut controller = seeded_controller();
        select_folder(&mut controller, "a0.f1");

        // Two characters: below threshold, still plain enumeration.
        set_text_filter(&mut controller, "ab");
        assert_eq!(
            controller.state().live.conversations.mode(),
            BindingMode::Plain
        );

        // Three characters: search binding.
        set_text_filter(&mut controller, "abc");
        assert_eq!(
            controller.state().live.conversations.mode(),
            BindingMode::Filtered
        );

        // Back to empty text, but a structured filter forces search.
        set_text_filter(&mut controller, "");
        controller
            .apply(ViewingCommand::ModifyFilter {
                changes: vec![("unread".to_string(), Some("true".to_string()))],
            })
            .unwrap();
        assert_eq!(
            controller.state().live.conversations.mode(),
            BindingMode::Filtered
        );

        // Deleting the structured filter falls back to plain enumeration.
        controller
            .apply(ViewingCommand::ModifyFilter {
                changes: vec![("unread".to_string(), None)],
            })
            .unwrap();
        assert_eq!(
            controller.state().live.conversations.mode(),
            BindingMode::Plain
        );
    }

    #[test]
    fn test_superseded_view_is_released_on_rebind() {
        let mut controller = seeded_controller();
        select_folder(&mut controller, "a0.f1");
        let first = controller.state().live.conversations.handle().unwrap();

        set_text_filter(&mut controller, "alice");
        let second = controller.state().live.conversations.handle().unwrap();
        assert_ne!(first, second);

        // Release of the superseded view is issued before the replacement
        // acquisition, and the lifecycle log records them in that order.
        assert_eq!(
            controller.store().lifecycle(),
            vec![
                LifecycleEvent::Acquired(first),
                LifecycleEvent::Released(first),
                LifecycleEvent::Acquired(second),
            ]
        );
        assert_eq!(controller.store().live_view_count(), 1);
    }

    #[test]
    fn test_exactly_once_release() {
        let mut controller = seeded_controller();
        let mut handles_held = Vec::new();

        select_folder(&mut controller, "a0.f1");
        handles_held.push(controller.state().live.conversations.handle().unwrap());
        set_text_filter(&mut controller, "alice");
        handles_held.push(controller.state().live.conversations.handle().unwrap());
        set_text_filter(&mut controller, "alice b");
        handles_held.push(controller.state().live.conversations.handle().unwrap());

        handles_held.dedup();
        // Final binding is still live: each superseded handle was released
        // exactly once, in supersession order.
        let released = released_handles(controller.store());
        assert_eq!(&released, &handles_held[..handles_held.len() - 1]);

        controller.shutdown();
        controller.store().pump();
        let released = released_handles(controller.store());
        assert_eq!(released.len(), handles_held.len());
        assert_eq!(controller.store().live_view_count(), 0);
    }

    #[test]
    fn test_unresolvable_selection_rejects_transition() {
        let mut controller = seeded_controller();
        select_folder(&mut controller, "a0.f1");
        let handle = controller.state().live.conversations.handle();

        let err = controller
            .apply(ViewingCommand::SelectFolder {
                folder_id: FolderId::new("a0.missing"),
            })
            .unwrap_err();
        assert_eq!(err, ViewingError::FolderNotFound(FolderId::new("a0.missing")));

        // Prior state intact: no release, no rebind, selection unchanged.
        assert_eq!(controller.state().live.conversations.handle(), handle);
        assert_eq!(
            controller.state().selections.folder_id,
            Some(FolderId::new("a0.f1"))
        );

        let err = controller
            .apply(ViewingCommand::SelectAccount {
                account_id: AccountId::new("ghost"),
                folder_type: FolderType::Inbox,
            })
            .unwrap_err();
        assert_eq!(err, ViewingError::AccountNotFound(AccountId::new("ghost")));
    }

    #[test]
    fn test_navigate_to_draft() {
        let mut controller = seeded_controller();
        let draft_conv = make_conversation(7, "me@example.com");
        controller
            .store()
            .set_conversations(&FolderId::new("a0.drafts"), vec![draft_conv.clone()]);

        controller
            .apply(ViewingCommand::NavigateToDraft {
                conversation: draft_conv,
                draft_message_id: MessageId::new("a0.c7.m0"),
            })
            .unwrap();

        let state = controller.state();
        assert_eq!(
            state.live.folder.as_ref().unwrap().folder_type,
            FolderType::LocalDrafts
        );
        assert_eq!(
            state.selections.conversation_id,
            Some(ConversationId::new("a0.c7"))
        );
        assert_eq!(state.selections.message_id, Some(MessageId::new("a0.c7.m0")));
        assert!(state.live.conversations.is_bound());
        assert!(state.live.messages.is_bound());
    }

    #[test]
    fn test_vis_commands_are_noops() {
        let mut controller = seeded_controller();
        select_folder(&mut controller, "a0.f1");
        let handle = controller.state().live.conversations.handle();
        let epoch = controller.state().epoch();

        controller.apply(ViewingCommand::AddVis).unwrap();
        controller.apply(ViewingCommand::ModifyVis).unwrap();
        controller.apply(ViewingCommand::RemoveVis).unwrap();

        assert_eq!(controller.state().live.conversations.handle(), handle);
        assert_eq!(controller.state().epoch(), epoch);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut controller = seeded_controller();

        controller
            .apply(ViewingCommand::SelectFolder {
                folder_id: FolderId::new("a0.f1"),
            })
            .unwrap();
        assert_eq!(
            controller.state().live.folder.as_ref().unwrap().id,
            FolderId::new("a0.f1")
        );
        assert_eq!(
            controller.state().live.conversations.mode(),
            BindingMode::Plain
        );
        assert!(!controller.state().live.messages.is_bound());

        // Two characters: still a plain-enumeration binding.
        set_text_filter(&mut controller, "al");
        assert_eq!(
            controller.state().live.conversations.mode(),
            BindingMode::Plain
        );
        let plain_handle = controller.state().live.conversations.handle().unwrap();

        // Full word: the plain view is released, a search view is bound.
        set_text_filter(&mut controller, "alice");
        assert_eq!(
            controller.state().live.conversations.mode(),
            BindingMode::Filtered
        );
        controller.store().pump();
        assert!(
            released_handles(controller.store()).contains(&plain_handle)
        );

        // The bound search view serves exactly alice's conversations,
        // per FilterSpec {author: "alice"}.
        assert!(controller.poll_views());
        let window_ids: Vec<&str> = controller
            .state()
            .live
            .conversations
            .view()
            .unwrap()
            .window()
            .items()
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(window_ids, vec!["a0.c3", "a0.c1"]);
    }
}
