//! In-memory reference implementation of the backing collaborator
//!
//! Pump-driven, single-threaded and deterministic: view commands queue on
//! each view's channel until [`MemoryStore::pump`] drains them from the
//! owner's event loop, and results queue back as view events until the
//! consumer polls them. No task is spawned per view, which keeps tests free
//! of any runtime while preserving the asynchronous shape of the protocol.
//!
//! Search predicates are case-insensitive substring matches; unknown
//! structured filter keys are ignored (the predicate vocabulary belongs to a
//! real engine).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use aho_corasick::AhoCorasick;

use crate::config::ViewingConfig;
use crate::error::ViewingError;
use crate::filter::{
    FILTER_KEY_AUTHOR, FILTER_KEY_BODY, FILTER_KEY_RECIPIENTS, FILTER_KEY_SUBJECT, FilterSpec,
};
use crate::ids::{AccountId, ConversationId, FolderId};
use crate::view::clock::{GenerationClock, Serial};
use crate::view::window::resolve_seek;
use crate::view::{Item, LiveView, SeekRequest, ViewCommand, ViewEvent, ViewHandle, ViewPeer,
    WindowSnapshot};

use super::{Account, Conversation, Folder, FolderType, MailStore, Message};

/// Acquisition/release record, in issue order. Lets callers verify the
/// exactly-once and release-before-acquire properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Acquired(ViewHandle),
    Released(ViewHandle),
}

/// A row type servable through a live view.
trait Row: Clone {
    fn row_id(&self) -> String;
    fn matches(&self, filter: &CompiledFilter) -> bool;
}

impl Row for Conversation {
    fn row_id(&self) -> String {
        self.id.to_string()
    }

    fn matches(&self, filter: &CompiledFilter) -> bool {
        filter.predicates.iter().all(|predicate| match predicate {
            Predicate::Author(ac) => self.authors.iter().any(|a| ac.is_match(a)),
            Predicate::Recipients(ac) => self.participants.iter().any(|p| ac.is_match(p)),
            Predicate::Subject(ac) => ac.is_match(&self.subject),
            Predicate::Body(ac) => ac.is_match(&self.snippet),
            Predicate::Unread(want) => (self.unread_count > 0) == *want,
            // Draft status is a message-level predicate.
            Predicate::Draft(_) => true,
        })
    }
}

impl Row for Message {
    fn row_id(&self) -> String {
        self.id.to_string()
    }

    fn matches(&self, filter: &CompiledFilter) -> bool {
        filter.predicates.iter().all(|predicate| match predicate {
            Predicate::Author(ac) => ac.is_match(&self.author),
            Predicate::Recipients(ac) => self.recipients.iter().any(|r| ac.is_match(r)),
            Predicate::Subject(ac) => ac.is_match(&self.subject),
            Predicate::Body(ac) => ac.is_match(&self.body),
            Predicate::Unread(want) => !self.is_read == *want,
            Predicate::Draft(want) => self.is_draft == *want,
        })
    }
}

enum Predicate {
    Author(AhoCorasick),
    Recipients(AhoCorasick),
    Subject(AhoCorasick),
    Body(AhoCorasick),
    Unread(bool),
    Draft(bool),
}

/// Filter spec compiled to matchers once per query.
struct CompiledFilter {
    predicates: Vec<Predicate>,
}

fn substring_matcher(needle: &str) -> Option<AhoCorasick> {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build([needle])
        .ok()
}

fn compile_filter(spec: &FilterSpec) -> CompiledFilter {
    let mut predicates = Vec::with_capacity(spec.len());
    for (key, value) in spec.iter() {
        let predicate = match key {
            FILTER_KEY_AUTHOR => substring_matcher(value).map(Predicate::Author),
            FILTER_KEY_RECIPIENTS => substring_matcher(value).map(Predicate::Recipients),
            FILTER_KEY_SUBJECT => substring_matcher(value).map(Predicate::Subject),
            FILTER_KEY_BODY => substring_matcher(value).map(Predicate::Body),
            "unread" => Some(Predicate::Unread(value == "true")),
            "draft" => Some(Predicate::Draft(value == "true")),
            _ => {
                tracing::debug!(key, "ignoring unsupported structured filter key");
                None
            }
        };
        predicates.extend(predicate);
    }
    CompiledFilter { predicates }
}

/// Server half of one live view.
struct Backend<T, K> {
    handle: ViewHandle,
    peer: ViewPeer<T>,
    clock: GenerationClock,
    /// Serial each materialized item was last stamped with.
    stamped: HashMap<String, Serial>,
    key: K,
    filter: Option<CompiledFilter>,
    /// Re-served on upstream changes so a top-latched window stays at the top.
    last_request: SeekRequest,
}

type ConvBackend = Backend<Conversation, FolderId>;
type MsgBackend = Backend<Message, ConversationId>;

impl<T: Row, K> Backend<T, K> {
    /// Resolve a seek against the current rows and publish the new window.
    /// One generation tick; newly materialized items get the new stamp,
    /// already-stamped items keep theirs.
    fn serve(&mut self, rows: &[T], request: SeekRequest, unit_size: u32) {
        let resolution = resolve_seek(request, rows.len(), unit_size);
        let serial = self.clock.tick();
        // Stamps for rows that left the collection are forgotten; a row that
        // later returns counts as newly materialized.
        let current_ids: HashSet<String> = rows.iter().map(Row::row_id).collect();
        self.stamped.retain(|id, _| current_ids.contains(id));
        let items = rows[resolution.start_index..resolution.start_index + resolution.count]
            .iter()
            .map(|row| {
                let id = row.row_id();
                let stamp = *self.stamped.entry(id.clone()).or_insert(serial);
                Item {
                    id,
                    serial: stamp,
                    payload: row.clone(),
                }
            })
            .collect();
        self.last_request = request;
        let snapshot = WindowSnapshot {
            serial,
            total_extent: resolution.total_extent,
            window_offset: resolution.window_offset,
            items,
        };
        if self.peer.event_tx.send(ViewEvent::Seeked(snapshot)).is_err() {
            tracing::warn!(handle = %self.handle, "view dropped without release");
        }
    }

    fn visible_rows(&self, all: &[T]) -> Vec<T> {
        match &self.filter {
            None => all.to_vec(),
            Some(filter) => all.iter().filter(|r| r.matches(filter)).cloned().collect(),
        }
    }

    /// Drain queued commands. Returns `(processed_any, released)`; commands
    /// queued behind a release are discarded.
    fn drain(&mut self, rows: &[T], unit_size: u32) -> (bool, bool) {
        let mut processed = false;
        let mut released = false;
        while let Ok(command) = self.peer.cmd_rx.try_recv() {
            processed = true;
            match command {
                ViewCommand::Seek(_) if released => {
                    tracing::warn!(handle = %self.handle, "discarding seek for released view");
                }
                ViewCommand::Seek(request) => {
                    self.serve(rows, request, unit_size);
                }
                ViewCommand::Release => {
                    released = true;
                }
            }
        }
        (processed, released)
    }
}

#[derive(Default)]
struct Inner {
    accounts: Vec<Account>,
    conversations: HashMap<FolderId, Vec<Conversation>>,
    messages: HashMap<ConversationId, Vec<Message>>,
    conversation_views: HashMap<ViewHandle, ConvBackend>,
    message_views: HashMap<ViewHandle, MsgBackend>,
    next_handle: u64,
    lifecycle: Vec<LifecycleEvent>,
}

/// Shared-handle in-memory store. Cloning shares the same backing state, so
/// a clone can seed data and simulate upstream changes while the controller
/// owns another handle.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    unit_size: u32,
    initial_visible: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_config(&ViewingConfig::default())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ViewingConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            unit_size: config.unit_size.max(1),
            initial_visible: config.initial_visible,
        }
    }

    pub fn unit_size(&self) -> u32 {
        self.unit_size
    }

    pub fn add_account(&self, account: Account) {
        self.inner.lock().unwrap().accounts.push(account);
    }

    /// Seed a folder's conversations, newest first. Does not notify views.
    pub fn set_conversations(&self, folder: &FolderId, mut conversations: Vec<Conversation>) {
        conversations.sort_by(|a, b| b.date.cmp(&a.date));
        self.inner
            .lock()
            .unwrap()
            .conversations
            .insert(folder.clone(), conversations);
    }

    /// Seed a conversation's messages, oldest first. Does not notify views.
    pub fn set_messages(&self, conversation: &ConversationId, mut messages: Vec<Message>) {
        messages.sort_by(|a, b| a.date.cmp(&b.date));
        self.inner
            .lock()
            .unwrap()
            .messages
            .insert(conversation.clone(), messages);
    }

    /// Upstream insert: a conversation arrives in a folder. Live views on
    /// that folder whose filter admits it re-serve their last request, so a
    /// top-latched window picks the new head up immediately.
    pub fn insert_conversation(&self, folder: &FolderId, conversation: Conversation) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let rows = inner.conversations.entry(folder.clone()).or_default();
        let position = rows
            .iter()
            .position(|c| c.date < conversation.date)
            .unwrap_or(rows.len());
        rows.insert(position, conversation.clone());

        for backend in inner.conversation_views.values_mut() {
            if backend.key != *folder {
                continue;
            }
            let admitted = backend
                .filter
                .as_ref()
                .is_none_or(|f| conversation.matches(f));
            if !admitted {
                continue;
            }
            let visible = backend.visible_rows(rows);
            backend.serve(&visible, backend.last_request, self.unit_size);
        }
    }

    /// Upstream update of a conversation summary: restamp and re-serve, so
    /// filtered views also drop the row if it no longer matches.
    pub fn update_conversation(&self, folder: &FolderId, conversation: Conversation) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let Some(rows) = inner.conversations.get_mut(folder) else {
            return;
        };
        let Some(existing) = rows.iter_mut().find(|c| c.id == conversation.id) else {
            return;
        };
        *existing = conversation.clone();

        let changed_id = conversation.id.to_string();
        for backend in inner.conversation_views.values_mut() {
            if backend.key != *folder {
                continue;
            }
            // Forget the old stamp so the re-serve tick lands on the changed row.
            backend.stamped.remove(&changed_id);
            let visible = backend.visible_rows(rows);
            backend.serve(&visible, backend.last_request, self.unit_size);
        }
    }

    /// Upstream update of a single message (e.g. a draft's content changing):
    /// delivered as an out-of-band `Change` notification.
    pub fn update_message(&self, conversation: &ConversationId, message: Message) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        if let Some(rows) = inner.messages.get_mut(conversation)
            && let Some(existing) = rows.iter_mut().find(|m| m.id == message.id)
        {
            *existing = message.clone();
        }

        for backend in inner.message_views.values_mut() {
            if backend.key != *conversation {
                continue;
            }
            let serial = backend.clock.tick();
            let id = message.id.to_string();
            backend.stamped.insert(id.clone(), serial);
            let event = ViewEvent::Change {
                item: Item {
                    id,
                    serial,
                    payload: message.clone(),
                },
                serial,
            };
            if backend.peer.event_tx.send(event).is_err() {
                tracing::warn!(handle = %backend.handle, "view dropped without release");
            }
        }
    }

    /// Drain and serve all queued view commands. Returns true if anything
    /// was processed.
    pub fn pump(&self) -> bool {
        let mut guard = self.inner.lock().unwrap();
        Self::drain_queued(&mut guard, self.unit_size)
    }

    fn drain_queued(inner: &mut Inner, unit_size: u32) -> bool {
        let mut processed = false;

        let mut released = Vec::new();
        for (handle, backend) in &mut inner.conversation_views {
            if backend.peer.cmd_rx.is_empty() {
                continue;
            }
            let all = inner
                .conversations
                .get(&backend.key)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let visible = backend.visible_rows(all);
            let (any, release) = backend.drain(&visible, unit_size);
            processed |= any;
            if release {
                released.push(*handle);
            }
        }
        for handle in released {
            inner.conversation_views.remove(&handle);
            inner.lifecycle.push(LifecycleEvent::Released(handle));
        }

        let mut released = Vec::new();
        for (handle, backend) in &mut inner.message_views {
            if backend.peer.cmd_rx.is_empty() {
                continue;
            }
            let all = inner
                .messages
                .get(&backend.key)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let visible = backend.visible_rows(all);
            let (any, release) = backend.drain(&visible, unit_size);
            processed |= any;
            if release {
                released.push(*handle);
            }
        }
        for handle in released {
            inner.message_views.remove(&handle);
            inner.lifecycle.push(LifecycleEvent::Released(handle));
        }

        processed
    }

    /// Acquisition/release history, in issue order.
    pub fn lifecycle(&self) -> Vec<LifecycleEvent> {
        self.inner.lock().unwrap().lifecycle.clone()
    }

    /// Number of currently live (unreleased) views.
    pub fn live_view_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.conversation_views.len() + inner.message_views.len()
    }

    fn acquire_conversations(
        &self,
        folder: &FolderId,
        filter: Option<FilterSpec>,
    ) -> LiveView<Conversation> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        // Queued signals are drained first so the lifecycle log records a
        // pending release ahead of this acquisition.
        Self::drain_queued(inner, self.unit_size);
        inner.next_handle += 1;
        let handle = ViewHandle::from_raw(inner.next_handle);
        let (view, peer) = LiveView::channel(handle);
        let mut backend = ConvBackend {
            handle,
            peer,
            clock: GenerationClock::new(),
            stamped: HashMap::new(),
            key: folder.clone(),
            filter: filter.as_ref().map(compile_filter),
            last_request: SeekRequest::ToTop {
                visible: self.initial_visible,
                after: 0,
            },
        };
        tracing::debug!(%handle, %folder, filtered = filter.is_some(), "acquiring conversations view");
        let all = inner
            .conversations
            .get(folder)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let visible = backend.visible_rows(all);
        // Initial population: the first generation tick.
        backend.serve(&visible, backend.last_request, self.unit_size);
        inner.lifecycle.push(LifecycleEvent::Acquired(handle));
        inner.conversation_views.insert(handle, backend);
        view
    }

    fn acquire_messages(
        &self,
        conversation: &ConversationId,
        filter: Option<FilterSpec>,
    ) -> LiveView<Message> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        Self::drain_queued(inner, self.unit_size);
        inner.next_handle += 1;
        let handle = ViewHandle::from_raw(inner.next_handle);
        let (view, peer) = LiveView::channel(handle);
        let mut backend = MsgBackend {
            handle,
            peer,
            clock: GenerationClock::new(),
            stamped: HashMap::new(),
            key: conversation.clone(),
            filter: filter.as_ref().map(compile_filter),
            last_request: SeekRequest::ToTop {
                visible: self.initial_visible,
                after: 0,
            },
        };
        tracing::debug!(%handle, %conversation, filtered = filter.is_some(), "acquiring messages view");
        let all = inner
            .messages
            .get(conversation)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let visible = backend.visible_rows(all);
        backend.serve(&visible, backend.last_request, self.unit_size);
        inner.lifecycle.push(LifecycleEvent::Acquired(handle));
        inner.message_views.insert(handle, backend);
        view
    }
}

impl MailStore for MemoryStore {
    fn account_by_id(&self, id: &AccountId) -> Result<Account, ViewingError> {
        self.inner
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|a| &a.id == id)
            .cloned()
            .ok_or_else(|| ViewingError::AccountNotFound(id.clone()))
    }

    fn folder_by_id(&self, id: &FolderId) -> Result<Folder, ViewingError> {
        self.inner
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find_map(|a| a.folder_by_id(id))
            .cloned()
            .ok_or_else(|| ViewingError::FolderNotFound(id.clone()))
    }

    fn first_folder_with_type(
        &self,
        account_id: &AccountId,
        folder_type: FolderType,
    ) -> Result<Folder, ViewingError> {
        let account = self.account_by_id(account_id)?;
        account
            .first_folder_with_type(folder_type)
            .cloned()
            .ok_or(ViewingError::NoFolderWithType {
                account: account_id.clone(),
                folder_type,
            })
    }

    fn view_folder_conversations(&self, folder: &Folder) -> LiveView<Conversation> {
        self.acquire_conversations(&folder.id, None)
    }

    fn search_folder_conversations(
        &self,
        folder: &Folder,
        filter: FilterSpec,
    ) -> LiveView<Conversation> {
        self.acquire_conversations(&folder.id, Some(filter))
    }

    fn view_conversation_messages(&self, conversation: &Conversation) -> LiveView<Message> {
        self.acquire_messages(&conversation.id, None)
    }

    fn search_conversation_messages(
        &self,
        conversation: &Conversation,
        filter: FilterSpec,
    ) -> LiveView<Message> {
        self.acquire_messages(&conversation.id, Some(filter))
    }
}
