//! Windowed live-view state core for mail clients.
//!
//! The UI of a mail client looks at enormous, remotely-backed, constantly
//! mutating lists (conversations in a folder, messages in a conversation)
//! through a small materialized window. This crate is the state core behind
//! that: live view handles with a seek/notify protocol ([`view`]), a
//! per-view generation clock for cheap change detection ([`view::clock`]),
//! viewport maths that translate pixel-ish scroll offsets into whole-item
//! window requests ([`view::window`]), canonical filter spec construction
//! ([`filter`]), and a controller that owns the selection path and keeps at
//! most one live view bound per list, releasing superseded views before
//! acquiring replacements ([`viewing`]).
//!
//! The backing storage/search engine is a collaborator behind the
//! [`store::MailStore`] trait; [`store::memory::MemoryStore`] is the
//! in-memory reference implementation used throughout the tests.

pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod ids;
pub mod store;
pub mod view;
pub mod viewing;

pub use config::ViewingConfig;
pub use error::ViewingError;
pub use filter::{FilterScopes, FilterSpec, FilterState, TextFilter, build_filter_spec};
pub use store::MailStore;
pub use view::{LiveView, SeekRequest, ViewEvent, ViewHandle};
pub use viewing::controller::ViewingController;
pub use viewing::{BindingMode, ViewingState, command::ViewingCommand};
