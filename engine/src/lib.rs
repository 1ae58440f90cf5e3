//! # URL Sync Engine
//!
//! Keeps a set of independent application stores consistent with the query
//! string of the current address, in both directions, without feedback loops,
//! lost state, or unbounded URL growth.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches a browser, a socket, or a timer.
//!   Time comes in through a [`Clock`]; the host calls
//!   [`SyncController::tick`] when [`SyncController::next_deadline`] passes.
//! - **Deterministic**: the same inputs and clock readings always produce the
//!   same router calls.
//! - **Short URLs**: values equal to their default are never written.
//! - **Fault-contained**: malformed tokens fall back, failing store writes are
//!   logged as conflicts, and rejected router replaces leave the stores alone.
//!
//! ## Core Concepts
//!
//! ### Registry
//!
//! A [`Registry`] lists every synchronizable value as a [`MappingEntry`]: a
//! query key, a declared [`ValueKind`], a default, and accessor closures into
//! the host's store. [`Registry::bind`] derives all of this from a [`Signal`].
//!
//! ### Codec
//!
//! The [`codec`] module turns values into tokens: `1`/`0`, plain numbers,
//! raw text, comma-joined lists, and `b64:`-packed JSON for lists longer than
//! [`MAX_INLINE_ITEMS`].
//!
//! ### Ready gate
//!
//! Router changes arriving before [`SyncController::signal_ready`] are
//! buffered and replayed in order once the host has finished loading.
//!
//! ### Controller
//!
//! The [`SyncController`] applies router changes to stores immediately, and
//! store changes to the router after a trailing debounce, using "replace"
//! so no history entries are created.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use urlsync_engine::{
//!     ManualClock, MemoryRouter, Registry, Signal, SyncConfig, SyncContext, SyncController,
//! };
//!
//! // 1. Bind stores to query keys
//! let dark = Signal::new(false);
//! let countries = Signal::new(Vec::<String>::new());
//! let mut registry = Registry::new();
//! registry.bind("dark", false, &dark).unwrap();
//! registry.bind("cty", Vec::new(), &countries).unwrap();
//!
//! // 2. Build the context and controller
//! let clock = Rc::new(ManualClock::new(0));
//! let router = Rc::new(MemoryRouter::from_query_string("?cty=DEU,BRA"));
//! let ctx = SyncContext::new(registry, clock.clone(), SyncConfig::default());
//! let controller = SyncController::new(ctx, router.clone());
//! controller.attach();
//!
//! // 3. Host finished loading: the URL is applied
//! controller.signal_ready().unwrap();
//! assert_eq!(countries.get(), vec!["DEU", "BRA"]);
//!
//! // 4. Store changes reach the URL after the debounce window
//! dark.set(true);
//! clock.advance(300);
//! controller.tick();
//! assert_eq!(router.url(), "?cty=DEU,BRA&dark=1");
//! ```

pub mod cascade;
pub mod clock;
pub mod codec;
pub mod context;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod gate;
pub mod observable;
pub mod query;
pub mod registry;
pub mod router;
pub mod serialize;
pub mod state;
pub mod value;

// Re-export main types at crate root
pub use cascade::{Cascade, CascadeOutcome};
pub use clock::{Clock, ManualClock};
pub use codec::{LIST_B64_PREFIX, MAX_INLINE_ITEMS};
pub use context::{SyncConfig, SyncContext};
pub use controller::SyncController;
pub use debounce::Debouncer;
pub use error::Error;
pub use gate::{GatePhase, ReadyGate};
pub use observable::{Listener, Observable, Signal, Subscription};
pub use query::Query;
pub use registry::{MappingEntry, Registry, WriteOptions};
pub use router::{MemoryRouter, Router};
pub use serialize::{deserialize, serialize, DeserializeReport};
pub use state::{ConflictRecord, SyncKind, SyncRecord, SyncState};
pub use value::{Item, UrlValue, Value, ValueKind};

/// Type aliases for clarity
pub type QueryKey = String;
pub type Timestamp = u64;
