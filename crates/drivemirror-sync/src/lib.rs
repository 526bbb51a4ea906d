//! DriveMirror Sync - Tree synchronization engine
//!
//! Orchestrates the mirroring of a Drive folder tree into the row store and
//! keeps the mirror current through the provider's change feed.
//!
//! ## Components
//!
//! - [`crawler::InitialCrawler`] - breadth-first initial population of the
//!   mirror, with pre-crawl cursor capture
//! - [`poller::ChangePoller`] - bounded incremental application of pending
//!   changes against the stored tree
//! - [`assembler::TreeAssembler`] - rebuilds the nested tree view from the
//!   flat rows on demand
//! - [`service::SyncService`] - facade exposed to the presentation layer,
//!   enforcing ownership checks and per-subscription serialization
//!
//! The engine depends only on the two port traits from `drivemirror-core`
//! (`ITreeProvider`, `ITreeStore`), so it can be tested against in-memory
//! fakes without network or storage.

pub mod assembler;
pub mod crawler;
pub mod poller;
pub mod service;

pub use assembler::TreeAssembler;
pub use crawler::InitialCrawler;
pub use poller::{ChangePoller, PollOutcome};
pub use service::{
    PollReport, ServiceError, StartSyncOutcome, StatusClass, SubscriptionSummary, SyncService,
};
