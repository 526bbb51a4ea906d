//! DriveMirror Drive - Google Drive v3 adapter
//!
//! Implements the `ITreeProvider` port from `drivemirror-core` against the
//! Google Drive REST API. It is a driven (secondary) adapter in the
//! hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`client::DriveClient`] - Typed HTTP client for the Drive API
//! - [`provider::DriveTreeProvider`] - `ITreeProvider` implementation
//! - [`link`] - Shared-link folder-id extraction

pub mod client;
pub mod link;
pub mod provider;

pub use client::DriveClient;
pub use provider::DriveTreeProvider;
