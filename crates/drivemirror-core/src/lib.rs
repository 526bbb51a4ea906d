//! DriveMirror Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SyncSubscription`, `TreeNode`, `SyncCursor`, `AssembledNode`
//! - **Port definitions** - Traits for adapters: `ITreeProvider`, `ITreeStore`
//! - **Configuration** - Typed YAML configuration with defaults
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure data and validation with no external
//! dependencies. Ports define trait interfaces that adapter crates implement:
//! the Google Drive client implements `ITreeProvider`, the SQLite repository
//! implements `ITreeStore`, and the sync engine orchestrates both through
//! the trait objects.

pub mod config;
pub mod domain;
pub mod ports;
