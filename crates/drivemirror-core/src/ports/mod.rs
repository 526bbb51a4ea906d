//! Port definitions (trait interfaces for adapters)

pub mod tree_provider;
pub mod tree_store;

pub use tree_provider::{
    ChangeEntry, ChangePage, ChildrenPage, ITreeProvider, NodeOwner, ProviderNode, VideoInfo,
};
pub use tree_store::{ITreeStore, NodeCounts};
