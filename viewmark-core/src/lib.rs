//! Viewpoint bookmarks for interactive 3D viewports: saved views restoring a chosen subset of attributes,
//! debounced back/forward history, and thumbnail previews.

pub mod commands;
pub mod config;
pub mod engine;
pub mod history;
pub mod id;
pub mod io;
pub mod lens;
pub mod navigation;
pub mod snapshot;
pub mod store;
pub mod thumbnail;

#[cfg(test)]
mod test_support;

pub use id::ViewId;
pub use navigation::NavigationController;
pub use snapshot::{Category, PartialSnapshot, RememberMask, Snapshot};
