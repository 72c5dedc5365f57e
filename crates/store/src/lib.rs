//! `vitrina-store` — durable key-value persistence for session state.
//!
//! Values are serialized to JSON and passed through base64 before they hit
//! the medium, so arbitrary Unicode round-trips exactly. The store also
//! supports a selective refresh: wipe everything, then restore only the
//! fixed session whitelist.

pub mod keys;
pub mod medium;
pub mod store;

pub use medium::{FileMedium, MemoryMedium, StorageMedium};
pub use store::Store;
