//! Clipboard backends.
//!
//! Only an in-process backend exists so far; a platform backend plugs in by
//! implementing [`ClipboardBackend`](crate::application::clipboard_sync::ClipboardBackend).

pub mod memory;

pub use memory::MemoryClipboard;
