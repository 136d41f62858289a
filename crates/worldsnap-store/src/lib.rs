//! Asynchronous storage flow for Worldsnap captures.
//!
//! Each capture session gets its own writer task. The session submits
//! snapshots without waiting; the writer turns each one into a JSON
//! document under the level directory and stops at the end marker.
//!
//! # Modules
//!
//! - [`backend`] -- [`JsonStorageBackend`], the session-facing entry point
//! - [`flow`] -- [`StorageFlow`], the channel-fed writer task
//! - [`layout`] -- Where each document lands on disk
//! - [`error`] -- Writer-side error types

pub mod backend;
pub mod error;
pub mod flow;
pub mod layout;

pub use backend::JsonStorageBackend;
pub use error::StoreError;
pub use flow::StorageFlow;
pub use layout::LevelLayout;
