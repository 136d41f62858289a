//! Interfaces to the live game the capture core is attached to.
//!
//! The core never reaches into game state directly. Everything it needs
//! from the running client (session identity, world context, the stats
//! refresh signal, the private container reset) goes through
//! [`GameContext`]; the overwrite prompt goes through
//! [`ConfirmationPrompt`].

use std::path::Path;

use worldsnap_types::{PlayerId, WorldInfo};

/// The running game session as seen by the capture core.
///
/// Implementations must be callable from any thread.
pub trait GameContext: Send + Sync {
    /// Whether the game runs a local single-occupant world rather than a
    /// remote connection.
    fn is_local(&self) -> bool;

    /// Display name of the local world, if one is running and named.
    fn local_level_name(&self) -> Option<String>;

    /// Address of the remote session, if connected to one.
    fn remote_address(&self) -> Option<String>;

    /// Current world context used for encoding.
    fn world_info(&self) -> WorldInfo;

    /// Identity of the local player, if known.
    fn local_player(&self) -> Option<PlayerId>;

    /// Advancement progress of the local player.
    fn advancements(&self) -> serde_json::Value;

    /// Ask the protocol layer to refresh session statistics so the
    /// metadata written at the end of the drain includes them. One-way; the
    /// core does not wait for an acknowledgment.
    fn request_stats_refresh(&self);

    /// Replace the local player's private container with a fresh, empty
    /// one so its contents cannot leak into a later capture.
    fn reset_private_container(&self);
}

/// User-facing yes/no prompt raised when a capture would overwrite an
/// existing level.
///
/// The prompt is fire-and-forget: the UI layer answers later through
/// [`CaptureSession::resolve_overwrite`].
///
/// [`CaptureSession::resolve_overwrite`]: crate::session::CaptureSession::resolve_overwrite
pub trait ConfirmationPrompt: Send + Sync {
    /// Ask whether the level `level_name` stored at `target` may be
    /// overwritten.
    fn request_overwrite(&self, level_name: &str, target: &Path);
}
