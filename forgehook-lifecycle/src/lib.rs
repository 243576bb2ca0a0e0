//! # forgehook-lifecycle — the Hook Lifecycle Engine
//!
//! Owns the install/start/stop/restart/uninstall/update/rollback/invoke
//! state machine (§4.1), dispatching to whichever [`forgehook_core::RuntimeAdapter`]
//! matches an instance's [`forgehook_core::Runtime`] kind, and the per-install
//! progress stream consumed by the external transport layer.

#![deny(missing_docs)]

pub mod engine;
pub mod progress_bus;

pub use engine::{HookLifecycleEngine, UpdateSource};
pub use progress_bus::ProgressBus;
