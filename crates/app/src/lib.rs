//! # webthing-app
//!
//! Application layer: everything around a Web Thing that needs a runtime.
//!
//! ## Responsibilities
//! - Define **port traits** collaborators implement:
//!   - `ActionGenerator` — turn an inbound action request into an `Action`
//! - Provide **in-process infrastructure** that doesn't need IO:
//!   - `NotificationBus` — a `Notifier` fanning changes out over a broadcast channel
//! - Orchestrate the domain on a Tokio runtime:
//!   - `ActionRunner` — accept, start and dispatch action requests to the blocking pool
//!   - `spawn_property_updater` — periodic device reads committed through the cached path
//!   - `ThingRegistry` — one or many Things mounted under a base path
//!
//! ## Dependency rule
//! Depends on `webthing-domain` only (plus `tokio` and `tokio-stream`).
//! Transports depend on *this* crate, not the reverse.

pub mod action_runner;
pub mod notification_bus;
pub mod ports;
pub mod registry;
pub mod updater;
