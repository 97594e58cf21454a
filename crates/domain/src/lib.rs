//! # webthing-domain
//!
//! Pure domain model for the Web of Things protocol family.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps
//! - Define **Things** (addressable devices and their Thing Description)
//! - Define **Properties** (typed, validated value cells with optional write-through)
//! - Define **Actions** (requested work with a monotonic lifecycle)
//! - Define **Events** (immutable, timestamped occurrences)
//! - Provide the shared-access handles ([`ThingHandle`], [`ActionHandle`])
//!   that guard every Thing and every Action behind its own reader/writer lock
//! - Declare the [`Notifier`] contract used to fan changes out to subscribers
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Delivery of notifications, scheduling of action work and transport all
//! live in the `app` crate or beyond.
//!
//! ## Lock order
//! A Thing lock is always taken before an Action lock. Callbacks
//! (forwarders excepted) and notifications never run while a lock taken by
//! the handles is held.

pub mod error;
pub mod time;

pub mod action;
pub mod event;
pub mod handle;
pub mod notifier;
pub mod property;
pub mod thing;

pub use action::{Action, ActionStatus};
pub use event::Event;
pub use handle::{ActionHandle, ThingHandle, WeakThingHandle};
pub use notifier::Notifier;
pub use property::{Property, PropertyMetadata, ValueForwarder};
pub use thing::Thing;
