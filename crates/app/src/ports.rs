//! Port definitions — traits that collaborators implement.
//!
//! Ports are the boundaries between the application core and the outside
//! world: device logic plugs in here without the core knowing about it.

pub mod action_generator;

pub use action_generator::ActionGenerator;
