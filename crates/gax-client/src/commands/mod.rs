//! User-facing flows, grouped by domain.
//!
//! Each sub-module adds an `impl Session` block. Flows absorb transport
//! failures where local state can stand in, and raise a notice instead.

pub mod account;
pub mod chats;
pub mod messaging;
