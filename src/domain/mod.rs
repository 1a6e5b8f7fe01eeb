//! Entities, value objects and the pure rules that govern them.
//!
//! Nothing in here performs I/O. Storage and notification delivery are
//! reached only through the traits in `ports`.

pub mod authorization;
pub mod identity;
pub mod ids;
pub mod money;
pub mod notification;
pub mod ports;
pub mod settlement;
pub mod transaction;
pub mod vehicle;
