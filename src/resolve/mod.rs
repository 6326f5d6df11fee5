//! Dependency discovery and resolution.
//!
//! [`index`] discovers candidate modules on disk; [`resolver`] walks a
//! target's declared references and selects the one to proxy.

pub mod index;
pub mod resolver;
