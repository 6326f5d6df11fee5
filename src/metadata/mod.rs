//! Module metadata: identity, object graph, and persistence.
//!
//! The object model here is deliberately narrow: exactly what the proxy
//! pipeline needs from a module: its identity tuple, the dependency
//! references it declares, types with methods and instruction streams,
//! embedded resources, and a member-reference table for calls across module
//! boundaries. Physical serialization sits behind the
//! [`store::ModuleStore`] seam.

pub mod identity;
pub mod method;
pub mod module;
pub mod store;
