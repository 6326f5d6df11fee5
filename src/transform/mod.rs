//! Module transformation: stripping and hook injection.
//!
//! Both passes edit a [`crate::metadata::module::ModuleImage`] in memory;
//! persistence stays with the caller.

pub mod hook;
pub mod strip;
