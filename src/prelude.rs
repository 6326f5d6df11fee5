//! # dotshim Prelude
//!
//! Convenient single import for the types most callers need: the error and
//! result types, the pipeline entry points, and the metadata and manifest
//! types they produce and consume.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotshim operations
pub use crate::Error;

/// The result type used throughout dotshim
pub use crate::Result;

/// Per-run diagnostics context controlling verbose trace output
pub use crate::diagnostics::Diagnostics;

// ================================================================================================
// Pipeline Entry Points
// ================================================================================================

/// End-to-end proxy generation over one executable target
pub use crate::pipeline::{ProxyGenerator, ProxyOutcome, REDIRECT_VERSION};

// ================================================================================================
// Module Metadata
// ================================================================================================

/// Module identity components
pub use crate::metadata::identity::{ModuleIdentity, ModuleVersion, PublicKeyToken};

/// The in-memory module object graph
pub use crate::metadata::module::{ModuleAttributes, ModuleImage, TypeDef};

/// Module persistence
pub use crate::metadata::store::{ImageStore, ModuleStore};

// ================================================================================================
// Resolution
// ================================================================================================

/// Candidate discovery
pub use crate::resolve::index::{CandidateIndex, CandidateModule};

/// Reference selection and fallback resolution
pub use crate::resolve::resolver::{
    DirectoryResolver, ReferenceResolver, ResolutionPolicy, SelectedReference, SystemResolver,
};

// ================================================================================================
// Transformation and Manifests
// ================================================================================================

/// The load-time hook entry point description
pub use crate::transform::hook::HookContract;

/// Module stripping
pub use crate::transform::strip::strip_module;

/// Redirect manifest synthesis
pub use crate::manifest::{config_path_for, RedirectManifest};
