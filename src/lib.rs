// Copyright 2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'metadata/store.rs' uses mmap to map a module file into memory

//! # dotshim
//!
//! A proxy-module generator for managed binary applications: given an
//! executable target, `dotshim` picks one of the dependencies the target
//! declares, produces a hollowed-out stand-in of that dependency with a
//! load-time hook injected, and writes the loader configuration that makes
//! the target bind to the stand-in instead of the original.
//!
//! ## How a generation run works
//!
//! 1. **Discovery** - the directory around the target is scanned for
//!    candidate modules and indexed by identity.
//! 2. **Resolution** - the target's declared references are walked in
//!    declaration order; platform base modules are skipped, and the first
//!    reference that resolves to a pure-managed, policy-acceptable candidate
//!    is selected.
//! 3. **Transformation** - the selected module is stripped (every method
//!    body becomes a bare return, resources are dropped) and a static module
//!    initializer is injected that calls the hook module's entry point.
//! 4. **Manifest synthesis** - an XML binding configuration is written next
//!    to the target redirecting the dependency to the proxy file, with an
//!    explicit version mapping when the dependency is strongly keyed.
//!
//! The proxy keeps the original's full public surface, so the target links
//! and runs unmodified; the first touch of any proxied member hands control
//! to the hook module.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotshim::prelude::*;
//!
//! let store = ImageStore::new();
//! let resolver = DirectoryResolver::new(vec![]);
//! let generator = ProxyGenerator::new(
//!     &store,
//!     &resolver,
//!     ResolutionPolicy::default(),
//!     Diagnostics::default(),
//! );
//!
//! let outcome = generator.generate("app/app.exe".as_ref())?;
//! println!("proxy written to {}", outcome.proxy_path.display());
//! # Ok::<(), dotshim::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

pub mod diagnostics;
pub mod manifest;
pub mod metadata;
pub mod pipeline;
pub mod prelude;
pub mod resolve;
pub mod transform;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;

pub use pipeline::{ProxyGenerator, ProxyOutcome};
