#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Concurrent registry of tracked allocations, reporting what is still outstanding per call site.
//!
//! Memory requested through a [`Registry`] is recorded together with the [`CallSite`] that
//! asked for it. Releasing the memory through the same registry removes the record. At any
//! time the registry can report which allocations made from a given call site (or from any
//! line of a given source file) are still outstanding. Those are the leaks, for reporting
//! purposes.
//!
//! The core types are:
//! - [`Registry`] - Allocates, tracks and releases memory, and answers queries
//! - [`CallSite`] - Source name and line that requested an allocation
//! - [`Allocation`] - Handle to tracked memory
//! - [`LeakReport`] - Snapshot of matching outstanding allocations, printable as text
//!
//! This package is meant as a development tool for finding leaks in code that manages raw
//! memory explicitly. It does not hook the global allocator.
//!
//! # Usage
//!
//! ```
//! use leak_registry::{Registry, call_site};
//!
//! let registry = Registry::new();
//!
//! let kept = registry.register(400, call_site!())?;
//! let released = registry.register(200, call_site!())?;
//!
//! // SAFETY: `released` came from this registry and is released exactly once.
//! unsafe { registry.deregister(Some(released))? };
//!
//! let report = registry.query_by_source(file!());
//! assert_eq!(report.count(), 1);
//! assert_eq!(report.entries()[0].size(), 400);
//!
//! // Prints:
//! // Memory leak detected: 400 bytes at src/lib.rs:<line>
//! // Total 1 memory leak(s) detected in file: src/lib.rs
//! report.print_to_stderr();
//! # _ = kept;
//! # Ok::<(), leak_registry::Error>(())
//! ```
//!
//! # Untracked releases
//!
//! Releasing a handle the registry does not know about (for example releasing the same handle
//! twice) is benign by default: no record is removed and the memory is released anyway. This
//! hides double-release bugs instead of detecting them. Configure a stricter
//! [`UntrackedReleasePolicy`] through [`Registry::builder()`] to have such releases logged or
//! rejected.
//!
//! # Logging
//!
//! The registry emits [`tracing`] events: `trace` for every registration and release, `warn`
//! for suspicious activity such as an address being registered twice. No subscriber is
//! installed by this package.

mod allocation;
mod builder;
mod call_site;
mod error;
mod policy;
mod record;
mod registry;
mod report;

pub use allocation::*;
pub use builder::*;
pub use call_site::*;
pub use error::*;
pub use policy::*;
pub use registry::*;
pub use report::*;
