use std::alloc::{GlobalAlloc, System};
use std::num::NonZero;

use crate::{Registry, UntrackedReleasePolicy};

/// Builder for creating an instance of [`Registry`].
///
/// All settings are optional. Without any of them the builder produces the same registry as
/// [`Registry::new()`]: backed by the system allocator, unbounded, and treating untracked
/// releases as benign.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use leak_registry::{Registry, UntrackedReleasePolicy};
///
/// let registry = Registry::builder()
///     .untracked_release_policy(UntrackedReleasePolicy::Log)
///     .max_records(NonZero::new(10_000).unwrap())
///     .build();
///
/// assert!(registry.is_empty());
/// ```
#[derive(Debug)]
#[must_use]
pub struct RegistryBuilder<A = System> {
    allocator: A,
    untracked_release_policy: UntrackedReleasePolicy,
    max_records: Option<NonZero<usize>>,
}

impl RegistryBuilder {
    pub(crate) fn new() -> Self {
        Self {
            allocator: System,
            untracked_release_policy: UntrackedReleasePolicy::default(),
            max_records: None,
        }
    }
}

impl<A: GlobalAlloc> RegistryBuilder<A> {
    /// Sets the allocator that provides the tracked memory.
    ///
    /// The registry's own bookkeeping always uses the global allocator.
    pub fn allocator<B: GlobalAlloc>(self, allocator: B) -> RegistryBuilder<B> {
        RegistryBuilder {
            allocator,
            untracked_release_policy: self.untracked_release_policy,
            max_records: self.max_records,
        }
    }

    /// Sets the [policy][UntrackedReleasePolicy] for releases of addresses the registry does
    /// not track.
    pub fn untracked_release_policy(mut self, policy: UntrackedReleasePolicy) -> Self {
        self.untracked_release_policy = policy;
        self
    }

    /// Limits how many live records the registry will hold.
    ///
    /// Registering beyond the limit still performs the allocation but fails with
    /// [`Error::Bookkeeping`][crate::Error::Bookkeeping], handing the untracked allocation
    /// back to the caller. There is no limit by default.
    pub fn max_records(mut self, max_records: NonZero<usize>) -> Self {
        self.max_records = Some(max_records);
        self
    }

    /// Builds the registry with the configured settings.
    #[must_use]
    pub fn build(self) -> Registry<A> {
        Registry::from_parts(
            self.allocator,
            self.untracked_release_policy,
            self.max_records,
        )
    }
}
