use std::alloc::{GlobalAlloc, Layout, System};
use std::any::type_name;
use std::fmt;
use std::num::NonZero;
use std::ptr::NonNull;

use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::record::AllocationRecord;
use crate::{
    ALLOCATION_ALIGN, Allocation, BookkeepingFailure, CallSite, Error, LeakEntry, LeakReport,
    RegistryBuilder, ReportScope, Result, UntrackedReleasePolicy,
};

/// What happened when a handle was presented to [`Registry::deregister()`].
///
/// None of these outcomes is an error: releasing nothing is allowed and, unless the registry is
/// configured otherwise, so is releasing an address the registry does not know about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Release {
    /// No handle was presented. Nothing happened.
    Null,

    /// The address was tracked. Its record was removed and the memory released.
    Tracked,

    /// The address was not tracked. No record was removed but the memory was released.
    Untracked,
}

/// Tracks allocations together with the call site that requested them.
///
/// Every successful [`register()`](Self::register) allocates memory and records its address,
/// size and call site. [`deregister()`](Self::deregister) removes the record and releases the
/// memory. At any point, [`query_by_site()`](Self::query_by_site) reports which allocations
/// from a given call site are still outstanding.
///
/// The registry holds exactly the set of allocations that were registered and not yet
/// deregistered. All operations take one exclusive lock, which is never held while memory is
/// being obtained from or returned to the allocator.
///
/// There is no global instance. Create one and share it, typically through an
/// [`Arc`][std::sync::Arc], with whatever needs to allocate through it.
///
/// # Examples
///
/// ```
/// use leak_registry::{CallSite, Registry};
///
/// let registry = Registry::new();
/// let site_a = CallSite::new("main.rs", 10);
/// let site_b = CallSite::new("main.rs", 11);
///
/// let _a = registry.register(400, site_a.clone())?;
/// let b = registry.register(200, site_b.clone())?;
///
/// // SAFETY: `b` came from this registry and is released once.
/// unsafe { registry.deregister(Some(b))? };
///
/// assert_eq!(registry.query_by_site(&site_a).count(), 1);
/// assert_eq!(registry.query_by_site(&site_b).count(), 0);
/// # Ok::<(), leak_registry::Error>(())
/// ```
///
/// # Thread safety
///
/// The registry is thread-safe ([`Send`] and [`Sync`]) whenever its allocator is. Operations
/// are linearizable: each one appears to take effect at the moment it acquires the lock.
pub struct Registry<A: GlobalAlloc = System> {
    allocator: A,

    // Keyed by address. Queries by call site scan all values.
    records: Mutex<HashMap<usize, AllocationRecord>>,

    untracked_release_policy: UntrackedReleasePolicy,
    max_records: Option<NonZero<usize>>,
}

impl Registry {
    /// Creates a registry backed by the system allocator with default settings.
    ///
    /// Use [`Registry::builder()`] for custom configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: GlobalAlloc> Registry<A> {
    pub(crate) fn from_parts(
        allocator: A,
        untracked_release_policy: UntrackedReleasePolicy,
        max_records: Option<NonZero<usize>>,
    ) -> Self {
        Self {
            allocator,
            records: Mutex::new(HashMap::new()),
            untracked_release_policy,
            max_records,
        }
    }

    /// Allocates `size` bytes and starts tracking them under `site`.
    ///
    /// The returned memory is uninitialized and aligned to [`ALLOCATION_ALIGN`].
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidSize`] if `size` is zero or too large to describe. Nothing is allocated.
    /// * [`Error::AllocationFailed`] if the allocator returns no memory. Nothing is tracked.
    /// * [`Error::Bookkeeping`] if the memory was allocated but could not be recorded. The
    ///   error carries the allocation, which the caller now owns and must release with
    ///   [`release_untracked()`](Self::release_untracked).
    pub fn register(&self, size: usize, site: CallSite) -> Result<Allocation> {
        let layout = layout_for(size)?;

        // SAFETY: `layout_for()` never returns a zero-sized layout.
        let ptr = unsafe { self.allocator.alloc(layout) };

        let Some(ptr) = NonNull::new(ptr) else {
            return Err(Error::AllocationFailed { size });
        };

        let allocation = Allocation::new(ptr, layout);
        let address = allocation.address();

        trace!(address, size, %site, "registering allocation");

        let mut records = self.records.lock();

        if let Err(reason) = self.reserve_record(&mut records, address) {
            drop(records);

            return Err(Error::Bookkeeping {
                allocation,
                site,
                reason,
            });
        }

        let replaced = records.insert(
            address,
            AllocationRecord {
                address,
                layout,
                site,
            },
        );

        drop(records);

        if let Some(replaced) = replaced {
            // Only possible if memory was released behind our back and the allocator reused it.
            warn!(
                address,
                replaced_size = replaced.size(),
                replaced_site = %replaced.site,
                "address was already registered, previous record overwritten"
            );
        }

        Ok(allocation)
    }

    /// Stops tracking `handle` and releases its memory.
    ///
    /// Presenting `None` does nothing and succeeds. Presenting an address that is not tracked
    /// (already deregistered, or never registered) removes nothing; what happens to the memory
    /// is decided by the registry's [`UntrackedReleasePolicy`]. With the default policy the
    /// memory is released anyway and the call succeeds.
    ///
    /// The registry does not detect a handle being released twice. With the default policy,
    /// a second release of the same handle frees memory that is no longer owned.
    ///
    /// # Errors
    ///
    /// [`Error::UntrackedRelease`] if the address is not tracked and the registry uses
    /// [`UntrackedReleasePolicy::Reject`]. The memory is left untouched in that case.
    ///
    /// # Safety
    ///
    /// A non-null `handle` must describe memory allocated by this registry's allocator with the
    /// handle's layout, and must not have been released already, unless the registry uses
    /// [`UntrackedReleasePolicy::Reject`] and the address is not currently tracked.
    pub unsafe fn deregister(&self, handle: Option<Allocation>) -> Result<Release> {
        let Some(allocation) = handle else {
            return Ok(Release::Null);
        };

        let address = allocation.address();
        let removed = self.records.lock().remove(&address);

        let Some(record) = removed else {
            // SAFETY: Forwarding the caller's guarantees.
            return unsafe { self.handle_untracked_release(allocation) };
        };

        trace!(
            address,
            size = record.size(),
            site = %record.site,
            "deregistering allocation"
        );

        // SAFETY: The record shows this allocator produced `address` with `record.layout` and the
        // record is removed exactly once, so this is the only release for that registration.
        unsafe {
            self.allocator.dealloc(allocation.as_ptr(), record.layout);
        }

        Ok(Release::Tracked)
    }

    /// Releases memory that the registry is not tracking, without consulting or changing its
    /// records.
    ///
    /// This is the way to give back the allocation carried by [`Error::Bookkeeping`].
    ///
    /// # Safety
    ///
    /// `allocation` must describe memory allocated by this registry's allocator with the
    /// handle's layout, must not be tracked by the registry and must not have been released.
    pub unsafe fn release_untracked(&self, allocation: Allocation) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.allocator
                .dealloc(allocation.as_ptr(), allocation.layout());
        }
    }

    /// Reports the tracked allocations whose call site equals `site` exactly.
    ///
    /// Both the source name and the line must match. The report is a consistent snapshot: no
    /// registration or deregistration interleaves with the scan.
    #[must_use]
    pub fn query_by_site(&self, site: &CallSite) -> LeakReport {
        self.query(ReportScope::Site(site.clone()))
    }

    /// Reports the tracked allocations made from any line of `source`.
    #[must_use]
    pub fn query_by_source(&self, source: &str) -> LeakReport {
        self.query(ReportScope::Source(source.to_owned()))
    }

    /// Number of live tracked allocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no allocations are being tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Sum of the sizes of all live tracked allocations.
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        let records = self.records.lock();

        records.values().fold(0_u64, |total, record| {
            let size: u64 = record.size().try_into().expect("usize always fits into u64");
            total
                .checked_add(size)
                .expect("live bytes overflows u64 - this indicates an unrealistic scenario")
        })
    }

    /// The configured policy for releases of untracked addresses.
    #[must_use]
    pub fn untracked_release_policy(&self) -> UntrackedReleasePolicy {
        self.untracked_release_policy
    }

    fn query(&self, scope: ReportScope) -> LeakReport {
        let entries = {
            let records = self.records.lock();

            records
                .values()
                .filter(|record| scope.matches(record))
                .map(LeakEntry::from_record)
                .collect()
        };

        LeakReport::new(scope, entries)
    }

    fn reserve_record(
        &self,
        records: &mut HashMap<usize, AllocationRecord>,
        address: usize,
    ) -> std::result::Result<(), BookkeepingFailure> {
        if let Some(max_records) = self.max_records {
            // Overwriting an existing address does not grow the table.
            if records.len() >= max_records.get() && !records.contains_key(&address) {
                return Err(BookkeepingFailure::CapacityReached {
                    max_records: max_records.get(),
                });
            }
        }

        records.try_reserve(1)?;
        Ok(())
    }

    /// # Safety
    ///
    /// Same as `deregister()`, for an address that is not tracked.
    unsafe fn handle_untracked_release(&self, allocation: Allocation) -> Result<Release> {
        let address = allocation.address();

        match self.untracked_release_policy {
            UntrackedReleasePolicy::Ignore => {}
            UntrackedReleasePolicy::Log => {
                warn!(
                    address,
                    size = allocation.size(),
                    "releasing an address that is not tracked"
                );
            }
            UntrackedReleasePolicy::Reject => {
                debug!(address, "rejected release of an address that is not tracked");
                return Err(Error::UntrackedRelease { address });
            }
        }

        debug_assert!(self.untracked_release_policy.releases_memory());

        // SAFETY: The caller guarantees the handle is valid for release under the non-rejecting
        // policies, and the address is not tracked.
        unsafe {
            self.release_untracked(allocation);
        }

        Ok(Release::Untracked)
    }
}

impl<A: GlobalAlloc> fmt::Debug for Registry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("live_records", &self.len())
            .field("untracked_release_policy", &self.untracked_release_policy)
            .field("max_records", &self.max_records)
            .finish_non_exhaustive()
    }
}

impl<A: GlobalAlloc> Drop for Registry<A> {
    fn drop(&mut self) {
        let outstanding = self.records.get_mut().len();

        if outstanding != 0 {
            // The memory stays with whoever holds the handles.
            debug!(outstanding, "registry dropped while allocations are still tracked");
        }
    }
}

fn layout_for(size: usize) -> Result<Layout> {
    if size == 0 {
        return Err(Error::InvalidSize {
            size,
            problem: "zero-sized allocations cannot be tracked",
        });
    }

    Layout::from_size_align(size, ALLOCATION_ALIGN).map_err(|_| Error::InvalidSize {
        size,
        problem: "size exceeds the largest allocation the platform can describe",
    })
}
