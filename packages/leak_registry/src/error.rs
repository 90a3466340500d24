use std::collections::TryReserveError;

use thiserror::Error;

use crate::{Allocation, CallSite};

/// Errors that can occur when registering or releasing tracked allocations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested size cannot be turned into a valid allocation request.
    #[error("cannot allocate {size} bytes: {problem}")]
    InvalidSize {
        /// The size that was requested.
        size: usize,

        /// A human-readable description of the problem.
        problem: &'static str,
    },

    /// The underlying allocator could not satisfy the request. No record was created.
    #[error("the allocator failed to provide {size} bytes")]
    AllocationFailed {
        /// The size that was requested.
        size: usize,
    },

    /// The memory was allocated but the registry could not record it.
    ///
    /// The allocation is handed back to the caller, who owns it from here on. It is not known to
    /// the registry, so it can be released with
    /// [`Registry::release_untracked()`][crate::Registry::release_untracked].
    #[error("allocated {} bytes at {site} but could not track them: {reason}", .allocation.size())]
    Bookkeeping {
        /// The untracked allocation, owned by the caller.
        allocation: Allocation,

        /// The call site the allocation was requested from.
        site: CallSite,

        /// Why the record could not be stored.
        reason: BookkeepingFailure,
    },

    /// A handle was presented for release but its address is not tracked by the registry.
    ///
    /// Only reported when the registry uses
    /// [`UntrackedReleasePolicy::Reject`][crate::UntrackedReleasePolicy::Reject]. The memory
    /// was not released.
    #[error("address {address:#x} is not tracked by this registry")]
    UntrackedRelease {
        /// The address that was presented.
        address: usize,
    },
}

/// Why a record for a successful allocation could not be stored.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BookkeepingFailure {
    /// The registry already holds the maximum number of live records it was configured with.
    #[error("registry is at its capacity of {max_records} live records")]
    CapacityReached {
        /// The configured limit.
        max_records: usize,
    },

    /// Memory for the record table could not be obtained.
    #[error("record table could not grow")]
    OutOfMemory(#[from] TryReserveError),
}

/// A specialized `Result` type for registry operations, returning the crate's [`Error`] type
/// as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);
    assert_impl_all!(BookkeepingFailure: Send, Sync, Debug);

    #[test]
    fn untracked_release_shows_hex_address() {
        let error = Error::UntrackedRelease { address: 0xbeef };
        assert_eq!(
            error.to_string(),
            "address 0xbeef is not tracked by this registry"
        );
    }

    #[test]
    fn capacity_reached_mentions_limit() {
        let reason = BookkeepingFailure::CapacityReached { max_records: 3 };
        assert_eq!(
            reason.to_string(),
            "registry is at its capacity of 3 live records"
        );
    }

    #[test]
    fn invalid_size_is_error() {
        let error = Error::InvalidSize {
            size: 0,
            problem: "zero-sized",
        };

        let result: Result<()> = Err(error);
        assert!(result.is_err());
    }
}
