/// Determines how the registry treats a release of an address it does not track.
///
/// An untracked address shows up when a handle is released twice, when memory obtained
/// elsewhere is presented, or when a bookkeeping failure was ignored. By default this is
/// treated as benign: nothing is removed from the registry and the memory is released anyway.
/// That default hides double-release bugs, so stricter policies are available.
///
/// # Examples
///
/// ```
/// use leak_registry::{Registry, UntrackedReleasePolicy};
///
/// let registry = Registry::builder()
///     .untracked_release_policy(UntrackedReleasePolicy::Reject)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum UntrackedReleasePolicy {
    /// The memory is released and the call succeeds silently. This is the default.
    #[default]
    Ignore,

    /// The memory is released and the call succeeds, but a `warn` level event is emitted.
    Log,

    /// The call fails with [`Error::UntrackedRelease`][crate::Error::UntrackedRelease] and the
    /// memory is not released, since the registry cannot vouch that it is safe to do so.
    Reject,
}

impl UntrackedReleasePolicy {
    pub(crate) fn releases_memory(self) -> bool {
        !matches!(self, Self::Reject)
    }
}
