use std::alloc::Layout;
use std::ptr::NonNull;

/// Alignment of every block handed out by [`Registry::register()`][crate::Registry::register].
///
/// Matches what `malloc()` guarantees on common 64-bit targets, so a tracked block can hold
/// any fundamental type.
pub const ALLOCATION_ALIGN: usize = 16;

/// Handle to a block of memory obtained from a [`Registry`][crate::Registry].
///
/// The handle is an opaque address plus the layout the memory was requested with. Like a raw
/// pointer it can be copied freely, which means nothing stops a caller from presenting the same
/// handle to [`Registry::deregister()`][crate::Registry::deregister] twice. The registry only
/// ever compares the address; it never reads or writes the memory.
///
/// # Examples
///
/// ```
/// use leak_registry::{Registry, call_site};
///
/// let registry = Registry::new();
/// let allocation = registry.register(64, call_site!())?;
///
/// assert_eq!(allocation.size(), 64);
///
/// // SAFETY: The handle came from this registry and is released exactly once.
/// unsafe { registry.deregister(Some(allocation))? };
/// # Ok::<(), leak_registry::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Allocation {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: The handle is only an address and a layout. The registry never dereferences it and
// whoever writes through the pointer is responsible for synchronizing that access.
unsafe impl Send for Allocation {}

// SAFETY: See `Send` above; there is no interior state to share.
unsafe impl Sync for Allocation {}

impl Allocation {
    pub(crate) fn new(ptr: NonNull<u8>, layout: Layout) -> Self {
        Self { ptr, layout }
    }

    /// Reassembles a handle from a pointer and the layout it was allocated with.
    ///
    /// This is how memory obtained outside the registry is presented to it, for example to
    /// release it through [`Registry::release_untracked()`][crate::Registry::release_untracked].
    ///
    /// # Safety
    ///
    /// If the handle is ever released through a registry, `ptr` must have been allocated by that
    /// registry's allocator with exactly `layout`, and must not have been released already.
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, layout: Layout) -> Self {
        Self::new(ptr, layout)
    }

    /// Pointer to the start of the block.
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// The address of the block, used as its identity by the registry.
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.addr().get()
    }

    /// Number of bytes that were requested.
    #[must_use]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// The layout the block was requested with.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }
}
