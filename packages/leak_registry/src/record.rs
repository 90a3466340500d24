use std::alloc::Layout;

use crate::CallSite;

/// One outstanding tracked allocation. Fields never change after creation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct AllocationRecord {
    pub(crate) address: usize,
    pub(crate) layout: Layout,
    pub(crate) site: CallSite,
}

impl AllocationRecord {
    pub(crate) fn size(&self) -> usize {
        self.layout.size()
    }

    pub(crate) fn source(&self) -> &str {
        self.site.source()
    }
}
