//! Reports of allocations that are still outstanding.

use std::fmt;

use crate::CallSite;
use crate::record::AllocationRecord;

/// Which records a [`LeakReport`] was built from.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ReportScope {
    /// Records whose call site matched exactly (same source and same line).
    Site(CallSite),

    /// Records whose call site has this source name, on any line.
    Source(String),
}

impl ReportScope {
    /// The source name the report refers to.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Site(site) => site.source(),
            Self::Source(source) => source,
        }
    }

    pub(crate) fn matches(&self, record: &AllocationRecord) -> bool {
        match self {
            Self::Site(site) => record.site == *site,
            Self::Source(source) => record.source() == source,
        }
    }
}

/// One allocation that was still registered when the report was taken.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeakEntry {
    size: usize,
    site: CallSite,
}

impl LeakEntry {
    pub(crate) fn from_record(record: &AllocationRecord) -> Self {
        Self {
            size: record.size(),
            site: record.site.clone(),
        }
    }

    /// Number of bytes that were requested.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Where the allocation was requested from.
    #[must_use]
    pub fn site(&self) -> &CallSite {
        &self.site
    }
}

impl fmt::Display for LeakEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Memory leak detected: {} bytes at {}",
            self.size, self.site
        )
    }
}

/// Snapshot of the tracked allocations that matched a query.
///
/// A report is a plain value detached from the registry: it can be kept, sent to another
/// thread or printed after the registry has moved on. An empty report is a normal outcome
/// and still renders a summary line.
///
/// The order of entries follows the registry's internal traversal and carries no meaning.
///
/// # Examples
///
/// ```
/// use leak_registry::{CallSite, Registry};
///
/// let registry = Registry::new();
/// let site = CallSite::new("main.rs", 10);
///
/// let _leaked = registry.register(400, site.clone())?;
///
/// let report = registry.query_by_site(&site);
/// assert_eq!(report.count(), 1);
/// assert_eq!(
///     report.to_string(),
///     "Memory leak detected: 400 bytes at main.rs:10\n\
///      Total 1 memory leak(s) detected in file: main.rs"
/// );
/// # Ok::<(), leak_registry::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct LeakReport {
    scope: ReportScope,
    entries: Vec<LeakEntry>,
}

impl LeakReport {
    pub(crate) fn new(scope: ReportScope, entries: Vec<LeakEntry>) -> Self {
        Self { scope, entries }
    }

    /// The query this report answers.
    #[must_use]
    pub fn scope(&self) -> &ReportScope {
        &self.scope
    }

    /// The outstanding allocations that matched.
    #[must_use]
    pub fn entries(&self) -> &[LeakEntry] {
        &self.entries
    }

    /// Number of outstanding allocations that matched.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the sizes of all matching allocations.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().fold(0_u64, |total, entry| {
            let size: u64 = entry.size.try_into().expect("usize always fits into u64");
            total
                .checked_add(size)
                .expect("total leaked bytes overflows u64 - this indicates an unrealistic scenario")
        })
    }

    /// Prints the report to stderr, one line per entry followed by a summary line.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stderr output reliably - manually tested.
    pub fn print_to_stderr(&self) {
        eprintln!("{self}");
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }

        let source = self.scope.source();

        if self.entries.is_empty() {
            write!(f, "No memory leaks detected in file: {source}")
        } else {
            write!(
                f,
                "Total {} memory leak(s) detected in file: {source}",
                self.entries.len()
            )
        }
    }
}
