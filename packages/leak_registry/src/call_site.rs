use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

/// Identifies the place in source code that requested a tracked allocation.
///
/// A call site is a source name (typically a file path) plus a line number. The registry never
/// inspects or validates either part; they are recorded as given and compared for exact
/// equality when a report is requested.
///
/// # Examples
///
/// ```
/// use leak_registry::{CallSite, call_site};
///
/// let explicit = CallSite::new("src/parser.rs", 42);
/// assert_eq!(explicit.to_string(), "src/parser.rs:42");
///
/// // Captures the file and line where the macro is expanded.
/// let here = call_site!();
/// assert_eq!(here.source(), file!());
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CallSite {
    source: Cow<'static, str>,
    line: u32,
}

impl CallSite {
    /// Creates a call site from a source name and a line number.
    #[must_use]
    pub fn new(source: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self {
            source: source.into(),
            line,
        }
    }

    /// Creates a call site describing the location of the caller.
    ///
    /// Because this function is `#[track_caller]`, wrapping it in your own `#[track_caller]`
    /// helper attributes the allocation to whoever called the helper.
    ///
    /// # Examples
    ///
    /// ```
    /// use leak_registry::CallSite;
    ///
    /// let site = CallSite::caller();
    /// assert_eq!(site.source(), file!());
    /// assert_eq!(site.line(), line!() - 2);
    /// ```
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }

    /// The source name, usually a file path.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The line number within the source.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// Creates a [`CallSite`] for the location where the macro is invoked.
///
/// Expands to `CallSite::new(file!(), line!())`.
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(::core::file!(), ::core::line!())
    };
}
