use thiserror::Error;

/// The generic Error type, which provides coverage for all recoverable errors
/// this library can return.
///
/// Only genuinely recoverable conditions are represented here. Failures of
/// native calls on the toggle-reference and finalizer paths are *not*
/// recoverable — they indicate a broken lifetime invariant and abort via
/// panic, because a drop-driven finalizer has no safe way to propagate an
/// error to calling code. See [`crate::runtime`] for details.
///
/// # Error Categories
///
/// ## Metadata and Pattern Errors
/// - [`Error::InvalidGlob`] - A glob pattern produced an invalid regular expression
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors while reading metadata files
///
/// ## Native Interop Errors
/// - [`Error::NativeCall`] - A native call reported failure. When returned
///   from a [`crate::runtime::NativeBackend`] method invoked on the
///   toggle/finalizer path, the caller escalates this to a panic.
///
/// # Examples
///
/// ```rust
/// use girscope::{Error, metadata::Glob};
///
/// match Glob::structural("valid_[pattern]") {
///     Ok(glob) => assert!(glob.matches(Some("valid_p"))),
///     Err(Error::InvalidGlob { pattern, .. }) => {
///         eprintln!("bad pattern: {pattern}");
///     }
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A glob pattern could not be compiled into a regular expression.
    ///
    /// The rewrite engine treats this as "matches nothing": the offending
    /// rule is reported through [`crate::Diagnostics`] and skipped, and
    /// processing continues with the remaining rules.
    #[error("cannot compile glob pattern '{pattern}': {source}")]
    InvalidGlob {
        /// The original glob pattern from the rule
        pattern: String,
        /// The underlying regex compilation error
        #[source]
        source: regex::Error,
    },

    /// A native call reported failure for the given object address.
    ///
    /// Backends return this from reference-counting and toggle-reference
    /// operations. Inside the instance cache's toggle install and finalizer
    /// paths this is escalated to a panic carrying the call name and
    /// address, since those paths must not continue with a possibly
    /// double-freed object.
    #[error("native call '{call}' failed for object {address:#x}")]
    NativeCall {
        /// Name of the failing native entry point
        call: &'static str,
        /// Address of the native object the call operated on
        address: usize,
    },

    /// An error occurred during a file operation.
    ///
    /// Raised while reading metadata files from disk. Note that a *missing*
    /// metadata file is not an error: libraries without corrections simply
    /// have no file, and the parser returns an empty rule list for them.
    #[error("Error during File operations: {0}")]
    FileError(#[from] std::io::Error),
}

/// Specialized [`std::result::Result`] type for girscope operations.
pub type Result<T> = std::result::Result<T, Error>;
