//! Copy/mirror specification models, outcomes and top-level error types.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default external mirroring program.
pub const C_MIRROR_PROGRAM_DEFAULT: &str = "robocopy";
/// Environment variable overriding [`SpecMirrorOptions::program`].
pub const C_ENV_MIRROR_PROGRAM: &str = "MIRRORKIT_MIRROR_PROGRAM";
/// Wildcard selecting every file.
pub const C_MIRROR_WILDCARD_ALL: &str = "*.*";
/// Exit code reported for conflicts, missing sources and process failures.
pub const N_EXIT_CODE_GENERIC_FAILURE: i32 = 1;

////////////////////////////////////////////////////////////////////////////////
// #region CopyPolicy

/// Input policy for `copy_tree`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecCopyPolicy {
    /// Allowed file extensions including the leading dot (`".txt"`).
    /// `None` accepts every file.
    pub extensions_allowed: Option<BTreeSet<String>>,
    /// Abort with a conflict when a destination file already exists.
    pub if_disallow_overwrite: bool,
}

impl SpecCopyPolicy {
    /// Accept every file and overwrite existing destination files.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Restrict copying to the given extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions_allowed = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Set the no-overwrite flag.
    pub fn with_disallow_overwrite(mut self, if_disallow_overwrite: bool) -> Self {
        self.if_disallow_overwrite = if_disallow_overwrite;
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CopyResult

/// Outcome of one copy or mirror call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyResult {
    /// Every entry was processed.
    Success,
    /// Destination file already existed under a no-overwrite policy.
    Conflict(PathBuf),
    /// Source directory does not exist; nothing was done.
    SourceMissing,
    /// External tool could not be launched, timed out or could not be awaited.
    ProcessFailed(String),
    /// External tool exited with a failure code.
    ExternalToolFailure(i32),
}

impl CopyResult {
    /// Integer form: `0` success, `1` generic failure, raw tool code otherwise.
    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Conflict(_) | Self::SourceMissing | Self::ProcessFailed(_) => {
                N_EXIT_CODE_GENERIC_FAILURE
            }
            Self::ExternalToolFailure(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the caller should treat this outcome as a failure.
    ///
    /// `SourceMissing` is a non-fatal no-op even though [`Self::code`] is `1`.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Success | Self::SourceMissing)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ProcessAndMirror

/// One child-process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecProcessInvocation {
    /// Program name (resolved through `PATH`) or path.
    pub program: OsString,
    /// Argument vector, passed through without shell quoting.
    pub args: Vec<OsString>,
    /// Working directory of the child; inherits the caller's when `None`.
    pub dir_working: Option<PathBuf>,
    /// Kill the child once this elapses. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl SpecProcessInvocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir_working: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn dir_working(mut self, dir_working: impl Into<PathBuf>) -> Self {
        self.dir_working = Some(dir_working.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Input options for `MirrorInvoker::mirror`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMirrorOptions {
    /// Mirroring program.
    pub program: OsString,
    /// File wildcards forwarded to the tool, one argument each.
    pub wildcards: Vec<String>,
    /// Skip empty subdirectories (`/S`) instead of copying all of them (`/E`).
    pub if_ignore_empty_dirs: bool,
    /// Optional bound on the tool's run time.
    pub timeout: Option<Duration>,
}

impl Default for SpecMirrorOptions {
    fn default() -> Self {
        Self {
            program: OsString::from(C_MIRROR_PROGRAM_DEFAULT),
            wildcards: vec![C_MIRROR_WILDCARD_ALL.to_string()],
            if_ignore_empty_dirs: false,
            timeout: None,
        }
    }
}

impl SpecMirrorOptions {
    /// Defaults, with the program taken from `MIRRORKIT_MIRROR_PROGRAM` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Defaults, with the program taken from `lookup(MIRRORKIT_MIRROR_PROGRAM)`.
    ///
    /// An empty value keeps the default program.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut spec_mirror_options = Self::default();
        if let Some(program) = lookup(C_ENV_MIRROR_PROGRAM)
            && !program.is_empty()
        {
            spec_mirror_options.program = program;
        }
        spec_mirror_options
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// "Top-level call failed" errors of `copy_tree` and `copy_file_safe`.
#[derive(Debug, Error)]
pub enum CopyTreeError {
    /// Source path exists but is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Source and destination overlap (`src` contains `dst` or vice versa).
    #[error(
        "Source and destination directories overlap: {} <-> {}",
        .source_dir.display(),
        .destination_dir.display()
    )]
    SourceDestinationOverlap {
        source_dir: PathBuf,
        destination_dir: PathBuf,
    },
    /// A directory was expected at a destination path holding something else.
    #[error("Destination is not a directory: {}", .0.display())]
    DestinationNotDirectory(PathBuf),
    /// A file was expected at a destination path holding a directory.
    #[error("Destination is a directory, expected file: {}", .0.display())]
    DestinationNotFile(PathBuf),
    /// Filesystem operation failed.
    #[error("IO failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CopyTreeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Child-process failures surfaced by `ProcessRunner::run`.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Spawn failed, typically because the executable was not found.
    #[error("Failed to launch process '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    /// Timeout elapsed; the child was killed.
    #[error("Process '{program}' timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    /// Waiting for the child failed.
    #[error("Failed to wait for process '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Input validation errors of `MirrorInvoker::mirror`.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Wildcard list is empty or holds a blank entry.
    #[error("Invalid mirror wildcard: {0}")]
    InvalidWildcard(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::PathBuf;

    use super::{C_ENV_MIRROR_PROGRAM, CopyResult, SpecCopyPolicy, SpecMirrorOptions};

    #[test]
    fn copy_result_codes_collapse_generic_failures() {
        assert_eq!(CopyResult::Success.code(), 0);
        assert_eq!(CopyResult::Conflict(PathBuf::from("x")).code(), 1);
        assert_eq!(CopyResult::SourceMissing.code(), 1);
        assert_eq!(CopyResult::ProcessFailed("boom".to_string()).code(), 1);
        assert_eq!(CopyResult::ExternalToolFailure(8).code(), 8);
    }

    #[test]
    fn copy_result_source_missing_is_not_fatal() {
        assert!(!CopyResult::SourceMissing.is_fatal());
        assert!(!CopyResult::Success.is_fatal());
        assert!(CopyResult::Conflict(PathBuf::from("x")).is_fatal());
        assert!(CopyResult::ExternalToolFailure(16).is_fatal());
    }

    #[test]
    fn copy_policy_builder_collects_extensions() {
        let spec_cp_policy = SpecCopyPolicy::allow_all()
            .with_extensions([".txt", ".md"])
            .with_disallow_overwrite(true);
        let set_ext = spec_cp_policy.extensions_allowed.expect("allowlist");
        assert!(set_ext.contains(".txt"));
        assert!(set_ext.contains(".md"));
        assert!(spec_cp_policy.if_disallow_overwrite);
    }

    #[test]
    fn mirror_options_default_to_robocopy_all_files() {
        let spec_mirror_options = SpecMirrorOptions::default();
        assert_eq!(spec_mirror_options.program, "robocopy");
        assert_eq!(spec_mirror_options.wildcards, vec!["*.*".to_string()]);
        assert!(!spec_mirror_options.if_ignore_empty_dirs);
        assert!(spec_mirror_options.timeout.is_none());
    }

    #[test]
    fn mirror_options_lookup_overrides_program() {
        let spec_mirror_options = SpecMirrorOptions::from_lookup(|key| {
            (key == C_ENV_MIRROR_PROGRAM).then(|| OsString::from("custom-mirror"))
        });
        assert_eq!(spec_mirror_options.program, "custom-mirror");
        assert_eq!(spec_mirror_options.wildcards, vec!["*.*".to_string()]);
    }

    #[test]
    fn mirror_options_lookup_ignores_unset_and_empty() {
        assert_eq!(SpecMirrorOptions::from_lookup(|_| None).program, "robocopy");
        assert_eq!(
            SpecMirrorOptions::from_lookup(|_| Some(OsString::new())).program,
            "robocopy"
        );
    }
}
