//! `mirrorkit_io_fs` v1:
//! Directory synchronization engine.
//!
//! Modules:
//! - `copy`    : in-process recursive tree copy (fail-fast on conflict)
//! - `filter`  : extension allowlist
//! - `process` : child-process runner with line forwarding
//! - `mirror`  : external mirroring tool invocation
//! - `spec`    : options, outcomes and errors
//! - `report`  : run-time report model
//! - `util`    : shared helper functions

pub mod copy;
pub mod filter;
pub mod mirror;
pub mod process;
pub mod report;
pub mod spec;
mod util;

pub use copy::{TreeCopier, copy_file_safe, copy_tree};
pub use filter::{extension_of, is_file_allowed};
pub use mirror::{MirrorInvoker, build_mirror_args, is_mirror_exit_success};
pub use process::ProcessRunner;
pub use report::{ReportCopy, ReportCopyBuilder};
pub use spec::{
    C_ENV_MIRROR_PROGRAM, C_MIRROR_PROGRAM_DEFAULT, C_MIRROR_WILDCARD_ALL, CopyResult,
    CopyTreeError, MirrorError, N_EXIT_CODE_GENERIC_FAILURE, ProcessError, SpecCopyPolicy,
    SpecMirrorOptions, SpecProcessInvocation,
};
