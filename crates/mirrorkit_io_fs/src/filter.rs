//! Extension allowlist filter applied to file names.

use crate::spec::SpecCopyPolicy;

/// Extension of `name_file`, leading dot included.
///
/// Takes everything from the last `.` on. Returns `""` when there is no dot or
/// the dot is the final character, so `".bashrc"` yields `".bashrc"` and
/// `"notes."` yields `""`.
pub fn extension_of(name_file: &str) -> &str {
    match name_file.rfind('.') {
        Some(idx) if idx + 1 < name_file.len() => &name_file[idx..],
        _ => "",
    }
}

/// Whether `name_file` passes the policy's extension allowlist.
///
/// Exact, case-sensitive comparison. Directories are never passed here.
pub fn is_file_allowed(name_file: &str, spec_cp_policy: &SpecCopyPolicy) -> bool {
    match &spec_cp_policy.extensions_allowed {
        None => true,
        Some(set_ext) => set_ext.contains(extension_of(name_file)),
    }
}
