//! Directory mirroring through an external tool (`robocopy` by default).
//!
//! The tool's exit codes `0..=4` are success variants (nothing to do, files
//! copied, extra files present, mismatches). Anything else is a failure and is
//! returned verbatim.

use std::ffi::OsString;
use std::path::Path;

use mirrorkit_log::Logger;

use crate::process::ProcessRunner;
use crate::spec::{CopyResult, MirrorError, SpecMirrorOptions, SpecProcessInvocation};
use crate::util::validate_mirror_wildcards;

/// Copy subdirectories, skipping empty ones.
pub const C_FLAG_SUBDIRS_NON_EMPTY: &str = "/S";
/// Copy subdirectories, including empty ones.
pub const C_FLAG_SUBDIRS_ALL: &str = "/E";
/// Suppress file list, directory list, job header and job summary.
pub const L_FLAGS_QUIET: [&str; 4] = ["/NFL", "/NDL", "/NJH", "/NJS"];
/// Highest exit code the tool uses for a successful run.
pub const N_EXIT_CODE_SUCCESS_MAX: i32 = 4;

/// Whether the tool's exit code denotes success.
pub fn is_mirror_exit_success(n_exit_code: i32) -> bool {
    (0..=N_EXIT_CODE_SUCCESS_MAX).contains(&n_exit_code)
}

/// Argument vector: `src dst <wildcards..> <depth flag> <quiet flags..>`.
pub fn build_mirror_args(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    spec_mirror_options: &SpecMirrorOptions,
) -> Vec<OsString> {
    let n_args = 3 + spec_mirror_options.wildcards.len() + L_FLAGS_QUIET.len();
    let mut l_args = Vec::with_capacity(n_args);
    l_args.push(path_dir_src.as_os_str().to_os_string());
    l_args.push(path_dir_dst.as_os_str().to_os_string());
    l_args.extend(spec_mirror_options.wildcards.iter().map(OsString::from));
    l_args.push(OsString::from(if spec_mirror_options.if_ignore_empty_dirs {
        C_FLAG_SUBDIRS_NON_EMPTY
    } else {
        C_FLAG_SUBDIRS_ALL
    }));
    l_args.extend(L_FLAGS_QUIET.iter().map(OsString::from));
    l_args
}

/// Delegates bulk directory copies to the external mirroring tool.
#[derive(Debug, Clone, Default)]
pub struct MirrorInvoker {
    process_runner: ProcessRunner,
}

impl MirrorInvoker {
    pub fn new(logger: Logger) -> Self {
        Self {
            process_runner: ProcessRunner::new(logger),
        }
    }

    fn logger(&self) -> &Logger {
        self.process_runner.logger()
    }

    /// Mirror `dir_source` into `dir_destination`.
    ///
    /// Tool stdout is logged at info, stderr at error. Wildcards are validated
    /// before anything is launched.
    pub fn mirror<P, Q>(
        &self,
        dir_source: P,
        dir_destination: Q,
        spec_mirror_options: &SpecMirrorOptions,
    ) -> Result<CopyResult, MirrorError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path_dir_src = dir_source.as_ref();
        let path_dir_dst = dir_destination.as_ref();
        validate_mirror_wildcards(&spec_mirror_options.wildcards)?;

        let mut spec_invocation = SpecProcessInvocation::new(spec_mirror_options.program.clone())
            .args(build_mirror_args(path_dir_src, path_dir_dst, spec_mirror_options));
        spec_invocation.timeout = spec_mirror_options.timeout;

        let logger = self.logger();
        match self.process_runner.run_logged(&spec_invocation) {
            Ok(n_exit_code) if is_mirror_exit_success(n_exit_code) => {
                logger.debug(format!(
                    "[MIRROR] ok exit={n_exit_code} src={} dst={}",
                    path_dir_src.display(),
                    path_dir_dst.display()
                ));
                Ok(CopyResult::Success)
            }
            Ok(n_exit_code) => {
                logger.error(format!(
                    "[MIRROR] Failed exit={n_exit_code} src={} dst={}",
                    path_dir_src.display(),
                    path_dir_dst.display()
                ));
                Ok(CopyResult::ExternalToolFailure(n_exit_code))
            }
            Err(e) => {
                logger.error(format!(
                    "[MIRROR] {e} src={} dst={}",
                    path_dir_src.display(),
                    path_dir_dst.display()
                ));
                Ok(CopyResult::ProcessFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::Path;
    use std::sync::Arc;

    use mirrorkit_log::{EnumLogLevel, EnumLogRecordKind, Logger, MemoryLogSink};

    use super::{MirrorInvoker, build_mirror_args, is_mirror_exit_success};
    use crate::spec::{CopyResult, MirrorError, SpecMirrorOptions};

    fn invoker_with_sink() -> (MirrorInvoker, Arc<MemoryLogSink>) {
        let sink = Arc::new(MemoryLogSink::default());
        let logger = Logger::with_sink(EnumLogLevel::Info, sink.clone());
        (MirrorInvoker::new(logger), sink)
    }

    #[cfg(unix)]
    fn write_stub_tool(dir: &Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path_tool = dir.join("stub_mirror.sh");
        std::fs::write(&path_tool, format!("#!/bin/sh\n{body}\n")).expect("write stub");
        std::fs::set_permissions(&path_tool, std::fs::Permissions::from_mode(0o755))
            .expect("chmod stub");
        path_tool
    }

    #[cfg(unix)]
    fn stub_options(path_tool: &Path) -> SpecMirrorOptions {
        SpecMirrorOptions {
            program: path_tool.as_os_str().to_os_string(),
            ..SpecMirrorOptions::default()
        }
    }

    #[test]
    fn exit_codes_zero_to_four_are_success() {
        for n_exit_code in 0..=4 {
            assert!(is_mirror_exit_success(n_exit_code));
        }
        assert!(!is_mirror_exit_success(5));
        assert!(!is_mirror_exit_success(8));
        assert!(!is_mirror_exit_success(16));
        assert!(!is_mirror_exit_success(-1));
    }

    #[test]
    fn args_follow_tool_layout() {
        let l_args = build_mirror_args(
            Path::new("C:/src dir"),
            Path::new("D:/dst"),
            &SpecMirrorOptions::default(),
        );
        let l_expected = ["C:/src dir", "D:/dst", "*.*", "/E", "/NFL", "/NDL", "/NJH", "/NJS"]
            .iter()
            .map(OsString::from)
            .collect::<Vec<_>>();
        assert_eq!(l_args, l_expected);
    }

    #[test]
    fn args_use_non_empty_flag_and_every_wildcard() {
        let spec_mirror_options = SpecMirrorOptions {
            wildcards: vec!["*.txt".to_string(), "*.md".to_string()],
            if_ignore_empty_dirs: true,
            ..SpecMirrorOptions::default()
        };
        let l_args = build_mirror_args(Path::new("a"), Path::new("b"), &spec_mirror_options);
        assert_eq!(l_args[2], "*.txt");
        assert_eq!(l_args[3], "*.md");
        assert_eq!(l_args[4], "/S");
        assert_eq!(l_args.len(), 9);
    }

    #[test]
    fn blank_wildcard_rejected_before_launch() {
        let (mirror_invoker, sink) = invoker_with_sink();
        let spec_mirror_options = SpecMirrorOptions {
            program: OsString::from("definitely-not-a-real-binary"),
            wildcards: vec!["*.txt".to_string(), " ".to_string()],
            ..SpecMirrorOptions::default()
        };

        let err = mirror_invoker
            .mirror("src", "dst", &spec_mirror_options)
            .expect_err("must fail");
        assert!(matches!(err, MirrorError::InvalidWildcard(_)));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn missing_tool_is_process_failure_with_generic_code() {
        let (mirror_invoker, sink) = invoker_with_sink();
        let spec_mirror_options = SpecMirrorOptions {
            program: OsString::from("definitely-not-a-real-binary"),
            ..SpecMirrorOptions::default()
        };

        let result = mirror_invoker
            .mirror("src", "dst", &spec_mirror_options)
            .expect("mirror");
        assert!(matches!(result, CopyResult::ProcessFailed(_)));
        assert_eq!(result.code(), 1);
        assert!(sink.contains(EnumLogRecordKind::Error, "definitely-not-a-real-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn stub_exit_three_is_success() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_tool = write_stub_tool(tmp.path(), "exit 3");
        let (mirror_invoker, sink) = invoker_with_sink();

        let result = mirror_invoker
            .mirror(tmp.path().join("src"), tmp.path().join("dst"), &stub_options(&path_tool))
            .expect("mirror");
        assert_eq!(result, CopyResult::Success);
        assert_eq!(result.code(), 0);
        assert!(sink.messages(EnumLogRecordKind::Error).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn stub_exit_eight_is_failure_logged_with_both_paths() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_tool = write_stub_tool(tmp.path(), "exit 8");
        let (mirror_invoker, sink) = invoker_with_sink();
        let src = tmp.path().join("the_src");
        let dst = tmp.path().join("the_dst");

        let result = mirror_invoker
            .mirror(&src, &dst, &stub_options(&path_tool))
            .expect("mirror");
        assert_eq!(result, CopyResult::ExternalToolFailure(8));
        assert_eq!(result.code(), 8);

        let l_errors = sink.messages(EnumLogRecordKind::Error);
        assert!(l_errors.iter().any(|m| {
            m.contains("exit=8")
                && m.contains(&*src.to_string_lossy())
                && m.contains(&*dst.to_string_lossy())
        }));
    }

    #[cfg(unix)]
    #[test]
    fn stub_receives_argument_vector_and_output_is_logged() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_tool = write_stub_tool(tmp.path(), "echo \"$@\"; echo warn-line >&2; exit 1");
        let (mirror_invoker, sink) = invoker_with_sink();
        let src = tmp.path().join("s");
        let dst = tmp.path().join("d");

        let result = mirror_invoker
            .mirror(&src, &dst, &stub_options(&path_tool))
            .expect("mirror");
        assert_eq!(result, CopyResult::Success);

        let c_expected = format!(
            "{} {} *.* /E /NFL /NDL /NJH /NJS",
            src.display(),
            dst.display()
        );
        assert_eq!(sink.messages(EnumLogRecordKind::Info), vec![c_expected]);
        assert_eq!(sink.messages(EnumLogRecordKind::Error), vec!["warn-line"]);
    }

    #[cfg(unix)]
    #[test]
    fn stub_receives_bracket_and_brace_filespecs_verbatim() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_tool = write_stub_tool(tmp.path(), "echo \"$3|$4\"");
        let (mirror_invoker, sink) = invoker_with_sink();
        let spec_mirror_options = SpecMirrorOptions {
            wildcards: vec!["data[1.csv".to_string(), "notes{v2.txt".to_string()],
            ..stub_options(&path_tool)
        };

        let result = mirror_invoker
            .mirror(tmp.path().join("s"), tmp.path().join("d"), &spec_mirror_options)
            .expect("mirror");
        assert_eq!(result, CopyResult::Success);
        assert_eq!(
            sink.messages(EnumLogRecordKind::Info),
            vec!["data[1.csv|notes{v2.txt"]
        );
    }
}
