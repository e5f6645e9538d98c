//! In-process recursive tree copy with extension filter and overwrite policy.
//!
//! Traversal is depth-first and pre-order. Inside one directory, files are
//! handled before subdirectories and both lists are sorted by name, so the
//! first conflict hit is the same on every platform. The first conflict ends
//! the whole call; files copied before it stay in place.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mirrorkit_log::Logger;

use crate::filter::is_file_allowed;
use crate::report::{ReportCopy, ReportCopyBuilder};
use crate::spec::{CopyResult, CopyTreeError, SpecCopyPolicy};
use crate::util::is_overlap;

#[derive(Debug, Clone)]
struct SpecDirEntry {
    path_src: PathBuf,
    name: OsString,
}

#[derive(Debug)]
struct SpecCopyContext<'a> {
    spec_cp_policy: &'a SpecCopyPolicy,
    logger: &'a Logger,
    builder_cp_report: ReportCopyBuilder,
    set_ancestor_dirs: HashSet<(u64, u64)>,
}

/// Tree copier bound to one logger handle.
#[derive(Debug, Clone, Default)]
pub struct TreeCopier {
    logger: Logger,
}

impl TreeCopier {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// See [`copy_tree`].
    pub fn copy<P, Q>(
        &self,
        dir_source: P,
        dir_destination: Q,
        spec_cp_policy: &SpecCopyPolicy,
    ) -> Result<ReportCopy, CopyTreeError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        copy_tree(dir_source, dir_destination, spec_cp_policy, &self.logger)
    }
}

/// Copy a directory tree from `dir_source` into `dir_destination`.
///
/// Returns a [`ReportCopy`] whose `result` is:
/// - [`CopyResult::Success`] when every entry was processed,
/// - [`CopyResult::Conflict`] with the colliding destination file when
///   `if_disallow_overwrite` is set and a file already exists,
/// - [`CopyResult::SourceMissing`] when `dir_source` does not exist; nothing is
///   created in that case.
///
/// Returns [`CopyTreeError`] for invalid inputs (source is a file, overlapping
/// trees, destination type mismatch) and IO failures.
pub fn copy_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_cp_policy: &SpecCopyPolicy,
    logger: &Logger,
) -> Result<ReportCopy, CopyTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref();
    let path_dir_dst = dir_destination.as_ref();

    match fs::metadata(path_dir_src) {
        Ok(meta_src) if !meta_src.is_dir() => {
            return Err(CopyTreeError::SourceNotDirectory(path_dir_src.to_path_buf()));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            logger.warn(format!(
                "[COPY] Source directory missing, nothing copied: {}",
                path_dir_src.display()
            ));
            return Ok(ReportCopyBuilder::default().build(CopyResult::SourceMissing));
        }
        Err(e) => return Err(CopyTreeError::io(path_dir_src, e)),
    }

    if is_overlap(path_dir_src, path_dir_dst) {
        return Err(CopyTreeError::SourceDestinationOverlap {
            source_dir: path_dir_src.to_path_buf(),
            destination_dir: path_dir_dst.to_path_buf(),
        });
    }

    let mut spec_cp_ctx = SpecCopyContext {
        spec_cp_policy,
        logger,
        builder_cp_report: ReportCopyBuilder::default(),
        set_ancestor_dirs: HashSet::new(),
    };

    let result = walk_directory(path_dir_src, path_dir_dst, &mut spec_cp_ctx)?;
    if let CopyResult::Conflict(path_conflict) = &result {
        logger.warn(format!(
            "[COPY] Aborted on existing destination file: {}",
            path_conflict.display()
        ));
    }

    let report = spec_cp_ctx.builder_cp_report.build(result);
    logger.debug(report.to_string());
    Ok(report)
}

/// Copy one file, creating the destination's parent directory when missing.
///
/// An existing destination file is overwritten. Returns the number of bytes
/// copied.
pub fn copy_file_safe<P, Q>(file_source: P, file_destination: Q) -> Result<u64, CopyTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_file_src = file_source.as_ref();
    let path_file_dst = file_destination.as_ref();

    if let Some(path_parent_dst) = path_file_dst.parent()
        && !path_parent_dst.as_os_str().is_empty()
    {
        fs::create_dir_all(path_parent_dst)
            .map_err(|e| CopyTreeError::io(path_parent_dst, e))?;
    }
    if path_file_dst.is_dir() {
        return Err(CopyTreeError::DestinationNotFile(path_file_dst.to_path_buf()));
    }
    fs::copy(path_file_src, path_file_dst).map_err(|e| CopyTreeError::io(path_file_src, e))
}

fn walk_directory(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    spec_cp_ctx: &mut SpecCopyContext<'_>,
) -> Result<CopyResult, CopyTreeError> {
    // Ancestors only: a link to an already copied sibling is copied again.
    let id_dir = dir_identity(path_dir_src)?;
    if let Some(id) = id_dir
        && !spec_cp_ctx.set_ancestor_dirs.insert(id)
    {
        let c_warning = format!("Directory loop skipped: {}", path_dir_src.display());
        spec_cp_ctx.logger.warn(&c_warning);
        spec_cp_ctx.builder_cp_report.add_warning(c_warning);
        return Ok(CopyResult::Success);
    }

    let res_copy = copy_directory_entries(path_dir_src, path_dir_dst, spec_cp_ctx);
    if let Some(id) = id_dir {
        spec_cp_ctx.set_ancestor_dirs.remove(&id);
    }
    res_copy
}

fn copy_directory_entries(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    spec_cp_ctx: &mut SpecCopyContext<'_>,
) -> Result<CopyResult, CopyTreeError> {
    ensure_destination_dir(path_dir_dst, spec_cp_ctx)?;
    let (l_files, l_dirs) = list_directory(path_dir_src, spec_cp_ctx)?;

    for spec_file_entry in l_files {
        spec_cp_ctx.builder_cp_report.add_scanned();
        let name_file = spec_file_entry.name.to_string_lossy();
        if !is_file_allowed(&name_file, spec_cp_ctx.spec_cp_policy) {
            spec_cp_ctx.builder_cp_report.add_filtered();
            spec_cp_ctx.logger.verbose(format!(
                "[COPY] Filtered: {}",
                spec_file_entry.path_src.display()
            ));
            continue;
        }
        spec_cp_ctx.builder_cp_report.add_matched();

        let path_file_dst = path_dir_dst.join(&spec_file_entry.name);
        match fs::symlink_metadata(&path_file_dst) {
            Ok(meta_dst) if meta_dst.is_dir() => {
                return Err(CopyTreeError::DestinationNotFile(path_file_dst));
            }
            Ok(_) if spec_cp_ctx.spec_cp_policy.if_disallow_overwrite => {
                return Ok(CopyResult::Conflict(path_file_dst));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CopyTreeError::io(path_file_dst, e)),
        }

        fs::copy(&spec_file_entry.path_src, &path_file_dst)
            .map_err(|e| CopyTreeError::io(&spec_file_entry.path_src, e))?;
        spec_cp_ctx.builder_cp_report.add_copied();
        spec_cp_ctx.logger.debug(format!(
            "[COPY] {} -> {}",
            spec_file_entry.path_src.display(),
            path_file_dst.display()
        ));
    }

    for spec_dir_entry in l_dirs {
        let path_dir_dst_sub = path_dir_dst.join(&spec_dir_entry.name);
        let result = walk_directory(&spec_dir_entry.path_src, &path_dir_dst_sub, spec_cp_ctx)?;
        if !result.is_success() {
            return Ok(result);
        }
    }

    Ok(CopyResult::Success)
}

/// `(dev, ino)` of a directory, following links.
#[cfg(unix)]
fn dir_identity(path_dir_src: &Path) -> Result<Option<(u64, u64)>, CopyTreeError> {
    use std::os::unix::fs::MetadataExt;

    let stat_dir = fs::metadata(path_dir_src).map_err(|e| CopyTreeError::io(path_dir_src, e))?;
    Ok(Some((stat_dir.dev(), stat_dir.ino())))
}

#[cfg(not(unix))]
fn dir_identity(_path_dir_src: &Path) -> Result<Option<(u64, u64)>, CopyTreeError> {
    Ok(None)
}

fn ensure_destination_dir(
    path_dir_dst: &Path,
    spec_cp_ctx: &mut SpecCopyContext<'_>,
) -> Result<(), CopyTreeError> {
    match fs::metadata(path_dir_dst) {
        Ok(meta_dst) if meta_dst.is_dir() => Ok(()),
        Ok(_) => Err(CopyTreeError::DestinationNotDirectory(
            path_dir_dst.to_path_buf(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path_dir_dst).map_err(|e| CopyTreeError::io(path_dir_dst, e))?;
            spec_cp_ctx.builder_cp_report.add_dir_created();
            Ok(())
        }
        Err(e) => Err(CopyTreeError::io(path_dir_dst, e)),
    }
}

/// Split directory entries into sorted `(files, dirs)`.
///
/// Links are followed. Entries that resolve to neither kind are skipped with a
/// warning.
fn list_directory(
    path_dir_src: &Path,
    spec_cp_ctx: &mut SpecCopyContext<'_>,
) -> Result<(Vec<SpecDirEntry>, Vec<SpecDirEntry>), CopyTreeError> {
    let iter_entries =
        fs::read_dir(path_dir_src).map_err(|e| CopyTreeError::io(path_dir_src, e))?;

    let mut l_files = Vec::new();
    let mut l_dirs = Vec::new();
    for _entry_res in iter_entries {
        let entry = _entry_res.map_err(|e| CopyTreeError::io(path_dir_src, e))?;
        let path_entry = entry.path();

        let meta_entry = match fs::metadata(&path_entry) {
            Ok(v) => v,
            Err(e) => {
                spec_cp_ctx.builder_cp_report.add_warning(format!(
                    "Failed to inspect {} ({e})",
                    path_entry.display()
                ));
                continue;
            }
        };

        let spec_dir_entry = SpecDirEntry {
            path_src: path_entry,
            name: entry.file_name(),
        };
        if meta_entry.is_dir() {
            l_dirs.push(spec_dir_entry);
        } else if meta_entry.is_file() {
            l_files.push(spec_dir_entry);
        } else {
            spec_cp_ctx.builder_cp_report.add_warning(format!(
                "Special file skipped: {}",
                spec_dir_entry.path_src.display()
            ));
        }
    }

    l_files.sort_by(|a, b| a.name.cmp(&b.name));
    l_dirs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((l_files, l_dirs))
}
