//! Copy report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

use crate::spec::CopyResult;

/// Outcome and counters for one `copy_tree` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCopy {
    /// Terminal outcome of the traversal.
    pub result: CopyResult,
    /// Total file entries scanned.
    pub cnt_scanned: u64,
    /// Number of scanned files that passed the extension filter.
    pub cnt_matched: u64,
    /// Number of files copied.
    pub cnt_copied: u64,
    /// Number of files rejected by the extension filter.
    pub cnt_filtered: u64,
    /// Number of destination directories created.
    pub cnt_dirs_created: u64,
    /// Non-fatal warnings collected during traversal.
    pub warnings: Vec<String>,
}

impl ReportCopy {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Integer result code, see [`CopyResult::code`].
    pub fn code(&self) -> i32 {
        self.result.code()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_filtered".to_string(), self.cnt_filtered);
        dict_counts.insert("cnt_dirs_created".to_string(), self.cnt_dirs_created);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} code={} scanned={} matched={} copied={} filtered={} dirs_created={} warnings={}",
            self.code(),
            dict_counts["cnt_scanned"],
            dict_counts["cnt_matched"],
            dict_counts["cnt_copied"],
            dict_counts["cnt_filtered"],
            dict_counts["cnt_dirs_created"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COPY]"))
    }
}

/// Mutable accumulator for copy statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportCopyBuilder {
    pub cnt_scanned: u64,
    pub cnt_matched: u64,
    pub cnt_copied: u64,
    pub cnt_filtered: u64,
    pub cnt_dirs_created: u64,
    pub warnings: Vec<String>,
}

impl ReportCopyBuilder {
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    pub fn add_matched(&mut self) {
        self.cnt_matched += 1;
    }

    pub fn add_copied(&mut self) {
        self.cnt_copied += 1;
    }

    pub fn add_filtered(&mut self) {
        self.cnt_filtered += 1;
    }

    pub fn add_dir_created(&mut self) {
        self.cnt_dirs_created += 1;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report carrying `result`.
    pub fn build(self, result: CopyResult) -> ReportCopy {
        ReportCopy {
            result,
            cnt_scanned: self.cnt_scanned,
            cnt_matched: self.cnt_matched,
            cnt_copied: self.cnt_copied,
            cnt_filtered: self.cnt_filtered,
            cnt_dirs_created: self.cnt_dirs_created,
            warnings: self.warnings,
        }
    }
}
