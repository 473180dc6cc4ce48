//! Worker-log reports: scrape the automation worker's free-form log files
//! into structured rows.
//!
//! The worker writes loosely formatted `.txt` logs: a `Process type:` marker
//! (`gl` or `vendor`), optional `Data:` blocks with one row per line, and
//! summary lines (`Company codes: ...`, `Vendors: ...`). All three shapes
//! are tolerated; rows are trimmed and deduplicated.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ReportError;

static PROCESS_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Process type:\s*(\w+)").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static VALUE_SEP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",|\||\s{2,}").unwrap());
static TOKEN_DIGITS_REST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+)\s+(\d{4,})\s+(.+)$").unwrap());
static SECTION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Process|Company codes:|Vendors:|Vendor names:|GL accounts:|Descriptions:)")
        .unwrap()
});

static COMPANY_CODES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Company codes:\s*(.+)").unwrap());
static GL_ACCOUNTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)GL accounts:\s*(.+)").unwrap());
static DESCRIPTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Descriptions:\s*(.+)").unwrap());
static VENDORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Vendors:\s*(.+)").unwrap());
static VENDOR_NAMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Vendor names:\s*(.+)").unwrap());

/// One GL-account row recovered from the logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlRow {
    pub company_code: String,
    pub gl_account: String,
    pub description: String,
}

/// One vendor row recovered from the logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VendorRow {
    pub company_code: String,
    pub vendor: String,
    pub vendor_name: String,
}

/// Deduplicated report over a log directory.
#[derive(Debug, Default)]
pub struct LogReport {
    pub gl: Vec<GlRow>,
    pub vendors: Vec<VendorRow>,
}

/// Parse every `.txt` log under `log_dir` (recursive). Unreadable files are
/// skipped; the directory itself must exist.
pub fn parse_log_dir(log_dir: &Path) -> Result<LogReport, ReportError> {
    if !log_dir.is_dir() {
        return Err(ReportError::DirNotFound(log_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_txt_files(log_dir, &mut files)?;
    files.sort();

    let mut report = LogReport::default();
    for path in &files {
        match std::fs::read_to_string(path) {
            Ok(text) => parse_log_text(&text, &mut report),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable log file");
            }
        }
    }

    dedup(&mut report.gl);
    dedup(&mut report.vendors);
    Ok(report)
}

/// Parse one log file's text into the report (no dedup at this level).
pub fn parse_log_text(text: &str, report: &mut LogReport) {
    let process = PROCESS_TYPE
        .captures(text)
        .map(|c| c[1].to_lowercase());
    let process = process.as_deref();

    // Data: blocks.
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        if !lines[i].trim().starts_with("Data:") {
            i += 1;
            continue;
        }
        i += 1;
        let mut block = Vec::new();
        while i < lines.len() {
            let cur = lines[i];
            if cur.trim().is_empty() || SECTION_START.is_match(cur.trim()) {
                break;
            }
            block.push(cur);
            i += 1;
        }
        for [a, b, c] in parse_data_block(&block) {
            match process {
                Some("gl") => report.gl.push(GlRow {
                    company_code: a,
                    gl_account: b,
                    description: c,
                }),
                Some("vendor") => report.vendors.push(VendorRow {
                    company_code: a,
                    vendor: b,
                    vendor_name: c,
                }),
                _ => {}
            }
        }
    }

    // Summary-style logs.
    if process == Some("gl") {
        if let (Some(cc), Some(gl), Some(desc)) = (
            summary_values(&COMPANY_CODES, text),
            summary_values(&GL_ACCOUNTS, text),
            summary_values(&DESCRIPTIONS, text),
        ) {
            for ((a, b), c) in cc.into_iter().zip(gl).zip(desc) {
                report.gl.push(GlRow {
                    company_code: a,
                    gl_account: b,
                    description: c,
                });
            }
        }
    }

    if process == Some("vendor") {
        if let (Some(cc), Some(v), Some(names)) = (
            summary_values(&COMPANY_CODES, text),
            summary_values(&VENDORS, text),
            summary_values(&VENDOR_NAMES, text),
        ) {
            for ((a, b), c) in cc.into_iter().zip(v).zip(names) {
                report.vendors.push(VendorRow {
                    company_code: a,
                    vendor: b,
                    vendor_name: c,
                });
            }
        }
    }
}

/// Parse a `Data:` block: one row per non-blank line, three columns.
///
/// Three strategies per line, in order: split on 2+ spaces, then
/// `token digits rest`, then a loose 3-way whitespace split.
fn parse_data_block(lines: &[&str]) -> Vec<[String; 3]> {
    let mut rows = Vec::new();
    for line in lines {
        let s = line.trim_end_matches('\n');
        if s.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = MULTI_SPACE
            .split(s.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() >= 3 {
            rows.push([
                parts[0].trim().to_string(),
                parts[1].trim().to_string(),
                parts[2].trim().to_string(),
            ]);
            continue;
        }

        if let Some(caps) = TOKEN_DIGITS_REST.captures(s) {
            rows.push([
                caps[1].to_string(),
                caps[2].to_string(),
                caps[3].trim().to_string(),
            ]);
            continue;
        }

        let parts: Vec<&str> = s.trim().splitn(3, char::is_whitespace).collect();
        if parts.len() == 3 {
            rows.push([
                parts[0].trim().to_string(),
                parts[1].trim().to_string(),
                parts[2].trim().to_string(),
            ]);
        }
    }
    rows
}

/// Extract a summary line's values, split on comma, pipe or 2+ spaces.
fn summary_values(re: &Regex, text: &str) -> Option<Vec<String>> {
    let caps = re.captures(text)?;
    let values: Vec<String> = VALUE_SEP
        .split(&caps[1])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some(values)
}

fn collect_txt_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ReportError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_txt_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "txt") {
            out.push(path);
        }
    }
    Ok(())
}

fn dedup<T: Clone + Eq + std::hash::Hash>(rows: &mut Vec<T>) {
    let mut seen = HashSet::new();
    rows.retain(|r| seen.insert(r.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_block_vendor_rows() {
        let text = "Process type: vendor\n\
            Data:\n\
            SG80  1000338436  SPEEDYLINK LOGISTICS SDN BHD\n\
            SG81  1000338437  ACME FREIGHT PTE LTD\n\
            \n\
            Process completed: 2026-03-02\n";

        let mut report = LogReport::default();
        parse_log_text(text, &mut report);

        assert_eq!(report.vendors.len(), 2);
        assert_eq!(report.vendors[0].company_code, "SG80");
        assert_eq!(report.vendors[0].vendor, "1000338436");
        assert_eq!(report.vendors[0].vendor_name, "SPEEDYLINK LOGISTICS SDN BHD");
        assert!(report.gl.is_empty());
    }

    #[test]
    fn data_block_token_digits_rest_fallback() {
        // Single spaces defeat the column split; the digits pattern catches it.
        let text = "Process type: gl\nData:\nSG80 400100 Freight charges\n";
        let mut report = LogReport::default();
        parse_log_text(text, &mut report);

        assert_eq!(report.gl.len(), 1);
        assert_eq!(report.gl[0].gl_account, "400100");
        assert_eq!(report.gl[0].description, "Freight charges");
    }

    #[test]
    fn data_block_loose_three_way_split() {
        let text = "Process type: gl\nData:\nSG80 abc Freight\n";
        let mut report = LogReport::default();
        parse_log_text(text, &mut report);

        assert_eq!(report.gl.len(), 1);
        assert_eq!(
            (
                report.gl[0].company_code.as_str(),
                report.gl[0].gl_account.as_str(),
                report.gl[0].description.as_str()
            ),
            ("SG80", "abc", "Freight")
        );
    }

    #[test]
    fn summary_lines_zip_shortest() {
        let text = "Process type: vendor\n\
            Company codes: SG80, SG81, SG82\n\
            Vendors: 1000338436 | 1000338437\n\
            Vendor names: SPEEDYLINK, ACME\n";

        let mut report = LogReport::default();
        parse_log_text(text, &mut report);

        assert_eq!(report.vendors.len(), 2);
        assert_eq!(report.vendors[1].company_code, "SG81");
        assert_eq!(report.vendors[1].vendor, "1000338437");
        assert_eq!(report.vendors[1].vendor_name, "ACME");
    }

    #[test]
    fn unknown_process_type_yields_nothing() {
        let text = "Data:\nSG80  400100  Freight\n";
        let mut report = LogReport::default();
        parse_log_text(text, &mut report);
        assert!(report.gl.is_empty());
        assert!(report.vendors.is_empty());
    }

    #[test]
    fn directory_walk_dedups_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2026");
        std::fs::create_dir_all(&nested).unwrap();

        let body = "Process type: vendor\nData:\nSG80  1000338436  SPEEDYLINK\n";
        std::fs::write(dir.path().join("log_a.txt"), body).unwrap();
        std::fs::write(nested.join("log_b.txt"), body).unwrap();
        std::fs::write(dir.path().join("notes.md"), "not a log").unwrap();

        let report = parse_log_dir(dir.path()).unwrap();
        assert_eq!(report.vendors.len(), 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_log_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ReportError::DirNotFound(_)));
    }
}
