//! CLI output formatting for the build run.
//!
//! Output is information-centric: what the run did to the corpus, not
//! which files it touched. One section per concern, counts first, with
//! the "nothing to do" case reading as the success it is.
//!
//! ```text
//! Posts
//!     2 built, 30 fresh, 1 failed
//! Extraction cache
//!     5 cached, 2 extracted (7 total)
//! Taxonomies
//!     4 pages written, 12 fresh
//! Search
//!     33 documents indexed
//! ```

use crate::pipeline::BuildReport;

/// Format the end-of-run summary.
pub fn format_build_summary(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Posts".to_string());
    let mut posts = format!(
        "    {} built, {} fresh",
        report.posts_written, report.posts_fresh
    );
    if report.failed > 0 {
        posts.push_str(&format!(", {} failed", report.failed));
    }
    lines.push(posts);

    if report.extraction_cache.total() > 0 {
        lines.push("Extraction cache".to_string());
        lines.push(format!("    {}", report.extraction_cache));
    }

    lines.push("Taxonomies".to_string());
    lines.push(format!(
        "    {} pages written, {} fresh",
        report.taxonomy_pages_written, report.taxonomy_pages_fresh
    ));

    if report.indexed > 0 {
        lines.push("Search".to_string());
        lines.push(format!("    {} documents indexed", report.indexed));
    }

    lines
}

pub fn print_build_summary(report: &BuildReport) {
    for line in format_build_summary(report) {
        println!("{line}");
    }
}
