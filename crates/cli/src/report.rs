use chrono::DateTime;
use std::fmt::Write as _;
use swarm_indexer::{RootMetadata, RootOutcome, RootReport};
use swarm_search_index::SearchHit;

const PREVIEW_CHARS: usize = 200;

pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.\n".to_string();
    }

    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let record = &hit.record;
        let _ = writeln!(
            out,
            "[{}] {}:{}-{} ({}) score: {:.2}",
            i + 1,
            record.path,
            record.start_line,
            record.end_line,
            record.chunk_type,
            hit.score
        );
        for line in preview(&record.content).lines() {
            let _ = writeln!(out, "    {line}");
        }
        out.push('\n');
    }
    out
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

pub fn format_report(report: &RootReport) -> String {
    let root = report.root.display();
    match &report.outcome {
        RootOutcome::Unchanged => format!("{root}: up to date"),
        RootOutcome::Indexed(stats) => format!(
            "{root}: {} files processed, {} failed, {} skipped, {} chunks upserted in {}ms{}{}",
            stats.files_processed,
            stats.files_failed,
            stats.files_skipped,
            stats.chunks_upserted,
            stats.time_ms,
            if stats.files_removed > 0 {
                format!(", {} deleted files dropped", stats.files_removed)
            } else {
                String::new()
            },
            if stats.batches_failed > 0 {
                format!(" ({} batches failed, will retry next run)", stats.batches_failed)
            } else {
                String::new()
            }
        ),
        RootOutcome::Failed(reason) => format!("{root}: failed: {reason}"),
    }
}

/// Status block of one root; `up_to_date` is `None` when the current hash could not be computed.
pub fn format_status(
    root: &str,
    metadata: Option<&RootMetadata>,
    up_to_date: Option<bool>,
) -> String {
    let Some(meta) = metadata else {
        return format!("{root}\n   Status: not indexed\n");
    };

    let mut out = String::new();
    let _ = writeln!(out, "{root}");
    let _ = writeln!(
        out,
        "   Type: {} | Files: {} | Chunks: {}",
        meta.project_type, meta.stats.files_processed, meta.stats.chunks_upserted
    );
    let _ = writeln!(out, "   Last indexed: {}", format_unix(meta.last_indexed));
    let status = match (up_to_date, meta.content_hash.is_some()) {
        (_, false) => "incomplete (re-index needed)",
        (Some(true), true) => "up to date",
        (Some(false), true) => "changes detected (re-index needed)",
        (None, true) => "unknown",
    };
    let _ = writeln!(out, "   Status: {status}");
    out
}

/// `YYYY-MM-DD HH:MM:SS` UTC.
fn format_unix(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) if secs > 0 => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => "never".to_string(),
    }
}
