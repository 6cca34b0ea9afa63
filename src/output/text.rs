//! Plain-text rendering of command results.

use std::io::{self, Write};

use bytesize::ByteSize;

use crate::actions::{BatchDeleteResult, DeleteResult};
use crate::duplicates::{DuplicateGroup, DuplicateStatistics};
use crate::pipeline::ScanSummary;
use crate::scanner::FileCategory;
use crate::store::ScanPathRecord;

pub fn write_scan_paths(out: &mut impl Write, paths: &[ScanPathRecord]) -> io::Result<()> {
    if paths.is_empty() {
        return writeln!(out, "No scan paths registered. Add one with `dupescan path add <DIR>`.");
    }
    for path in paths {
        let last = path
            .last_scan_completed
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        writeln!(
            out,
            "{:>4}  {:<10} {:>8} files {:>6} folders  last scan {}  {}",
            path.id,
            path.status.as_str(),
            path.files_found,
            path.folders_found,
            last,
            path.path.display()
        )?;
    }
    Ok(())
}

pub fn write_scan_summary(out: &mut impl Write, summary: &ScanSummary) -> io::Result<()> {
    let progress = &summary.progress;
    writeln!(
        out,
        "Session {} {}",
        summary.session_id,
        if summary.stopped { "stopped" } else { "completed" }
    )?;
    writeln!(out, "  Files scanned:    {}", progress.files_scanned)?;
    writeln!(out, "  Folders scanned:  {}", progress.folders_scanned)?;
    writeln!(out, "  Files hashed:     {}", progress.files_hashed)?;
    writeln!(out, "  Duplicate groups: {}", progress.duplicates_found)
}

/// Groups in order, one member per line with its record id.
pub fn write_groups(out: &mut impl Write, groups: &[DuplicateGroup]) -> io::Result<()> {
    if groups.is_empty() {
        return writeln!(out, "No duplicates found.");
    }

    for (index, group) in groups.iter().enumerate() {
        writeln!(
            out,
            "Group {} ({} files, {} each, {} wasted)  {}",
            index + 1,
            group.len(),
            ByteSize::b(group.total_size()),
            ByteSize::b(group.wasted_space()),
            short_digest(&group.digest)
        )?;
        for file in &group.files {
            writeln!(out, "  [{:>6}] {}", file.id, file.path.display())?;
        }
        writeln!(out)?;
    }

    let wasted: u64 = groups.iter().map(DuplicateGroup::wasted_space).sum();
    writeln!(
        out,
        "{} group(s), {} reclaimable",
        groups.len(),
        ByteSize::b(wasted)
    )
}

pub fn write_statistics(out: &mut impl Write, stats: &DuplicateStatistics) -> io::Result<()> {
    writeln!(out, "Files tracked:    {}", stats.total_files)?;
    writeln!(out, "Duplicate copies: {}", stats.total_duplicates)?;
    writeln!(
        out,
        "Wasted space:     {}",
        ByteSize::b(stats.total_wasted_space)
    )?;

    if !stats.duplicates_by_extension.is_empty() {
        writeln!(out, "By extension:")?;
        for (extension, count) in &stats.duplicates_by_extension {
            writeln!(
                out,
                "  {:<14} {:<10} {}",
                extension,
                FileCategory::from_extension(extension).as_str(),
                count
            )?;
        }
    }
    Ok(())
}

pub fn write_delete_result(out: &mut impl Write, result: &DeleteResult) -> io::Result<()> {
    writeln!(
        out,
        "{} {} ({})",
        if result.permanent { "Deleted" } else { "Trashed" },
        result.path.display(),
        ByteSize::b(result.size)
    )
}

pub fn write_batch_result(out: &mut impl Write, batch: &BatchDeleteResult) -> io::Result<()> {
    for result in &batch.successes {
        write_delete_result(out, result)?;
    }
    for (path, error) in &batch.failures {
        writeln!(out, "Failed  {}: {}", path.display(), error)?;
    }
    writeln!(out, "{}", batch.summary())
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
