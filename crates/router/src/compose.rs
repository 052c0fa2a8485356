//! Final-response composition.
//!
//! The last agent's output is the primary surface. Prose gets a trailing
//! Sources block grouped by file with page lists; researcher notes get a
//! structured summary block; archivist reports get a terse acknowledgement.

use std::collections::BTreeMap;

use sage_core::{Citation, MemoryReport, ResearchNotes};

/// Append a formatted Sources block. Citations without a file id carry no
/// groupable source and are skipped.
pub fn append_citations(content: &str, citations: &[Citation]) -> String {
    // Group by file, collecting pages.
    let mut by_file: BTreeMap<i64, (String, Vec<u32>)> = BTreeMap::new();
    for citation in citations {
        let Some(file_id) = citation.file_id else {
            continue;
        };
        let entry = by_file.entry(file_id).or_insert_with(|| {
            (
                citation
                    .filename
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                Vec::new(),
            )
        });
        if let Some(page) = citation.page {
            if !entry.1.contains(&page) {
                entry.1.push(page);
            }
        }
    }

    if by_file.is_empty() {
        return content.to_string();
    }

    let mut lines = vec!["\n\n---\n**Sources:**".to_string()];
    for (i, (_, (filename, mut pages))) in by_file.into_iter().enumerate() {
        pages.sort_unstable();
        let line = if pages.is_empty() {
            format!("[{}] {filename}", i + 1)
        } else if pages.len() == 1 {
            format!("[{}] {filename} (p. {})", i + 1, pages[0])
        } else {
            let list = pages
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{}] {filename} (pp. {list})", i + 1)
        };
        lines.push(line);
    }

    format!("{content}{}", lines.join("\n"))
}

/// Format non-final researcher output for direct display.
pub fn format_research(notes: &ResearchNotes) -> String {
    let mut lines = Vec::new();

    if !notes.summary.is_empty() {
        lines.push(format!("**Summary:** {}", notes.summary));
        lines.push(String::new());
    }

    if !notes.key_findings.is_empty() {
        lines.push("**Key Findings:**".to_string());
        for finding in notes.key_findings.iter().take(10) {
            lines.push(format!("- {} {}", finding.finding, finding.source));
        }
        lines.push(String::new());
    }

    if !notes.themes.is_empty() {
        lines.push(format!("**Themes:** {}", notes.themes.join(", ")));
        lines.push(String::new());
    }

    if !notes.gaps.is_empty() {
        lines.push("**Information Gaps:**".to_string());
        for gap in &notes.gaps {
            lines.push(format!("- {gap}"));
        }
        lines.push(String::new());
    }

    lines.join("\n").trim_end().to_string()
}

/// Format archivist output by action. Explicit commands get a terse
/// acknowledgement; background analysis is mostly suppressed.
pub fn format_memory_report(report: &MemoryReport) -> String {
    match report {
        MemoryReport::Stored { category, .. } => {
            format!("Got it! I'll remember that. (Saved as {category} memory)")
        }
        MemoryReport::Forgotten { ids } => {
            let count = ids.len();
            if count > 0 {
                let plural = if count > 1 { "s" } else { "" };
                format!("Done. I've removed {count} related memory item{plural}.")
            } else {
                "I couldn't find any matching memories to forget.".to_string()
            }
        }
        MemoryReport::NoAction { reason } => reason.clone(),
        MemoryReport::Analysis { stored, .. } => {
            let count = stored.len();
            if count > 0 {
                let plural = if count > 1 { "s" } else { "" };
                format!("(Noted {count} item{plural} for future reference)")
            } else {
                String::new()
            }
        }
    }
}
