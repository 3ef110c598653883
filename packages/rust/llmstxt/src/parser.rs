//! llms.txt parser.
//!
//! Accepted shape:
//! - Line 1: `# Title`
//! - Optional: `> Summary blockquote`
//! - Optional sections: `## Section Name` followed by Markdown link lists
//! - Links: `- [Link Name](target): Optional description`

use conceptscribe_shared::{Result, ScribeError};
use regex::Regex;
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed representation of an llms.txt file.
#[derive(Debug, Clone)]
pub struct LlmsParsed {
    /// The H1 title.
    pub title: String,
    /// The blockquote summary (if present).
    pub summary: Option<String>,
    /// Named sections containing entries.
    pub sections: Vec<LlmsSection>,
    /// All entries across all sections (flat list for convenience).
    pub entries: Vec<LlmsEntry>,
}

impl LlmsParsed {
    /// Render the document's section/entry hierarchy as a short outline,
    /// suitable for inclusion in a reasoning-engine prompt.
    pub fn outline(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        if let Some(summary) = &self.summary {
            out.push_str(&format!("> {summary}\n"));
        }
        for section in &self.sections {
            out.push_str(&format!("## {}\n", section.title));
            for entry in &section.entries {
                out.push_str(&format!("- {}\n", entry.name));
            }
        }
        out
    }
}

/// A named section within the llms.txt (## heading).
#[derive(Debug, Clone)]
pub struct LlmsSection {
    /// Section title (from ## heading).
    pub title: String,
    /// Entries within this section.
    pub entries: Vec<LlmsEntry>,
}

/// A single linked entry in the llms.txt.
#[derive(Debug, Clone)]
pub struct LlmsEntry {
    /// Display name of the link.
    pub name: String,
    /// Link target (URL or relative file path).
    pub target: String,
    /// Optional description after the `:`.
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches `# Title` at the start of a line.
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#\s+(.+)$").expect("H1 regex"));

/// Matches `## Section Title`.
static H2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^##\s+(.+)$").expect("H2 regex"));

/// Matches `> Blockquote text`.
static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>\s*(.+)$").expect("blockquote regex"));

/// Matches `- [Name](target)` or `- [Name](target): Notes`.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-*]\s+\[([^\]]+)\]\(([^)]+)\)(?::\s*(.+))?$").expect("link regex")
});

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an llms.txt string into structured data.
pub fn parse_llms_txt(content: &str) -> Result<LlmsParsed> {
    let mut lines = content.lines().peekable();

    // --- Extract H1 title ---
    let title = loop {
        match lines.next() {
            Some(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Some(caps) = H1_RE.captures(trimmed) {
                    break caps[1].trim().to_string();
                }
                return Err(ScribeError::parse(
                    "llms.txt must start with an H1 heading (# Title)",
                ));
            }
            None => {
                return Err(ScribeError::parse("llms.txt is empty"));
            }
        }
    };

    // --- Extract optional blockquote summary ---
    let mut summary_parts: Vec<String> = Vec::new();
    let mut sections: Vec<LlmsSection> = Vec::new();
    let mut all_entries: Vec<LlmsEntry> = Vec::new();

    // Collect blockquote lines (may span multiple lines)
    while let Some(&line) = lines.peek() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            lines.next();
            continue;
        }
        if let Some(caps) = BLOCKQUOTE_RE.captures(trimmed) {
            summary_parts.push(caps[1].trim().to_string());
            lines.next();
        } else {
            break;
        }
    }

    let summary = if summary_parts.is_empty() {
        None
    } else {
        Some(summary_parts.join(" "))
    };

    // --- Parse sections and entries ---
    let mut current_section: Option<LlmsSection> = None;

    for line in lines {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        // New section heading?
        if let Some(caps) = H2_RE.captures(trimmed) {
            if let Some(section) = current_section.take() {
                sections.push(section);
            }
            current_section = Some(LlmsSection {
                title: caps[1].trim().to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        // Link entry?
        if let Some(caps) = LINK_RE.captures(trimmed) {
            let entry = LlmsEntry {
                name: caps[1].trim().to_string(),
                target: caps[2].trim().to_string(),
                notes: caps.get(3).map(|m| m.as_str().trim().to_string()),
            };
            all_entries.push(entry.clone());
            if let Some(ref mut section) = current_section {
                section.entries.push(entry);
            }
            continue;
        }

        // Other lines (descriptive text) — skip but don't error
    }

    if let Some(section) = current_section.take() {
        sections.push(section);
    }

    Ok(LlmsParsed {
        title,
        summary,
        sections,
        entries: all_entries,
    })
}
