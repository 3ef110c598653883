//! llms.txt index renderer.
//!
//! Produces the index artifact emitted at the end of a run: an H1 title,
//! a blockquote topic summary, and one bullet per concept linking to its
//! detail file. The output round-trips through [`crate::parse_llms_txt`].

/// One concept bullet in the rendered index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Concept name as discovered.
    pub name: String,
    /// Relative path of the concept's detail file (e.g. `resource.md`).
    pub file: String,
    /// One-line summary shown after the link.
    pub summary: String,
}

/// Render the llms.txt index for a topic.
///
/// The bullet order follows the slice order, which the caller derives from
/// concept insertion order.
pub fn render_index(title: &str, summary: &str, entries: &[IndexEntry]) -> String {
    let mut out = String::with_capacity(256 + entries.len() * 96);

    out.push_str(&format!("# {}\n", title.trim()));

    let summary = summary.trim();
    if !summary.is_empty() {
        out.push('\n');
        out.push_str(&format!("> {summary}\n"));
    }

    if !entries.is_empty() {
        out.push('\n');
        for entry in entries {
            let summary = entry.summary.trim();
            if summary.is_empty() {
                out.push_str(&format!("- [{}]({})\n", entry.name, entry.file));
            } else {
                out.push_str(&format!("- [{}]({}): {summary}\n", entry.name, entry.file));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_llms_txt;

    fn sample_entries() -> Vec<IndexEntry> {
        vec![
            IndexEntry {
                name: "Resource".into(),
                file: "resource.md".into(),
                summary: "An addressable entity".into(),
            },
            IndexEntry {
                name: "Representation".into(),
                file: "representation.md".into(),
                summary: "A rendering of a resource's state".into(),
            },
        ]
    }

    #[test]
    fn renders_title_summary_and_bullets() {
        let out = render_index("REST", "Core concepts of the REST style.", &sample_entries());

        assert!(out.starts_with("# REST\n"));
        assert!(out.contains("> Core concepts of the REST style."));
        assert!(out.contains("- [Resource](resource.md): An addressable entity"));
        assert!(out.contains("- [Representation](representation.md):"));
    }

    #[test]
    fn bullet_order_follows_input_order() {
        let out = render_index("REST", "", &sample_entries());
        let resource = out.find("[Resource]").unwrap();
        let representation = out.find("[Representation]").unwrap();
        assert!(resource < representation);
    }

    #[test]
    fn empty_summary_omits_blockquote_and_colon() {
        let entries = vec![IndexEntry {
            name: "Resource".into(),
            file: "resource.md".into(),
            summary: "".into(),
        }];
        let out = render_index("REST", "", &entries);
        assert!(!out.contains('>'));
        assert!(out.contains("- [Resource](resource.md)\n"));
    }

    #[test]
    fn rendered_index_round_trips_through_parser() {
        let out = render_index("REST", "Core concepts.", &sample_entries());
        let parsed = parse_llms_txt(&out).unwrap();

        assert_eq!(parsed.title, "REST");
        assert_eq!(parsed.summary, Some("Core concepts.".into()));
        // Bullets sit directly under the title, no section heading
        assert!(parsed.sections.is_empty());
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].name, "Resource");
        assert_eq!(parsed.entries[0].target, "resource.md");
    }
}
