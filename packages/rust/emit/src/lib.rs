//! Output artifact emission: the File Sink and the concept-set writer.
//!
//! The sink persists text at a relative path, creating intermediate
//! directories and overwriting idempotently. The writer turns a finished
//! concept set into detail files plus the llms.txt index, written last so
//! it reflects the final set.

mod slug;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use conceptscribe_llmstxt::{IndexEntry, render_index};
use conceptscribe_shared::{Concept, Result, ScribeError};

pub use slug::{SlugSet, slugify};

// ---------------------------------------------------------------------------
// FileSink
// ---------------------------------------------------------------------------

/// Side-effecting file writer rooted at the run's output folder.
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    /// Create a sink rooted at `root`. The folder itself is the Runner's
    /// responsibility; the sink only creates subdirectories as needed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The sink's root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `content` at `relative_path` under the root.
    ///
    /// Creates parent directories as needed and overwrites idempotently:
    /// writing the same `(path, content)` twice yields the same final file.
    /// Writes go to a temp file first and are renamed into place, so a
    /// failed write never leaves a half-written artifact.
    pub fn write(&self, relative_path: &str, content: &str) -> Result<PathBuf> {
        let target = self.root.join(relative_path);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ScribeError::io(parent, e))?;
        }

        let file_name = target
            .file_name()
            .ok_or_else(|| ScribeError::parse(format!("invalid artifact path: {relative_path}")))?
            .to_string_lossy()
            .to_string();
        let temp = target.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&temp, content).map_err(|e| ScribeError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| ScribeError::io(&target, e))?;

        debug!(path = %target.display(), size = content.len(), "wrote artifact");
        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// Concept-set emission
// ---------------------------------------------------------------------------

/// Metadata for a single written artifact.
#[derive(Debug, Clone)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Result of emitting a complete concept set.
#[derive(Debug, Clone)]
pub struct EmittedSet {
    /// Path of the llms.txt index.
    pub index_path: PathBuf,
    /// Metadata for every written file, index included (last).
    pub artifacts: Vec<ArtifactMeta>,
}

/// Write the detail file for every concept, then the index.
///
/// Bullet order follows the slice order (concept insertion order). Every
/// bullet links to a file written by this same loop, so the index/file
/// invariant holds by construction for any run that reaches this point.
#[instrument(skip_all, fields(title = %title, concepts = concepts.len()))]
pub fn emit_concept_set(
    sink: &FileSink,
    title: &str,
    summary: &str,
    concepts: &[Concept],
) -> Result<EmittedSet> {
    let mut slugs = SlugSet::new();
    let mut entries = Vec::with_capacity(concepts.len());
    let mut artifacts = Vec::with_capacity(concepts.len() + 1);

    for concept in concepts {
        let file = format!("{}.md", slugs.assign(&concept.name));
        let content = render_concept(concept);
        sink.write(&file, &content)?;
        artifacts.push(artifact_meta(&file, &content));
        entries.push(IndexEntry {
            name: concept.name.clone(),
            file,
            summary: concept.summary.clone(),
        });
    }

    // The index is written last so it reflects the final concept set.
    let index = render_index(title, summary, &entries);
    let index_path = sink.write("llms.txt", &index)?;
    artifacts.push(artifact_meta("llms.txt", &index));

    info!(
        concepts = concepts.len(),
        index = %index_path.display(),
        "concept set emitted"
    );

    Ok(EmittedSet {
        index_path,
        artifacts,
    })
}

/// Render a concept's detail file.
fn render_concept(concept: &Concept) -> String {
    let mut out = format!("# {}\n\n", concept.name);

    let detail = concept.detail.trim();
    if detail.is_empty() {
        // A bullet must never point at an empty file
        out.push_str(concept.summary.trim());
        out.push('\n');
    } else {
        out.push_str(detail);
        out.push('\n');
    }

    if !concept.source_urls.is_empty() {
        out.push_str("\n## Sources\n\n");
        for url in &concept.source_urls {
            out.push_str(&format!("- <{url}>\n"));
        }
    }

    out
}

fn artifact_meta(filename: &str, content: &str) -> ArtifactMeta {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    ArtifactMeta {
        filename: filename.to_string(),
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes: content.len(),
    }
}
