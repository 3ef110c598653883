//! Concept-name → filename normalization.
//!
//! Lossy characters collapse to `-`; names whose slugs collide are
//! disambiguated with a numeric suffix so no file is silently overwritten.

use std::collections::HashSet;

/// Generate a filesystem-safe slug from a concept name.
pub fn slugify(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() { "concept".into() } else { slug }
}

/// Tracks assigned slugs within one emission pass and disambiguates
/// collisions (`resource`, `resource-2`, `resource-3`, …).
#[derive(Debug, Default)]
pub struct SlugSet {
    used: HashSet<String>,
}

impl SlugSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a unique slug for `name`.
    pub fn assign(&mut self, name: &str) -> String {
        let base = slugify(name);
        let mut candidate = base.clone();
        let mut n = 1usize;
        while self.used.contains(&candidate) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Resource"), "resource");
        assert_eq!(slugify("Content Type"), "content-type");
        assert_eq!(slugify("HTTP/2 Streams"), "http-2-streams");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
    }

    #[test]
    fn slugify_unicode_and_symbols() {
        assert_eq!(slugify("Café's Menu"), "café-s-menu");
        assert_eq!(slugify("!!!"), "concept");
        assert_eq!(slugify(""), "concept");
    }

    #[test]
    fn slug_set_disambiguates_collisions() {
        let mut set = SlugSet::new();
        assert_eq!(set.assign("Content Type"), "content-type");
        assert_eq!(set.assign("Content/Type"), "content-type-2");
        assert_eq!(set.assign("content.type"), "content-type-3");
        assert_eq!(set.assign("Resource"), "resource");
    }
}
