//! Schema allow-list with `*` globs.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::warn;

/// Case-insensitive schema allow-list. An empty list allows everything.
///
/// Only `*` is a wildcard; every other character matches itself.
#[derive(Debug, Clone)]
pub struct SchemaFilter {
    patterns: Vec<String>,
    matcher: GlobSet,
}

impl Default for SchemaFilter {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl PartialEq for SchemaFilter {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for SchemaFilter {}

impl SchemaFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        let matcher = compile(&patterns);
        Self { patterns, matcher }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    #[must_use]
    pub fn allows(&self, schema: &str) -> bool {
        self.patterns.is_empty() || self.matcher.is_match(schema.trim())
    }

    /// Patterns rewritten as SQL `LIKE` operands (`*` becomes `%`).
    #[must_use]
    pub fn like_patterns(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.replace('*', "%")).collect()
    }
}

/// Build one case-insensitive glob per pattern with everything but `*` escaped.
fn compile(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let mut collapsed = pattern.clone();
        while collapsed.contains("**") {
            collapsed = collapsed.replace("**", "*");
        }
        let glob = collapsed
            .split('*')
            .map(globset::escape)
            .collect::<Vec<_>>()
            .join("*");
        match GlobBuilder::new(&glob).case_insensitive(true).build() {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern = %pattern, error = %e, "Ignoring invalid schema pattern"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Schema patterns failed to compile, no schema will match");
        GlobSet::empty()
    })
}
