use crate::pattern::{IgnorePatternSet, Rule};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum IgnoreError {
    #[error("invalid ignore pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Compiled form of an [`IgnorePatternSet`].
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    set: GlobSet,
    rules: Vec<Rule>,
    // glob index -> rule index
    owners: Vec<usize>,
}

impl IgnoreMatcher {
    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
            rules: Vec::new(),
            owners: Vec::new(),
        }
    }

    pub(crate) fn build(
        patterns: &[String],
        strict: bool,
    ) -> Result<(Self, Vec<IgnoreError>), IgnoreError> {
        let mut builder = GlobSetBuilder::new();
        let mut rules = Vec::new();
        let mut owners = Vec::new();
        let mut skipped = Vec::new();

        for raw in patterns {
            let Some(rule) = Rule::parse(raw) else {
                continue;
            };

            let compiled: Result<Vec<_>, _> = rule
                .globs()
                .iter()
                .map(|glob| {
                    GlobBuilder::new(glob)
                        .literal_separator(true)
                        .backslash_escape(true)
                        .build()
                })
                .collect();

            match compiled {
                Ok(globs) => {
                    let rule_index = rules.len();
                    for glob in globs {
                        builder.add(glob);
                        owners.push(rule_index);
                    }
                    rules.push(rule);
                }
                Err(source) => {
                    let err = IgnoreError::InvalidPattern {
                        pattern: raw.clone(),
                        source,
                    };
                    if strict {
                        return Err(err);
                    }
                    skipped.push(err);
                }
            }
        }

        let set = builder.build().map_err(|source| IgnoreError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok((Self { set, rules, owners }, skipped))
    }

    /// Number of rules that compiled.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` (repository-relative, `/`-separated) is excluded.
    pub fn should_ignore(&self, path: &str) -> bool {
        let path = normalize(path);
        if path.is_empty() || self.rules.is_empty() {
            return false;
        }

        self.set
            .matches(path)
            .into_iter()
            .map(|glob| self.owners[glob])
            .max()
            .is_some_and(|rule| !self.rules[rule].negated)
    }
}

/// One-shot convenience over [`IgnorePatternSet::compile_lossy`].
pub fn should_ignore<S: AsRef<str>>(path: &str, patterns: &[S]) -> bool {
    let (matcher, _) = IgnorePatternSet::from_patterns(patterns).compile_lossy();
    matcher.should_ignore(path)
}

fn normalize(path: &str) -> &str {
    let mut path = path;
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> IgnoreMatcher {
        IgnorePatternSet::from_patterns(patterns)
            .compile()
            .expect("patterns compile")
    }

    #[test]
    fn negation_overrides_earlier_match() {
        let m = matcher(&["*.log", "!important.log"]);
        assert!(m.should_ignore("error.log"));
        assert!(!m.should_ignore("important.log"));
        assert!(m.should_ignore("logs/error.log"));
        assert!(!m.should_ignore("logs/important.log"));
    }

    #[test]
    fn later_pattern_can_exclude_again() {
        let m = matcher(&["*.log", "!important.log", "important.log"]);
        assert!(m.should_ignore("important.log"));
    }

    #[test]
    fn directory_glob_does_not_match_bare_directory() {
        let m = matcher(&["node_modules/**"]);
        assert!(m.should_ignore("node_modules/x.js"));
        assert!(m.should_ignore("node_modules/pkg/index.js"));
        assert!(!m.should_ignore("node_modules"));
        assert!(!m.should_ignore("sub/node_modules/x.js"));
    }

    #[test]
    fn recursive_directory_glob_matches_at_any_depth() {
        let m = matcher(&["**/node_modules/**"]);
        assert!(m.should_ignore("node_modules/x.js"));
        assert!(m.should_ignore("sub/node_modules/x.js"));
        assert!(!m.should_ignore("node_modules"));
        assert!(!m.should_ignore("src/modules/x.js"));
    }

    #[test]
    fn trailing_slash_matches_directory_contents_only() {
        let m = matcher(&["build/"]);
        assert!(m.should_ignore("build/out.js"));
        assert!(m.should_ignore("pkg/build/out.js"));
        assert!(!m.should_ignore("build"));
        assert!(!m.should_ignore("rebuild/out.js"));
    }

    #[test]
    fn leading_slash_anchors_to_root() {
        let m = matcher(&["/TODO"]);
        assert!(m.should_ignore("TODO"));
        assert!(!m.should_ignore("docs/TODO"));
    }

    #[test]
    fn plain_name_also_covers_directory_contents() {
        let m = matcher(&["secrets"]);
        assert!(m.should_ignore("secrets"));
        assert!(m.should_ignore("config/secrets/key.pem"));
    }

    #[test]
    fn star_does_not_cross_separators() {
        let m = matcher(&["src/*.rs"]);
        assert!(m.should_ignore("src/main.rs"));
        assert!(!m.should_ignore("src/bin/tool.rs"));
    }

    #[test]
    fn character_classes_and_single_char_wildcards() {
        let m = matcher(&["file?.[ch]"]);
        assert!(m.should_ignore("file1.c"));
        assert!(m.should_ignore("lib/fileA.h"));
        assert!(!m.should_ignore("file10.c"));
        assert!(!m.should_ignore("file1.o"));
    }

    #[test]
    fn leading_dot_slash_is_normalized() {
        let m = matcher(&["*.tmp"]);
        assert!(m.should_ignore("./a/b.tmp"));
        assert!(m.should_ignore("/b.tmp"));
    }

    #[test]
    fn results_are_stable_across_calls() {
        let m = matcher(&["*.log", "!keep.log", "dist/"]);
        for path in ["a.log", "keep.log", "dist/x", "src/lib.rs"] {
            let first = m.should_ignore(path);
            for _ in 0..5 {
                assert_eq!(m.should_ignore(path), first, "unstable result for {path}");
            }
        }
    }

    #[test]
    fn empty_set_ignores_nothing() {
        let m = IgnoreMatcher::empty();
        assert!(!m.should_ignore("anything"));
        assert!(!should_ignore::<&str>("anything", &[]));
    }

    #[test]
    fn lossy_compile_skips_malformed_patterns() {
        let set = IgnorePatternSet::from_patterns(["[unclosed", "*.bak"]);
        assert!(set.compile().is_err());

        let (m, skipped) = set.compile_lossy();
        assert_eq!(skipped.len(), 1);
        assert!(m.should_ignore("notes.bak"));
    }
}
