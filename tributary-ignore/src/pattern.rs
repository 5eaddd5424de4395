use crate::matcher::{IgnoreError, IgnoreMatcher};

/// Ordered list of raw ignore patterns.
///
/// Comment lines (`#...`) and blank lines are dropped on load; everything else is kept verbatim
/// so the set can be logged or re-serialized as the user wrote it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnorePatternSet {
    patterns: Vec<String>,
}

impl IgnorePatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the contents of an ignore file (`.gitignore` syntax), one pattern per line.
    pub fn parse(text: &str) -> Self {
        let mut set = Self::new();
        set.extend(text.lines());
        set
    }

    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        set.extend(patterns);
        set
    }

    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in patterns {
            let line = raw.as_ref().trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            self.patterns.push(line.to_string());
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Compile every pattern; fails on the first malformed glob.
    pub fn compile(&self) -> Result<IgnoreMatcher, IgnoreError> {
        IgnoreMatcher::build(&self.patterns, true).map(|(matcher, _)| matcher)
    }

    /// Compile what can be compiled and report the rest.
    ///
    /// Used for ignore files fetched from third-party repositories, where one bad line should
    /// not disable filtering altogether.
    pub fn compile_lossy(&self) -> (IgnoreMatcher, Vec<IgnoreError>) {
        match IgnoreMatcher::build(&self.patterns, false) {
            Ok(built) => built,
            Err(err) => (IgnoreMatcher::empty(), vec![err]),
        }
    }
}

/// One parsed line of an ignore file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rule {
    pub negated: bool,
    pub dir_only: bool,
    pub anchored: bool,
    pub body: String,
}

impl Rule {
    pub(crate) fn parse(line: &str) -> Option<Self> {
        let mut body = trim_unescaped_trailing_space(line);
        if body.is_empty() || body.starts_with('#') {
            return None;
        }

        let mut negated = false;
        if let Some(rest) = body.strip_prefix('!') {
            negated = true;
            body = rest;
        } else if let Some(rest) = body.strip_prefix("\\!") {
            return Self::finish(format!("!{rest}").as_str(), false);
        } else if let Some(rest) = body.strip_prefix("\\#") {
            return Self::finish(format!("#{rest}").as_str(), false);
        }

        Self::finish(body, negated)
    }

    fn finish(body: &str, negated: bool) -> Option<Self> {
        let mut body = body;
        let mut anchored = false;
        if let Some(rest) = body.strip_prefix('/') {
            anchored = true;
            body = rest;
        }

        let mut dir_only = false;
        if let Some(rest) = body.strip_suffix('/') {
            dir_only = true;
            body = rest;
        }

        if body.is_empty() {
            return None;
        }

        // A separator anywhere but the end ties the pattern to the root.
        if body.contains('/') {
            anchored = true;
        }

        Some(Self {
            negated,
            dir_only,
            anchored,
            body: body.to_string(),
        })
    }

    /// Globs (globset syntax, literal separators) equivalent to this rule.
    pub(crate) fn globs(&self) -> Vec<String> {
        let base = if self.anchored || self.body.starts_with("**/") {
            self.body.clone()
        } else {
            format!("**/{}", self.body)
        };

        if self.dir_only {
            return vec![format!("{base}/**")];
        }

        if base.ends_with("/**") {
            // `dir/**` matches contents only, never the bare directory path.
            return vec![base];
        }

        vec![base.clone(), format!("{base}/**")]
    }
}

fn trim_unescaped_trailing_space(line: &str) -> &str {
    let trimmed = line.trim_end_matches([' ', '\t', '\r', '\n']);
    if trimmed.ends_with('\\') && trimmed.len() < line.len() {
        // `foo\ ` keeps its escaped space.
        return &line[..trimmed.len() + 1];
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_dropped() {
        let set = IgnorePatternSet::parse("# build output\n\ntarget/\n   \n*.log\n");
        assert_eq!(set.patterns(), ["target/", "*.log"]);
    }

    #[test]
    fn rule_flags() {
        let rule = Rule::parse("!/docs/").expect("rule");
        assert!(rule.negated);
        assert!(rule.anchored);
        assert!(rule.dir_only);
        assert_eq!(rule.body, "docs");

        let rule = Rule::parse("src/*.rs").expect("rule");
        assert!(rule.anchored);
        assert!(!rule.dir_only);

        let rule = Rule::parse("*.log").expect("rule");
        assert!(!rule.anchored);
        assert_eq!(rule.globs(), vec!["**/*.log", "**/*.log/**"]);
    }

    #[test]
    fn escaped_leading_bang_is_literal() {
        let rule = Rule::parse("\\!important").expect("rule");
        assert!(!rule.negated);
        assert_eq!(rule.body, "!important");
    }

    #[test]
    fn directory_glob_keeps_single_variant() {
        let rule = Rule::parse("node_modules/**").expect("rule");
        assert_eq!(rule.globs(), vec!["node_modules/**"]);
    }

    #[test]
    fn lone_slash_is_not_a_rule() {
        assert!(Rule::parse("/").is_none());
        assert!(Rule::parse("!").is_none());
    }
}
