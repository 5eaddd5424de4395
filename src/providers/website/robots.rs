//! Minimal robots.txt support: one group per crawl, first matching rule wins.

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    rules: Vec<Rule>,
}

#[derive(Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

impl RobotsRules {
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Rules of the group addressed to `agent_token`, falling back to the `*` group.
    pub fn parse(text: &str, agent_token: &str) -> Self {
        let agent_token = agent_token.to_ascii_lowercase();
        let mut groups: Vec<Group> = Vec::new();
        let mut in_agent_lines = false;

        for raw in text.lines() {
            let line = raw.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if !in_agent_lines {
                        groups.push(Group::default());
                    }
                    in_agent_lines = true;
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    in_agent_lines = false;
                    // An empty Disallow allows everything; it adds no rule.
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(group) = groups.last_mut() {
                        group.rules.push(Rule {
                            allow: field == "allow",
                            pattern: value.to_string(),
                        });
                    }
                }
                _ => in_agent_lines = false,
            }
        }

        let pick = |wanted: &str| {
            groups
                .iter()
                .find(|g| g.agents.iter().any(|a| a == wanted))
                .map(|g| g.rules.clone())
        };

        Self {
            rules: pick(&agent_token).or_else(|| pick("*")).unwrap_or_default(),
        }
    }

    /// `path` is the URL path plus query.
    pub fn is_allowed(&self, path: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| wildcard_match(&rule.pattern, path, true))
            .is_none_or(|rule| rule.allow)
    }
}

/// `*` matches any run of characters. With `prefix`, the pattern only has to match a prefix of
/// `text` unless it ends with `$`.
pub(super) fn wildcard_match(pattern: &str, text: &str, prefix: bool) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, !prefix),
    };

    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or("");
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    if parts.is_empty() {
        return !anchored || rest.is_empty();
    }

    for (i, part) in parts.iter().enumerate() {
        let last = i + 1 == parts.len();
        if last && anchored {
            return rest.ends_with(part);
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}
