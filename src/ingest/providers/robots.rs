// src/ingest/providers/robots.rs
//! Minimal robots.txt evaluation: user-agent groups with Allow/Disallow path
//! prefixes, longest match wins, Allow wins ties. `*` and `$` wildcards are
//! not interpreted.

use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    /// `(allow, prefix)` pairs from the group that applies to us.
    rules: Vec<(bool, String)>,
}

#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<(bool, String)>,
}

impl RobotsRules {
    /// Everything allowed (no robots file, or an unreachable one).
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Pick the group naming our product token, else the `*` group.
    pub fn parse(body: &str, user_agent: &str) -> Self {
        let token = user_agent
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let mut groups: Vec<Group> = Vec::new();
        let mut cur = Group::default();
        let mut in_rules = false;

        for raw in body.lines() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_rules {
                        groups.push(std::mem::take(&mut cur));
                        in_rules = false;
                    }
                    cur.agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" => {
                    in_rules = true;
                    // An empty Disallow means "allow everything".
                    if !value.is_empty() {
                        cur.rules.push((key == "allow", value.to_string()));
                    }
                }
                _ => {}
            }
        }
        if !cur.agents.is_empty() {
            groups.push(cur);
        }

        let specific = groups
            .iter()
            .find(|g| !token.is_empty() && g.agents.iter().any(|a| *a == token));
        let chosen = specific.or_else(|| groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

        Self {
            rules: chosen.map(|g| g.rules.clone()).unwrap_or_default(),
        }
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<(usize, bool)> = None;
        for (allow, prefix) in &self.rules {
            if !path.starts_with(prefix.as_str()) {
                continue;
            }
            let len = prefix.len();
            best = match best {
                Some((l, a)) if l > len || (l == len && a) => Some((l, a)),
                _ => Some((len, *allow)),
            };
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }

    pub fn is_url_allowed(&self, url: &Url) -> bool {
        let mut path = url.path().to_string();
        if let Some(q) = url.query() {
            path.push('?');
            path.push_str(q);
        }
        self.is_allowed(&path)
    }
}

/// `<scheme>://<host>[:port]/robots.txt` for a page URL.
pub fn robots_url_for(page: &Url) -> Result<Url, url::ParseError> {
    page.join("/robots.txt")
}
