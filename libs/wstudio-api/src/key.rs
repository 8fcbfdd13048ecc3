//! Record key naming.
//!
//! `<provider>:<resource>:<studio_id>:<timestamp_ms>`. Existing data
//! depends on this layout; do not change it.

pub const DEFAULT_PROVIDER_PREFIX: &str = "ibm";
pub const DEFAULT_RESOURCE_PREFIX: &str = "watson-studio";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    provider: String,
    resource: String,
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_PREFIX, DEFAULT_RESOURCE_PREFIX)
    }
}

impl KeyScheme {
    pub fn new(provider: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            resource: resource.into(),
        }
    }

    pub fn record_key(&self, studio_id: &str, ts_ms: i64) -> String {
        format!("{}:{}:{studio_id}:{ts_ms}", self.provider, self.resource)
    }

    /// Store glob matching every record key of `studio_id`.
    ///
    /// `*` also spans `:`, so ids like `s1:x` match the glob of `s1`.
    /// Filter the results with [`KeyScheme::is_record_key_of`].
    pub fn studio_pattern(&self, studio_id: &str) -> String {
        format!(
            "{}:{}:{}:*",
            escape_glob(&self.provider),
            escape_glob(&self.resource),
            escape_glob(studio_id)
        )
    }

    /// `key` is `<provider>:<resource>:<studio_id>:<digits>` for exactly
    /// this `studio_id`.
    pub fn is_record_key_of(&self, studio_id: &str, key: &str) -> bool {
        let prefix = format!("{}:{}:{studio_id}:", self.provider, self.resource);
        key.strip_prefix(&prefix)
            .is_some_and(|ts| !ts.is_empty() && ts.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Escape glob metacharacters so `s` matches only itself.
pub fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Glob match with the store's `SCAN MATCH` rules:
/// `*`, `?`, `[abc]`, `[^a-z]`, and `\` escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    match_from(&p, &t)
}

fn match_from(p: &[char], t: &[char]) -> bool {
    let (mut pi, mut ti) = (0, 0);
    // Last `*` seen and the text position it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() {
            match p[pi] {
                '*' => {
                    star = Some((pi, ti));
                    pi += 1;
                    continue;
                }
                '?' => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(p, pi, t[ti]) {
                        if matched {
                            pi = next;
                            ti += 1;
                            continue;
                        }
                    } else if t[ti] == '[' {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                }
                '\\' if pi + 1 < p.len() => {
                    if p[pi + 1] == t[ti] {
                        pi += 2;
                        ti += 1;
                        continue;
                    }
                }
                c => {
                    if c == t[ti] {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                }
            }
        }
        match star {
            Some((sp, st)) => {
                pi = sp + 1;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Match `c` against the class opening at `p[start] == '['`.
/// Returns `(matched, index after ']')`, or `None` for an unterminated class.
fn match_class(p: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = p.get(i) == Some(&'^');
    if negate {
        i += 1;
    }
    let mut matched = false;
    while i < p.len() && p[i] != ']' {
        if p[i] == '\\' && i + 1 < p.len() {
            matched |= p[i + 1] == c;
            i += 2;
        } else if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            let (lo, hi) = if p[i] <= p[i + 2] {
                (p[i], p[i + 2])
            } else {
                (p[i + 2], p[i])
            };
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= p[i] == c;
            i += 1;
        }
    }
    if i >= p.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
