//! Ordered, hierarchical key/value store for build properties.
//!
//! Keys are dotted strings (`recipe.c.o.pattern`, `menu.cpu.16MHz.build.f_cpu`)
//! and insertion order is semantically significant: default config selection
//! and recipe expansion both depend on declaration order, so the store is an
//! insertion-order-preserving map rather than a plain `HashMap`.

use indexmap::IndexMap;

/// How many expansion passes to run before giving up on `{token}` chains.
/// Bounds self-referential properties without erroring on them.
const MAX_EXPANSION_PASSES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyStore {
    props: IndexMap<String, String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse ordered `key=value` lines. Blank lines and `#` comments are
    /// skipped; lines without `=` are ignored. Whitespace around the key is
    /// trimmed, the value is kept verbatim.
    pub fn from_text(text: &str) -> Self {
        let mut store = Self::new();
        for line in text.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                store.set(key.trim(), value);
            }
        }
        store
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Set a key. Overwriting keeps the key's original position.
    pub fn set(&mut self, key: &str, value: &str) {
        self.props.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        // shift_remove keeps the relative order of the remaining keys
        self.props.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.props.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Extract the subtree rooted at `prefix`: every `prefix.rest` key is
    /// returned as `rest`, in the original order.
    pub fn sub_tree(&self, prefix: &str) -> PropertyStore {
        let dotted = format!("{}.", prefix);
        let mut sub = PropertyStore::new();
        for (key, value) in &self.props {
            if let Some(rest) = key.strip_prefix(&dotted) {
                sub.set(rest, value);
            }
        }
        sub
    }

    /// List the distinct first key segments, in first-appearance order.
    /// For `menu.cpu.16MHz` and `menu.cpu.8MHz` under `sub_tree("menu")`
    /// this yields `["cpu"]` once.
    pub fn first_level_keys(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for key in self.props.keys() {
            let first = match key.split_once('.') {
                Some((head, _)) => head,
                None => key.as_str(),
            };
            if !seen.iter().any(|s| s == first) {
                seen.push(first.to_string());
            }
        }
        seen
    }

    /// Merge `other` into `self`. Values from `other` override, but keys
    /// already present keep their original position.
    pub fn merge(&mut self, other: &PropertyStore) {
        for (key, value) in &other.props {
            self.props.insert(key.clone(), value.clone());
        }
    }

    /// Expand `{key}` tokens against this store, transitively: the result of
    /// one substitution may itself contain tokens. Case-sensitive. Unknown
    /// tokens are left untouched (recipe preparation may strip them later).
    pub fn expand(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_EXPANSION_PASSES {
            let (next, changed) = self.expand_once(&current);
            current = next;
            if !changed {
                break;
            }
        }
        current
    }

    fn expand_once(&self, text: &str) -> (String, bool) {
        let mut out = String::with_capacity(text.len());
        let mut changed = false;
        let mut rest = text;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find(['{', '}']) {
                Some(close) if after.as_bytes()[close] == b'}' => {
                    let token = &after[..close];
                    match self.get(token) {
                        Some(value) => {
                            out.push_str(value);
                            changed = true;
                        }
                        None => {
                            out.push('{');
                            out.push_str(token);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    // unterminated token, or a nested '{' starts a new one
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        (out, changed)
    }
}
