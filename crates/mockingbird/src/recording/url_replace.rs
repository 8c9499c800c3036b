//! Rewriting of upstream URLs before forwarding.

use serde::{Deserialize, Serialize};

/// Replaces every occurrence of `old_value` with `new_value` in a URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UrlReplace {
    pub old_value: String,
    pub new_value: String,
    /// Compare ASCII characters case-insensitively.
    #[serde(default)]
    pub ignore_case: bool,
}

impl UrlReplace {
    pub fn apply(&self, url: &str) -> String {
        if self.old_value.is_empty() {
            return url.to_string();
        }
        if !self.ignore_case {
            return url.replace(&self.old_value, &self.new_value);
        }

        // ASCII lowercasing keeps byte offsets, so matches found in the
        // lowered copy map straight back onto the original.
        let haystack = url.to_ascii_lowercase();
        let needle = self.old_value.to_ascii_lowercase();
        let mut out = String::with_capacity(url.len());
        let mut last = 0;
        for (start, _) in haystack.match_indices(&needle) {
            out.push_str(&url[last..start]);
            out.push_str(&self.new_value);
            last = start + needle.len();
        }
        out.push_str(&url[last..]);
        out
    }
}
