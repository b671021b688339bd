/// Case-insensitive substring pattern, folded once when the filter is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPattern {
    raw: String,
    folded: String,
}

impl CompiledPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let folded = raw.to_lowercase();
        Self { raw, folded }
    }

    /// The pattern as the user typed it
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn matches(&self, text: &str) -> bool {
        if let Some(result) = ascii_fast_path(text, &self.folded) {
            return result;
        }
        text.to_lowercase().contains(&self.folded)
    }
}

/// Substring search without allocating when both sides are ASCII
#[inline]
fn ascii_fast_path(text: &str, folded: &str) -> Option<bool> {
    if !text.is_ascii() || !folded.is_ascii() {
        return None;
    }
    if folded.is_empty() {
        return Some(true);
    }
    let needle = folded.as_bytes();
    Some(
        text.as_bytes()
            .windows(needle.len())
            .any(|window| window.eq_ignore_ascii_case(needle)),
    )
}
