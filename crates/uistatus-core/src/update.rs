/// One update flowing from a metric source to the status writer.
///
/// Immutable once queued. Ordering matters only within a single tag: a later
/// update for the same tag overwrites the earlier one in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Store filename for this metric ("cpupercent", "mpris", ...).
    pub tag: String,
    /// Optional leading glyph. Empty means text only.
    pub icon: String,
    /// Free text following the icon.
    pub text: String,
}

impl StatusUpdate {
    pub fn new(
        tag: impl Into<String>,
        icon: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            icon: icon.into(),
            text: text.into(),
        }
    }

    /// Text-only update with no icon glyph.
    pub fn text_only(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(tag, "", text)
    }

    /// File contents for the store: icon immediately followed by text,
    /// icon omitted when empty. No trailing newline.
    pub fn render(&self) -> String {
        format!("{}{}", self.icon, self.text)
    }
}
