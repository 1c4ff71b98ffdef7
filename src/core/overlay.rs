//! Overlay state shared with the review panel.
//!
//! Display-only: nothing here feeds back into scanning or storage.

use crate::core::record::DetectionRecord;
use serde::Serialize;

pub const DEFAULT_FONT_SIZE: u32 = 12;
pub const MIN_FONT_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayState {
    pub visible: bool,
    pub font_size: u32,
}

impl Default for OverlayState {
    fn default() -> Self { Self { visible: false, font_size: DEFAULT_FONT_SIZE } }
}

impl OverlayState {
    /// Flip visibility; returns the new value.
    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    pub fn increase_font(&mut self) -> u32 {
        self.font_size = self.font_size.saturating_add(1);
        self.font_size
    }

    pub fn decrease_font(&mut self) -> u32 {
        self.font_size = self.font_size.saturating_sub(1).max(MIN_FONT_SIZE);
        self.font_size
    }
}

/// Plain-text panel body: `key: value` over the source URL, entries split by a rule.
pub fn render_text(records: &[DetectionRecord]) -> String {
    let mut out = String::from("Detected Logs\n");
    for (i, r) in records.iter().enumerate() {
        if i > 0 {
            out.push_str("----\n");
        }
        out.push_str(&format!("{}: {}\n  {}  [{}]\n", r.key, r.value, r.source_url, r.timestamp));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Detection;

    #[test]
    fn test_toggle_and_font_floor() {
        let mut s = OverlayState::default();
        assert!(s.toggle());
        assert!(!s.toggle());
        assert_eq!(s.increase_font(), 13);
        for _ in 0..20 {
            s.decrease_font();
        }
        assert_eq!(s.font_size, MIN_FONT_SIZE);
    }

    #[test]
    fn test_render_text() {
        let recs = vec![
            DetectionRecord::new(1, Detection::now("https://a.test/", "access_token", "abc")),
            DetectionRecord::new(2, Detection::now("https://b.test/", "client_secret", "xyz")),
        ];
        let text = render_text(&recs);
        assert!(text.starts_with("Detected Logs\n"));
        assert!(text.contains("access_token: abc\n  https://a.test/"));
        assert_eq!(text.matches("----").count(), 1);
        assert_eq!(render_text(&[]), "Detected Logs\n");
    }
}
