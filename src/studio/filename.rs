use crate::studio::codec::extension_of;

pub const DEFAULT_MAX_LEN: usize = 50;
pub const FALLBACK_NAME: &str = "untitled_shot";
const MISSING_IDEA_NAME: &str = "shot";

/// Reduces free text to `[A-Za-z0-9_]`, joining words with underscores.
///
/// Output never exceeds `max_len` characters (minimum 1), including the
/// `untitled_shot` fallback used when nothing survives.
pub fn sanitize(text: &str, max_len: usize) -> String {
    let max_len = max_len.max(1);
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();
    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");

    let name = if joined.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        joined
    };
    name.chars().take(max_len).collect()
}

/// `<sanitized idea>_<index + 1>.<ext>`, shared by single saves and bundles so
/// both paths name a shot identically.
pub fn shot_filename(idea: Option<&str>, index: usize, data_uri: &str) -> String {
    let base = sanitize(idea.unwrap_or(MISSING_IDEA_NAME), DEFAULT_MAX_LEN);
    format!("{}_{}.{}", base, index + 1, extension_of(data_uri))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_joins_words() {
        assert_eq!(sanitize("Close-up, dramatic!", 50), "Closeup_dramatic");
        assert_eq!(
            sanitize("  Bright   kitchen scene  ", 50),
            "Bright_kitchen_scene"
        );
    }

    #[test]
    fn empty_or_fully_stripped_text_uses_fallback() {
        assert_eq!(sanitize("", 50), "untitled_shot");
        assert_eq!(sanitize("!!! ---", 50), "untitled_shot");
        assert_eq!(sanitize("café ☕", 50), "caf");
    }

    #[test]
    fn tabs_and_newlines_are_stripped_not_joined() {
        assert_eq!(sanitize("wood\ttable\nshot", 50), "woodtableshot");
    }

    #[test]
    fn output_respects_max_len() {
        let long = "A sleek bottle on a marble pedestal with soft window light and long shadows";
        for max_len in [1, 5, 13, 20, 50, 200] {
            assert!(sanitize(long, max_len).chars().count() <= max_len);
            assert!(sanitize("", max_len).chars().count() <= max_len);
        }
        assert_eq!(sanitize(long, 8), "A_sleek_");
    }

    #[test]
    fn filenames_are_indexed_from_one() {
        let uri = "data:image/png;base64,AAAA";
        assert_eq!(
            shot_filename(Some("Bright kitchen scene"), 0, uri),
            "Bright_kitchen_scene_1.png"
        );
        assert_eq!(shot_filename(Some(""), 1, uri), "untitled_shot_2.png");
        assert_eq!(shot_filename(None, 2, "data:image/webp;base64,AA"), "shot_3.webp");
    }
}
