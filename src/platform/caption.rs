//! Caption composition.
//!
//! Appends a post's hashtags to its caption at publish time. Hashtags are
//! normalized to a single leading `#`; entries with embedded whitespace
//! or no usable characters are dropped with a warning rather than
//! failing the attempt.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

fn hashtag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\S+$").expect("valid hashtag pattern"))
}

/// Normalize a single hashtag, returning `None` when unusable.
pub fn normalize_hashtag(raw: &str) -> Option<String> {
    let stripped = raw.trim().trim_start_matches('#');
    if stripped.is_empty() || !hashtag_pattern().is_match(stripped) {
        return None;
    }
    Some(format!("#{}", stripped))
}

/// Compose the final caption: the authored text followed by its hashtag
/// block, separated by a blank line.
pub fn compose_caption(caption: &str, hashtags: &[String]) -> String {
    let tags: Vec<String> = hashtags
        .iter()
        .filter_map(|raw| {
            let normalized = normalize_hashtag(raw);
            if normalized.is_none() {
                warn!(hashtag = %raw, "Dropping malformed hashtag");
            }
            normalized
        })
        .collect();

    if tags.is_empty() {
        return caption.to_string();
    }

    if caption.is_empty() {
        tags.join(" ")
    } else {
        format!("{}\n\n{}", caption, tags.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashtags_are_appended_with_blank_line() {
        let composed = compose_caption(
            "Spring launch",
            &["#spring".to_string(), "launch".to_string()],
        );
        assert_eq!(composed, "Spring launch\n\n#spring #launch");
    }

    #[test]
    fn malformed_hashtags_are_dropped() {
        let composed = compose_caption(
            "Post",
            &["ok".to_string(), "has space".to_string(), "#".to_string()],
        );
        assert_eq!(composed, "Post\n\n#ok");
    }

    #[test]
    fn no_hashtags_leaves_caption_untouched() {
        assert_eq!(compose_caption("Just text", &[]), "Just text");
    }

    #[test]
    fn empty_caption_yields_bare_tags() {
        assert_eq!(
            compose_caption("", &["one".to_string(), "two".to_string()]),
            "#one #two"
        );
    }

    #[test]
    fn double_hash_collapses() {
        assert_eq!(normalize_hashtag("##tag"), Some("#tag".to_string()));
        assert_eq!(normalize_hashtag("  #padded  "), Some("#padded".to_string()));
        assert_eq!(normalize_hashtag("   "), None);
    }
}
