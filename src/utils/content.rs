/// Maximum length of a generated excerpt, in characters
const EXCERPT_LENGTH: usize = 200;

/// Strips scripts, event handlers and other unsafe markup from article HTML
pub fn sanitize_html(content: &str) -> String {
    ammonia::clean(content)
}

/// Plain-text excerpt derived from article HTML
///
/// Whitespace is collapsed and the text is cut at `EXCERPT_LENGTH`
/// characters, on a word boundary when one is available.
pub fn derive_excerpt(content: &str) -> String {
    let text = html2text::from_read(content.as_bytes(), 1000)
        .unwrap_or_else(|_| content.to_string());
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.chars().count() <= EXCERPT_LENGTH {
        return text;
    }

    let cut: String = text.chars().take(EXCERPT_LENGTH).collect();
    let cut = match cut.rfind(' ') {
        Some(idx) if idx > EXCERPT_LENGTH / 2 => cut[..idx].to_string(),
        _ => cut,
    };
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_removes_scripts() {
        let clean = sanitize_html("<p>hi</p><script>alert(1)</script>");
        assert_eq!(clean, "<p>hi</p>");
    }

    #[test]
    fn short_content_is_kept_whole() {
        assert_eq!(derive_excerpt("<p>Short   post</p>"), "Short post");
    }

    #[test]
    fn long_content_is_cut_on_a_word() {
        let content = "word ".repeat(100);
        let excerpt = derive_excerpt(&content);
        assert!(excerpt.ends_with("word..."));
        assert!(excerpt.chars().count() <= EXCERPT_LENGTH + 3);
    }
}
