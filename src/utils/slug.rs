use uuid::Uuid;

/// URL slug from a title: lowercase alphanumerics separated by single dashes
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Same slug with a short random suffix, used when the plain slug is taken
pub fn with_suffix(slug: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slug, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separators() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust   &  Axum -- 2025 "), "rust-axum-2025");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(slugify("Café Culture"), "café-culture");
    }

    #[test]
    fn suffix_keeps_base() {
        let slug = with_suffix("hello-world");
        assert!(slug.starts_with("hello-world-"));
        assert_eq!(slug.len(), "hello-world-".len() + 8);
    }
}
