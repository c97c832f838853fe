//! Shared utility functions.

/// Words the title capitalizer leaves lower-case.
const MINOR_WORDS: [&str; 5] = ["and", "or", "to", "a", "an"];

/// Turn a file slug into a display title.
///
/// `-`, `_` and `.` separate words. Each word gets an upper-case first
/// letter unless it is a minor word.
/// "getting-started" -> "Getting Started"
/// "read_me.first" -> "Read Me First"
/// "guide-to-rust" -> "Guide to Rust"
pub fn titleize(slug: &str) -> String {
    slug.split(['-', '_', '.', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            if MINOR_WORDS.contains(&word.to_lowercase().as_str()) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a URL directory path to a leading and trailing slash.
/// "" -> "/", "docs" -> "/docs/", "/docs/api" -> "/docs/api/"
pub fn dir_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Normalize a deployment sub-path to a leading slash and no trailing slash.
/// Empty and "/" mean no sub-path.
pub fn sub_path(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_matches('/');
    (!trimmed.is_empty()).then(|| format!("/{trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titleize() {
        assert_eq!(titleize("getting-started"), "Getting Started");
        assert_eq!(titleize("installation"), "Installation");
        assert_eq!(titleize("api_reference"), "Api Reference");
        assert_eq!(titleize("README"), "README");
        assert_eq!(titleize("guide-to-rust-and-go"), "Guide to Rust and Go");
        assert_eq!(titleize("an.intro"), "an Intro");
    }

    #[test]
    fn test_dir_path() {
        assert_eq!(dir_path(""), "/");
        assert_eq!(dir_path("/"), "/");
        assert_eq!(dir_path("docs"), "/docs/");
        assert_eq!(dir_path("/docs/api"), "/docs/api/");
        assert_eq!(dir_path("docs/api/"), "/docs/api/");
    }

    #[test]
    fn test_sub_path() {
        assert_eq!(sub_path("/docs/"), Some("/docs".to_string()));
        assert_eq!(sub_path("docs"), Some("/docs".to_string()));
        assert_eq!(sub_path("/"), None);
        assert_eq!(sub_path(""), None);
    }
}
