//! Local name validation.
//!
//! Remote names become file names. A name is rejected when it cannot be a
//! file name on common file systems, or when it collides, ignoring case,
//! with a different name already present locally.

/// Characters no supported file system accepts in a file name.
const RESERVED_CHARS: [char; 9] = ['<', '>', ':', '"', '\\', '|', '?', '*', '\0'];

/// Whether `name` can be stored next to the `known` local names.
pub fn validate_item_name(name: &str, known: &[String]) -> bool {
    if name.trim().is_empty() {
        return false;
    }

    if name
        .chars()
        .any(|c| c.is_control() || RESERVED_CHARS.contains(&c))
    {
        return false;
    }

    if name.ends_with('.') || name.ends_with(' ') {
        return false;
    }

    let folded = name.to_lowercase();
    !known
        .iter()
        .any(|other| other != name && other.to_lowercase() == folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        vec!["Logo".to_string(), "banner".to_string()]
    }

    #[test]
    fn test_accepts_plain_and_existing_names() {
        assert!(validate_item_name("hero image", &known()));
        assert!(validate_item_name("Logo", &known()));
        assert!(validate_item_name("/layouts/blog/post", &[]));
    }

    #[test]
    fn test_rejects_reserved_characters() {
        assert!(!validate_item_name("a:b", &[]));
        assert!(!validate_item_name("what?", &[]));
        assert!(!validate_item_name("tab\there", &[]));
        assert!(!validate_item_name("trailing.", &[]));
        assert!(!validate_item_name("   ", &[]));
    }

    #[test]
    fn test_rejects_case_insensitive_collision() {
        assert!(!validate_item_name("logo", &known()));
        assert!(!validate_item_name("BANNER", &known()));
    }
}
