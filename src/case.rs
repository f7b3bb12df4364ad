//! Identifier case conversion for URL paths and table names.
//! Model names are PascalCase; paths are kebab-case ("PostComment" -> "post-comments"), tables snake_case.

/// Convert an identifier (PascalCase, camelCase, snake_case or SCREAMING_SNAKE_CASE) to kebab-case.
/// Acronyms stay together: "XMLHttpRequest" -> "xml-http-request", "APIKey" -> "api-key".
pub fn to_kebab_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == ' ' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.ends_with('-') {
                out.push('-');
            }
        }
        out.extend(c.to_lowercase());
    }
    out.trim_end_matches('-').to_string()
}

/// Convert an identifier to snake_case, with the same word boundaries as [`to_kebab_case`].
pub fn to_snake_case(s: &str) -> String {
    to_kebab_case(s).replace('-', "_")
}

/// Default base path for a model's routes: kebab-case name, pluralized with a trailing "s".
pub fn base_path_for_model(model_name: &str) -> String {
    format!("/{}s", to_kebab_case(model_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_conversions() {
        let cases = [
            ("PostComments", "post-comments"),
            ("UserProfile", "user-profile"),
            ("APIKey", "api-key"),
            ("snake_case", "snake-case"),
            ("SCREAMING_SNAKE_CASE", "screaming-snake-case"),
            ("camelCase", "camel-case"),
            ("PascalCase", "pascal-case"),
            ("simpleword", "simpleword"),
            ("TwoWords", "two-words"),
            ("ManyManyWords", "many-many-words"),
            ("ABC", "abc"),
            ("XMLHttpRequest", "xml-http-request"),
        ];
        for (input, expected) in cases {
            assert_eq!(to_kebab_case(input), expected, "input {input}");
        }
    }

    #[test]
    fn snake_case_and_base_path() {
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
        assert_eq!(base_path_for_model("TestModel"), "/test-models");
    }
}
