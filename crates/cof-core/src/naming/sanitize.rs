//! Path-component sanitization for course names and titles.

/// Linux NAME_MAX.
pub const NAME_MAX: usize = 255;

/// Used when nothing survives sanitization.
pub const FALLBACK_COMPONENT: &str = "untitled";

/// Sanitizes a course name or title into a single path component.
///
/// - Trims surrounding whitespace
/// - Keeps alphanumerics (Unicode), `-` and `_`
/// - Replaces every other character, whitespace included, with `_` (no collapsing)
/// - Falls back to [`FALLBACK_COMPONENT`] when the result is empty
/// - Limits length to 255 bytes on a char boundary
pub fn sanitize_component(name: &str) -> String {
    sanitize_within(name, NAME_MAX)
}

/// Same as [`sanitize_component`] with a tighter byte limit, for components
/// that share a file name with a prefix and an extension.
pub fn sanitize_within(name: &str, max_bytes: usize) -> String {
    let out: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if out.is_empty() {
        return truncate_bytes(FALLBACK_COMPONENT, max_bytes).to_string();
    }
    truncate_bytes(&out, max_bytes).to_string()
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub(crate) fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut take = max;
    while take > 0 && !s.is_char_boundary(take) {
        take -= 1;
    }
    &s[..take]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_and_punctuation() {
        assert_eq!(sanitize_component("COF Original"), "COF_Original");
        assert_eq!(sanitize_component("Causas finais!"), "Causas_finais_");
        assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
    }

    #[test]
    fn trims_but_does_not_collapse() {
        assert_eq!(sanitize_component("  Aula  dupla  "), "Aula__dupla");
        assert_eq!(sanitize_component("x..y"), "x__y");
    }

    #[test]
    fn keeps_accented_letters() {
        assert_eq!(sanitize_component("Transcrição 3"), "Transcrição_3");
    }

    #[test]
    fn empty_falls_back() {
        assert_eq!(sanitize_component("   "), "untitled");
        assert_eq!(sanitize_component(""), "untitled");
    }

    #[test]
    fn long_names_cut_on_char_boundary() {
        let long = "é".repeat(200);
        let out = sanitize_component(&long);
        assert!(out.len() <= 255);
        assert_eq!(out.chars().count(), 127);
    }

    #[test]
    fn tighter_budget() {
        assert_eq!(sanitize_within("Causas finais!", 6), "Causas");
        assert_eq!(sanitize_within("ééé", 5), "éé");
        assert_eq!(sanitize_within("", 4), "unti");
    }
}
