//! Canonicalization of free-text cutting-list fields into comparison-safe keys.
//!
//! Every lookup in the suggestion engine goes through these functions. Two
//! spellings a user would consider identical (case, quote style, whitespace,
//! `992mm` vs `992 mm` vs `992.0mm`) must produce the same key, otherwise
//! learning fragments into duplicate patterns that never aggregate.

/// Quote and apostrophe variants stripped during normalization.
const QUOTE_CHARS: &[char] = &['\'', '\u{2019}', '\u{2018}', '\u{00b4}', '`', '"', '\u{201c}', '\u{201d}'];

/// Uppercase, trim, strip quote variants, collapse internal whitespace.
pub fn normalize(text: &str) -> String {
    text.to_uppercase()
        .chars()
        .filter(|c| !QUOTE_CHARS.contains(c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonicalize a measurement to the nearest whole unit.
///
/// Takes the first numeric token (`,` accepted as decimal separator), rounds
/// it to the nearest integer, and returns it as a string. Text without any
/// numeric token falls back to [`normalize`].
pub fn normalize_measurement(text: &str) -> String {
    match first_numeric_token(text) {
        Some(value) => format!("{}", value.round() as i64),
        None => normalize(text),
    }
}

/// Profiles carry no unit semantics; plain normalization applies.
pub fn normalize_profile(text: &str) -> String {
    normalize(text)
}

/// `product|size` lookup key for all patterns sharing a context.
pub fn context_key(product: &str, size: &str) -> String {
    format!("{}|{}", normalize(product), normalize(size))
}

/// Globally unique `product|size|profile|measurement` pattern key.
pub fn pattern_key(product: &str, size: &str, profile: &str, measurement: &str) -> String {
    format!(
        "{}|{}|{}",
        context_key(product, size),
        normalize_profile(profile),
        normalize_measurement(measurement)
    )
}

fn first_numeric_token(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut token: String = chars[start..i].iter().collect();
            // Decimal part only counts when digits follow the separator,
            // so "992," inside a list stays 992.
            if i + 1 < chars.len()
                && (chars[i] == '.' || chars[i] == ',')
                && chars[i + 1].is_ascii_digit()
            {
                i += 1;
                let frac_start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                token.push('.');
                token.extend(chars[frac_start..i].iter());
            }
            return token.parse().ok();
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_stable_across_case_quotes_whitespace() {
        let canonical = normalize("DOOR FRAME");
        for variant in ["door frame", "DOOR  FRAME", "  Door Frame ", "Door \u{201c}Frame\u{201d}"] {
            assert_eq!(normalize(variant), canonical, "variant {variant:?}");
        }
        assert_eq!(normalize("O'BRIEN\u{2019}S"), "OBRIENS");
    }

    #[test]
    fn normalize_collapses_whitespace_runs() {
        assert_eq!(normalize("  a \t b\n c  "), "A B C");
    }

    #[test]
    fn measurement_variants_share_one_canonical_form() {
        assert_eq!(normalize_measurement("992mm"), "992");
        assert_eq!(normalize_measurement("992 MM"), "992");
        assert_eq!(normalize_measurement("992.0mm"), "992");
        assert_eq!(normalize_measurement("992,4 mm"), "992");
        assert_eq!(normalize_measurement("992,6"), "993");
    }

    #[test]
    fn measurement_without_digits_falls_back_to_normalize() {
        assert_eq!(normalize_measurement("custom cut"), "CUSTOM CUT");
    }

    #[test]
    fn pattern_key_is_stable_across_variants() {
        let a = pattern_key("Door", "100x200", "Frame", "992mm");
        let b = pattern_key(" DOOR ", "100X200", "FRAME", "992.0 MM");
        assert_eq!(a, b);
        assert_eq!(a, "DOOR|100X200|FRAME|992");
    }

    #[test]
    fn context_key_joins_normalized_parts() {
        assert_eq!(context_key("door ", " 100x200"), "DOOR|100X200");
    }
}
