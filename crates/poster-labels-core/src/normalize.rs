//! Text normalization for raw product descriptions.
//!
//! Two separate concerns live here:
//!
//! - [`normalize`] repairs known brand-name artifacts in supplier exports
//!   (a brand consistently exported without its accent, for example). It is
//!   applied to every description before field extraction.
//! - [`fold`] produces a comparison key (accents stripped, whitespace
//!   collapsed, lowercased). It never changes displayed text and is only
//!   used to match a candidate against stored corrections.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Brand spellings that supplier exports consistently get wrong.
///
/// Each pattern is matched case-insensitively. The replacement must not
/// itself contain a match for any pattern, which keeps [`normalize`]
/// idempotent.
const BRAND_FIXES: &[(&str, &str)] = &[("ANCELI", "ANCÉLI"), ("ITALAC", "ITÁLAC")];

lazy_static! {
    static ref BRAND_PATTERNS: Vec<(Regex, &'static str)> = BRAND_FIXES
        .iter()
        .map(|(from, to)| {
            let re = Regex::new(&format!("(?i){}", regex::escape(from)))
                .expect("brand pattern is a valid regex");
            (re, *to)
        })
        .collect();
}

/// Apply the fixed brand-name repairs to `text`.
///
/// Total and idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut out = text.to_string();
    for (re, replacement) in BRAND_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, regex::NoExpand(replacement)).into_owned();
        }
    }
    out
}

/// Remove diacritics: canonical decomposition, then drop combining marks.
pub fn strip_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapse runs of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key used for normalized matching of corrections.
///
/// `fold("  Ancéli   Leite ")` and `fold("ANCELI LEITE")` are equal.
pub fn fold(text: &str) -> String {
    collapse_whitespace(&strip_accents(text)).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_fix_case_insensitive() {
        assert_eq!(normalize("LEITE anceli 1L"), "LEITE ANCÉLI 1L");
        assert_eq!(normalize("Italac integral"), "ITÁLAC integral");
    }

    #[test]
    fn test_normalize_leaves_other_text() {
        assert_eq!(normalize("COCA COLA LATA 350ML"), "COCA COLA LATA 350ML");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "LEITE ANCELI 1L",
            "italac italac",
            "ANCÉLI",
            "  espaços   à toa ",
            "ITALACANCELI",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("AÇÚCAR CRISTAL"), "ACUCAR CRISTAL");
        assert_eq!(strip_accents("maçã"), "maca");
    }

    #[test]
    fn test_fold() {
        assert_eq!(fold("  Ancéli   Leite "), "anceli leite");
        assert_eq!(fold("ANCELI LEITE"), fold("ancéli  leite"));
        assert_eq!(fold(""), "");
    }
}
