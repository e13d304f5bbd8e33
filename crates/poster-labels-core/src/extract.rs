//! Field extraction from free-text product descriptions.
//!
//! Splits a description such as `"COCA COLA LATA 350ML"` into a base name
//! (`COCA COLA`), a weight/volume token (`350ML`) and a variety token
//! (`LATA`).
//!
//! # Algorithm
//!
//! 1. Apply [`normalize`](crate::normalize::normalize).
//! 2. Find the first weight token (`digits[,digits] + unit`, whole word,
//!    case-insensitive), record it uppercased and cut it from the text.
//! 3. Find the first variety word in what remains, record it uppercased and
//!    cut it from the text.
//! 4. Collapse whitespace, strip trailing punctuation and uppercase the rest
//!    into the base name.
//!
//! Weight runs before variety. The two vocabularies are disjoint, but the
//! order is kept fixed so results are reproducible.
//!
//! Extraction is total: input with no recognisable token simply yields an
//! empty token and everything ends up in the base name.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::normalize::{collapse_whitespace, normalize};

lazy_static! {
    static ref WEIGHT_RE: Regex =
        Regex::new(r"(?i)\b\d+(?:[.,]\d+)?\s*(?:UNID|UND|UN|KG|ML|PCT|CX|DZ|G|L)\b")
            .expect("weight pattern is a valid regex");
    static ref VARIETY_RE: Regex = Regex::new(concat!(
        r"(?i)\b(?:",
        r"DIET|ZERO|LIGHT|LATA|CAN|ORIGINAL|TRADICIONAL|",
        r"SEMI-?DESNATADO|DESNATADO|INTEGRAL|",
        r"TIPO\s*\d+|T[123]|",
        r"LARANJA|MARACUJ[AÁ]|UVA|MORANGO|LIM[AÃ]O|LIMA|ABACAXI|P[EÊ]SSEGO|MA[CÇ][AÃ]|",
        r"BANANA|CEREJA|FRAMBOESA|MENTA|HORTEL[AÃ]|C[IÍ]TRICO|CITRUS|MANGA|GOIABA|BAUNILHA",
        r")\b"
    ))
    .expect("variety pattern is a valid regex");
    static ref TRAILING_PUNCT_RE: Regex =
        Regex::new(r"[^\w\s]+$").expect("trailing punctuation pattern is a valid regex");
}

/// The three text fields pulled out of a description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub base_name: String,
    pub weight: String,
    pub variety: String,
}

/// Split a raw description into base name, weight and variety.
pub fn extract(text: &str) -> ExtractedFields {
    let mut working = normalize(text);

    let weight = match WEIGHT_RE.find(&working) {
        Some(m) => {
            let token = weight_token(m.as_str());
            working = cut(&working, m.range());
            token
        }
        None => String::new(),
    };

    let variety = match VARIETY_RE.find(&working) {
        Some(m) => {
            let token = collapse_whitespace(m.as_str()).to_uppercase();
            working = cut(&working, m.range());
            token
        }
        None => String::new(),
    };

    ExtractedFields {
        base_name: clean_base_name(&working),
        weight,
        variety,
    }
}

/// `"350 ml"` → `"350ML"`.
fn weight_token(matched: &str) -> String {
    matched
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn cut(text: &str, range: Range<usize>) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..range.start]);
    out.push(' ');
    out.push_str(&text[range.end..]);
    out
}

fn clean_base_name(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let stripped = TRAILING_PUNCT_RE.replace(&collapsed, "");
    stripped.trim().to_uppercase()
}
