//! Two-line poster label formatting.
//!
//! The poster font fits 16 characters per line, and a label may use at
//! most two lines. [`format_label`] arranges `(base name, variety, weight)`
//! inside that budget:
//!
//! 1. `name_and_variety` = base name and variety joined by a space, empty
//!    parts skipped.
//! 2. If `name_and_variety` has at most [`SHORT_NAME_CHARS`] characters,
//!    the weight goes on its own second line, unless `name_and_variety +
//!    " " + weight` is shorter than [`LINE_CHARS`], in which case everything
//!    collapses to one line. Line one is hard-cut at [`LINE_CHARS`] here,
//!    with no word-boundary search.
//! 3. Otherwise the weight is appended to the same line, and a combined
//!    line over [`LINE_CHARS`] breaks at the last space at or before
//!    position [`LINE_CHARS`] (hard cut if there is none). The remainder
//!    becomes line two, itself cut to [`LINE_CHARS`].
//! 4. Non-empty lines are joined with `\n`, without a trailing newline.
//!
//! Lengths are counted in `char`s, so accented letters count once.

/// Character budget for one poster line.
pub const LINE_CHARS: usize = 16;

/// Names up to this length keep the weight on a separate line.
pub const SHORT_NAME_CHARS: usize = 12;

/// Render the poster label for one entry.
///
/// Pure and deterministic; it runs again after every review edit.
pub fn format_label(base_name: &str, variety: &str, weight: &str) -> String {
    let name_and_variety = join_non_empty(&[base_name.trim(), variety.trim()]);
    let weight = weight.trim();

    let lines: Vec<String> = if char_len(&name_and_variety) <= SHORT_NAME_CHARS {
        let combined = join_non_empty(&[&name_and_variety, weight]);
        if weight.is_empty() || char_len(&combined) < LINE_CHARS {
            vec![hard_cut(&combined, LINE_CHARS)]
        } else {
            vec![
                hard_cut(&name_and_variety, LINE_CHARS),
                hard_cut(weight, LINE_CHARS),
            ]
        }
    } else {
        let combined = join_non_empty(&[&name_and_variety, weight]);
        if char_len(&combined) <= LINE_CHARS {
            vec![combined]
        } else {
            let (first, rest) = break_at_word(&combined, LINE_CHARS);
            vec![first, hard_cut(&rest, LINE_CHARS)]
        }
    };

    lines
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_non_empty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn hard_cut(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim_end().to_string()
}

/// Split `text` at the last whitespace at or before char position `max`.
///
/// Falls back to a hard cut at `max` when the first `max + 1` characters
/// contain no whitespace.
fn break_at_word(text: &str, max: usize) -> (String, String) {
    let chars: Vec<char> = text.chars().collect();
    let search_end = max.min(chars.len().saturating_sub(1));
    let split = (1..=search_end).rev().find(|&i| chars[i].is_whitespace());

    let (first, rest): (String, String) = match split {
        Some(i) => (chars[..i].iter().collect(), chars[i + 1..].iter().collect()),
        None => (chars[..max].iter().collect(), chars[max..].iter().collect()),
    };
    (first.trim_end().to_string(), rest.trim().to_string())
}
