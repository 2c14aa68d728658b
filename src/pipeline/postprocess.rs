//! Post-processing: deterministic normalisation of extracted text.
//!
//! Every extractor returns marker-delimited raw text (`--- Page N ---`,
//! `--- Sheet: name ---`). This module applies one cleaning pass before the
//! text is handed to the caller. The pass is line-preserving so the markers
//! stay on their own lines, and it is idempotent: cleaning already-cleaned
//! text returns it unchanged.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so that the whitespace rule only ever
//! sees `\n` as a line separator. OCR character fixes run on words, after
//! whitespace has been collapsed, so that word boundaries are stable.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleaning rules to raw extracted text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Collapse runs of horizontal whitespace to one space
/// 4. Correct common OCR confusions inside numeric tokens
/// 5. Trim each line and drop empty lines
pub fn clean_text(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_horizontal_whitespace(&s);
    let s = fix_ocr_confusions(&s);
    drop_empty_lines(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Collapse horizontal whitespace ───────────────────────────────────

/// Any whitespace except the line feed.
static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());

fn collapse_horizontal_whitespace(input: &str) -> String {
    RE_HSPACE.replace_all(input, " ").into_owned()
}

// ── Rule 4: OCR confusions ───────────────────────────────────────────────────
//
// Tesseract regularly reads `0` as `O`, `1` as `l`/`I`, `5` as `S` and `6` as
// `G`. A purely alphanumeric token that already contains a digit is almost
// certainly a number or code, so the letter look-alikes are mapped back to
// digits there. Tokens without digits are left alone.

fn fix_ocr_confusions(input: &str) -> String {
    input
        .split('\n')
        .map(|line| {
            line.split(' ')
                .map(fix_token)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fix_token(word: &str) -> std::borrow::Cow<'_, str> {
    let numeric_token = !word.is_empty()
        && word.chars().all(char::is_alphanumeric)
        && word.chars().any(|c| c.is_ascii_digit());
    if !numeric_token {
        return std::borrow::Cow::Borrowed(word);
    }
    std::borrow::Cow::Owned(
        word.chars()
            .map(|c| match c {
                'l' | 'I' => '1',
                'O' => '0',
                'S' => '5',
                'G' => '6',
                other => other,
            })
            .collect(),
    )
}

// ── Rule 5: Trim lines and drop empty ones ───────────────────────────────────

fn drop_empty_lines(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
