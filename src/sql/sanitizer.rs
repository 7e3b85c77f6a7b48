//! SQL sanitizer
//!
//! Strips comments and normalises whitespace so that the validator's
//! substring and adjacency checks see the statement the database would see,
//! minus anything a comment could hide.

use std::sync::LazyLock;

use regex::Regex;

static LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)--.*$").expect("line comment pattern"));

static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Remove `--` and `/* */` comments, trim, and collapse whitespace runs.
///
/// Comment removal repeats until nothing changes: deleting `/**/` from
/// `-/**/-` would otherwise leave a fresh `--` behind. Each pass that changes
/// the string shortens it, so the loop terminates. An unterminated `/*` is
/// left in place for the validator to reject.
pub fn sanitize(raw: &str) -> String {
    let mut sql = raw.to_string();
    loop {
        let without_lines = LINE_COMMENT_RE.replace_all(&sql, "");
        let stripped = BLOCK_COMMENT_RE.replace_all(&without_lines, "").into_owned();
        if stripped == sql {
            break;
        }
        sql = stripped;
    }
    WHITESPACE_RE.replace_all(sql.trim(), " ").into_owned()
}
