//! Free-text search terms for LIKE predicates
//!
//! A term is normally matched as a substring: its LIKE metacharacters are
//! escaped and it is wrapped in `%`. A term starting with [`SQL_EXACT_MATCH`]
//! is matched as written instead. Pair the result with [`like_clause`], whose
//! `ESCAPE` clause makes the backslash escapes portable.

/// Prefix that turns off wildcard wrapping
pub const SQL_EXACT_MATCH: &str = "=";

/// Pattern matching every value
pub const SQL_MATCH_ALL: &str = "%";

/// LIKE pattern for a search term.
///
/// # Example
///
/// ```
/// use dbquery::core::search::wildcard;
///
/// assert_eq!(wildcard(None), "%");
/// assert_eq!(wildcard(Some("=ann")), "ann");
/// assert_eq!(wildcard(Some("50% off")), "%50\\% off%");
/// ```
pub fn wildcard(term: Option<&str>) -> String {
    match term {
        None | Some("") => SQL_MATCH_ALL.to_string(),
        Some(t) => match t.strip_prefix(SQL_EXACT_MATCH) {
            Some(exact) => exact.to_string(),
            None => format!("%{}%", escape_like(t)),
        },
    }
}

/// Force exact matching of `term`; `None` gives the bare prefix
pub fn exact_match(term: Option<&str>) -> String {
    match term {
        Some(t) => format!("{}{}", SQL_EXACT_MATCH, t),
        None => SQL_EXACT_MATCH.to_string(),
    }
}

/// Whether `term` asks for exact matching
pub fn is_exact_match(term: &str) -> bool {
    term.starts_with(SQL_EXACT_MATCH)
}

/// Escape `\`, `%` and `_` with a backslash
pub fn escape_like(term: &str) -> String {
    let mut result = String::with_capacity(term.len() * 2);
    for c in term.chars() {
        match c {
            '\\' | '%' | '_' => {
                result.push('\\');
                result.push(c);
            }
            c => result.push(c),
        }
    }
    result
}

/// `<column> LIKE ? ESCAPE '\'`
pub fn like_clause(column: &str) -> String {
    format!("{} LIKE ? ESCAPE '\\'", column)
}
