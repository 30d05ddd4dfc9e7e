//! Header token parser.
//!
//! Each header token encodes how one file column maps onto the target
//! table:
//!
//! ```text
//! ColumnName
//! ColumnName[LookupColumn]
//! ColumnName/K                          (K = unique key within the file)
//! RelatedTable>ColumnName[LookupColumn]/K
//! ```
//!
//! Parsing is pure and total: malformed tokens degrade to a single-part
//! path with no lookup and no key flag rather than failing.

use std::sync::OnceLock;

use regex::Regex;

fn bracket_pattern() -> &'static Regex {
    static BRACKETS: OnceLock<Regex> = OnceLock::new();
    BRACKETS.get_or_init(|| Regex::new(r"^(.+?)\[(.+?)\]$").expect("valid bracket pattern"))
}

/// One parsed header token. Immutable once parsed; rows reference specs
/// by column position rather than by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Raw token text, kept for diagnostics.
    pub original: String,
    /// Token split on `>`; the last element is always the target column.
    pub path_parts: Vec<String>,
    /// Column written to / read from on the destination table.
    pub target_column: String,
    /// Lookup key column when a `[Column]` suffix is present.
    pub lookup_column: Option<String>,
    /// `/K` suffix: values must be unique across the file.
    pub is_key: bool,
    /// 1-based position in the header, used only for diagnostics.
    pub column_index: usize,
}

impl FieldSpec {
    pub fn parse(token: &str, column_index: usize) -> FieldSpec {
        let original = token.to_string();
        let mut rest = token.trim().to_string();

        // /K is always a trailing suffix, so strip it before bracket
        // detection.
        let mut is_key = false;
        if rest.ends_with("/K") || rest.ends_with("/k") {
            is_key = true;
            rest.truncate(rest.len() - 2);
            rest = rest.trim().to_string();
        }

        let mut lookup_column = None;
        if let Some(caps) = bracket_pattern().captures(&rest) {
            lookup_column = Some(caps[2].trim().to_string());
            rest = caps[1].trim().to_string();
        }

        let mut path_parts: Vec<String> = rest
            .split('>')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if path_parts.is_empty() {
            // Blank or separator-only token: degrade to a single direct
            // column so the invariants (non-empty path) hold.
            path_parts.push(rest.clone());
            lookup_column = None;
            is_key = false;
        }
        let target_column = path_parts
            .last()
            .map(|s| s.to_string())
            .unwrap_or_default();

        FieldSpec {
            original,
            path_parts,
            target_column,
            lookup_column,
            is_key,
            column_index,
        }
    }

    /// Table a configured lookup runs against: the second-to-last path
    /// segment when the token has a path, otherwise the target column
    /// with a trailing `_ID` stripped (`C_BPartner_ID` -> `C_BPartner`).
    pub fn lookup_table(&self) -> Option<String> {
        self.lookup_column.as_ref()?;
        if self.path_parts.len() > 1 {
            Some(self.path_parts[self.path_parts.len() - 2].clone())
        } else {
            let target = self.target_column.as_str();
            if target.len() > 3 && target.to_ascii_uppercase().ends_with("_ID") {
                Some(target[..target.len() - 3].to_string())
            } else {
                Some(target.to_string())
            }
        }
    }
}

/// Parse a full header token list into specs with 1-based positions.
pub fn parse_header(tokens: &[String]) -> Vec<FieldSpec> {
    tokens
        .iter()
        .enumerate()
        .map(|(idx, token)| FieldSpec::parse(token.trim(), idx + 1))
        .collect()
}
