//! Symbol normalization.
//!
//! Turns noisy file names and operator input (`eurusd_d1`, `XAUUSD1440`) into a
//! canonical symbol token by stripping at most one timeframe suffix.
//!
//! Suffixes are data: [`TIMEFRAME_SUFFIXES`] is an ordered rule table and the
//! first rule that matches wins. Separated rules are listed before bare ones so
//! that `EURUSD_D1` loses the whole `_D1` instead of just its trailing `1`.

/// How a timeframe suffix is attached to the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixForm {
    /// Preceded by `_`, `-` or whitespace (`EURUSD_D1`, `EURUSD W1`).
    /// The separator is removed together with the token.
    Separated,
    /// Appended directly (`XAUUSD1440`). Only the token is removed.
    Bare,
}

/// One entry of the suffix rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeframeSuffix {
    pub token: &'static str,
    pub form: SuffixForm,
}

impl TimeframeSuffix {
    const fn separated(token: &'static str) -> Self {
        Self {
            token,
            form: SuffixForm::Separated,
        }
    }

    const fn bare(token: &'static str) -> Self {
        Self {
            token,
            form: SuffixForm::Bare,
        }
    }

    /// Returns the byte offset at which `symbol` should be truncated if this
    /// rule applies to it.
    fn truncation_point(&self, symbol: &str) -> Option<usize> {
        let stem = symbol.strip_suffix(self.token)?;
        match self.form {
            SuffixForm::Bare => Some(stem.len()),
            SuffixForm::Separated => {
                let separator = stem.chars().next_back()?;
                is_separator(separator).then(|| stem.len() - separator.len_utf8())
            }
        }
    }
}

/// Timeframe suffixes in priority order. Bare numeric tokens are sorted
/// longest first so `1440` wins over a trailing `1`.
pub const TIMEFRAME_SUFFIXES: &[TimeframeSuffix] = &[
    TimeframeSuffix::separated("D1"),
    TimeframeSuffix::separated("W1"),
    TimeframeSuffix::separated("MN"),
    TimeframeSuffix::bare("1440"),
    TimeframeSuffix::bare("240"),
    TimeframeSuffix::bare("60"),
    TimeframeSuffix::bare("30"),
    TimeframeSuffix::bare("15"),
    TimeframeSuffix::bare("5"),
    TimeframeSuffix::bare("1"),
];

fn is_separator(c: char) -> bool {
    c == '_' || c == '-' || c.is_whitespace()
}

/// Normalizes raw symbol text into a canonical token.
///
/// Total: never fails. Empty or blank input yields an empty string, which
/// callers must treat as a missing symbol. Whitespace left in front of a
/// stripped suffix (`EURUSD 60`) is trimmed too.
pub fn normalize_symbol(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();

    for rule in TIMEFRAME_SUFFIXES {
        if let Some(end) = rule.truncation_point(&upper) {
            return upper[..end].trim_end().to_string();
        }
    }

    upper
}
