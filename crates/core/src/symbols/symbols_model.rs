use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::normalizer::normalize_symbol;
use crate::errors::{Result, ValidationError};

/// Instruments the loader is routinely used with. Only used for an
/// informational notice; unknown symbols still load.
pub const KNOWN_SYMBOLS: &[&str] = &[
    "XAUUSD", "EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "AUDCAD", "AUDJPY", "CADJPY", "CHFJPY",
    "EURAUD", "EURGBP", "EURJPY", "GBPAUD", "GBPJPY", "NZDUSD", "USDCAD", "USDCHF", "BTCUSD",
    "ETHUSD", "NAS100",
];

/// A normalized, non-empty instrument identifier such as `EURUSD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolToken(String);

impl SymbolToken {
    /// Normalizes `raw` and rejects the result if nothing is left.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_symbol(raw);
        if normalized.is_empty() {
            return Err(ValidationError::MissingField("symbol".to_string()).into());
        }
        Ok(Self(normalized))
    }

    /// Wraps a value that was already normalized, e.g. one read back from
    /// storage. Normalizing again could strip a second suffix.
    pub fn from_canonical(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the symbol is part of [`KNOWN_SYMBOLS`].
    pub fn is_known(&self) -> bool {
        KNOWN_SYMBOLS.contains(&self.0.as_str())
    }
}

impl fmt::Display for SymbolToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SymbolToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where the target symbol of a load comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolSource {
    /// Operator supplied text, normalized before use.
    Explicit(String),
    /// Derived from the source file name (`EURUSD1440.csv` -> `EURUSD`).
    InferFromFile,
}

impl SymbolSource {
    pub fn resolve(&self, file_path: &Path) -> Result<SymbolToken> {
        match self {
            SymbolSource::Explicit(raw) => SymbolToken::parse(raw),
            SymbolSource::InferFromFile => infer_symbol(file_path),
        }
    }
}

/// Infers a symbol from the file stem of `path`.
pub fn infer_symbol(path: &Path) -> Result<SymbolToken> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    SymbolToken::parse(&stem)
}
