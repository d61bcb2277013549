//! Symbol handling: normalization of raw input and the canonical token type.

mod normalizer;
mod symbols_model;

pub use normalizer::{normalize_symbol, SuffixForm, TimeframeSuffix, TIMEFRAME_SUFFIXES};
pub use symbols_model::{infer_symbol, SymbolSource, SymbolToken, KNOWN_SYMBOLS};
