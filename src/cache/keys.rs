//! Composite cache keys built from typed segments.
//!
//! Every segment is written in its canonical form followed by a `:`
//! terminator. Tags are prefixed with `#`; raw text escapes `\`, `:` and `#`
//! with a backslash. The result is injective and prefix preserving: the key
//! of `[a, b]` starts with the key of `[a]`, and the key of chain `1` is never
//! a prefix of the key of chain `10`.

use std::fmt;

use crate::models::{ChainId, EvmAddress};

const TERMINATOR: char = ':';
const TAG_MARKER: char = '#';
const ESCAPE: char = '\\';

/// Logical key spaces of the cache tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    CurvePoolAddress,
    CurvePoolTokens,
    CurveLpTokens,
    CurveGaugeAddress,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::CurvePoolAddress => "CURVE_POOL_ADDRESS",
            CacheType::CurvePoolTokens => "CURVE_POOL_TOKENS",
            CacheType::CurveLpTokens => "CURVE_LP_TOKENS",
            CacheType::CurveGaugeAddress => "CURVE_GAUGE_ADDRESS",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    Tag(CacheType),
    Raw(String),
}

impl KeySegment {
    fn write_to(&self, out: &mut String) {
        match self {
            KeySegment::Tag(cache_type) => {
                out.push(TAG_MARKER);
                out.push_str(cache_type.as_str());
            }
            KeySegment::Raw(raw) => {
                for c in raw.chars() {
                    if matches!(c, ESCAPE | TERMINATOR | TAG_MARKER) {
                        out.push(ESCAPE);
                    }
                    out.push(c);
                }
            }
        }
        out.push(TERMINATOR);
    }
}

impl From<CacheType> for KeySegment {
    fn from(cache_type: CacheType) -> Self {
        KeySegment::Tag(cache_type)
    }
}

impl From<&str> for KeySegment {
    fn from(raw: &str) -> Self {
        KeySegment::Raw(raw.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(raw: String) -> Self {
        KeySegment::Raw(raw)
    }
}

impl From<ChainId> for KeySegment {
    fn from(chain_id: ChainId) -> Self {
        KeySegment::Raw(chain_id.serialize_for_db())
    }
}

impl From<&EvmAddress> for KeySegment {
    fn from(address: &EvmAddress) -> Self {
        KeySegment::Raw(address.to_string())
    }
}

impl From<usize> for KeySegment {
    fn from(index: usize) -> Self {
        KeySegment::Raw(index.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap a key read back from a cache table.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Decode the segments following `prefix`. `prefix` must be recomputed
    /// from the same typed segments that built the start of this key.
    /// Returns `None` when the key does not start with `prefix` or the
    /// remainder is not a sequence of whole segments.
    pub fn suffix_after(&self, prefix: &CacheKey) -> Option<Vec<String>> {
        let rest = self.0.strip_prefix(&prefix.0)?;
        decode_segments(rest)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn compute_cache_key(segments: &[KeySegment]) -> CacheKey {
    let mut out = String::new();
    for segment in segments {
        segment.write_to(&mut out);
    }
    CacheKey(out)
}

/// Tags decode to their name, raw segments to their unescaped text.
fn decode_segments(encoded: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = encoded.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => current.push(chars.next()?),
            TERMINATOR => segments.push(std::mem::take(&mut current)),
            TAG_MARKER if current.is_empty() => {}
            other => current.push(other),
        }
    }

    // trailing bytes without a terminator are not a whole segment
    if !current.is_empty() {
        return None;
    }
    Some(segments)
}
