//! Engine configuration
//!
//! One explicit config object constructed at process start and handed to the
//! coordinator and sweep, instead of constants scattered across call sites.

use std::time::Duration;

use crate::error::{MatchingError, Result};

// ============================================================================
// DEFAULTS
// ============================================================================

/// Minimum hybrid similarity for a candidate to be reported
pub const DEFAULT_THRESHOLD: f32 = 0.75;

/// Maximum ranked matches returned by an instant match
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Matches at or above this score are persisted to the match store
pub const PERSIST_THRESHOLD: f32 = 0.8;

/// Scores above this mark a result as high-similarity
pub const HIGH_SIMILARITY_THRESHOLD: f32 = 0.85;

/// TTL for cached instant-match results (30 minutes)
pub const RESULT_TTL_SECS: u64 = 1800;

/// TTL for cached embeddings (1 hour)
pub const EMBEDDING_TTL_SECS: u64 = 3600;

/// Items processed longer ago than this are re-swept
pub const SWEEP_STALE_AFTER_HOURS: i64 = 24;

/// Upper bound accepted for `limit`-style arguments
pub const MAX_LIMIT: usize = 500;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tunables for the matching engine
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Default similarity threshold when the caller supplies none
    pub default_threshold: f32,
    /// Default cap on ranked matches per instant-match call
    pub default_max_results: usize,
    /// Minimum score for persisting a match record
    pub persist_threshold: f32,
    /// Score above which a result is flagged high-similarity
    pub high_similarity_threshold: f32,
    /// TTL for cached match results
    pub result_ttl: Duration,
    /// TTL for cached embeddings
    pub embedding_ttl: Duration,
    /// Re-sweep items whose last processing is older than this
    pub sweep_stale_after: chrono::Duration,
    /// Superset size fetched per item during the sweep
    pub sweep_search_limit: usize,
    /// Matches persisted per item during the sweep
    pub sweep_keep_limit: usize,
    /// Pacing delay between sweep items (0 disables)
    pub sweep_pacing: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            default_max_results: DEFAULT_MAX_RESULTS,
            persist_threshold: PERSIST_THRESHOLD,
            high_similarity_threshold: HIGH_SIMILARITY_THRESHOLD,
            result_ttl: Duration::from_secs(RESULT_TTL_SECS),
            embedding_ttl: Duration::from_secs(EMBEDDING_TTL_SECS),
            sweep_stale_after: chrono::Duration::hours(SWEEP_STALE_AFTER_HOURS),
            sweep_search_limit: 10,
            sweep_keep_limit: 5,
            sweep_pacing: Duration::from_millis(100),
        }
    }
}

// ============================================================================
// ARGUMENT VALIDATION
// ============================================================================

/// Validate a caller-supplied similarity threshold
pub fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) || threshold.is_nan() {
        return Err(MatchingError::InvalidArgument(format!(
            "threshold must be within [0, 1], got {threshold}"
        )));
    }
    Ok(())
}

/// Validate a caller-supplied result/item limit
pub fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(MatchingError::InvalidArgument(format!(
            "limit must be within 1..={MAX_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatchingConfig::default();
        assert_eq!(config.default_threshold, 0.75);
        assert_eq!(config.default_max_results, 10);
        assert_eq!(config.sweep_keep_limit, 5);
        assert_eq!(config.result_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(0.75).is_ok());
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(1.5).is_err());
        assert!(validate_threshold(f32::NAN).is_err());
    }

    #[test]
    fn test_limit_bounds() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(500).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(501).is_err());
    }
}
