use crate::model::TrustTier;

/// Inclusive lower bounds for each tier band.
///
/// These are configuration constants, not derived data: the persisted
/// `status` column is recomputed on every write and derived on every read
/// path, so changing the bands never requires a data migration.
#[derive(Debug, Clone, Copy)]
pub struct TierThresholds {
    pub good_min: i64,
    pub warning_min: i64,
    pub watch_min: i64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            good_min: 80,
            warning_min: 50,
            watch_min: 25,
        }
    }
}

impl TierThresholds {
    /// Total, monotonic map from score to tier.
    pub fn classify(&self, trust_score: i64) -> TrustTier {
        if trust_score >= self.good_min {
            TrustTier::Good
        } else if trust_score >= self.warning_min {
            TrustTier::Warning
        } else if trust_score >= self.watch_min {
            TrustTier::Watch
        } else {
            TrustTier::Blacklisted
        }
    }

    /// Exclusive score bound for "this tier or worse".
    ///
    /// Every score strictly below the returned value classifies into
    /// `min_tier` or a more severe band, which is exactly the filter the
    /// suspicious-customer view needs.
    pub fn upper_bound(&self, min_tier: TrustTier) -> i64 {
        match min_tier {
            TrustTier::Good => i64::MAX,
            TrustTier::Warning => self.good_min,
            TrustTier::Watch => self.warning_min,
            TrustTier::Blacklisted => self.watch_min,
        }
    }
}

/// Domain bounds for the trust score itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBounds {
    pub min: i64,
    pub max: i64,
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

impl ScoreBounds {
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }
}
