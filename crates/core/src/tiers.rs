//! Achievement tiers and their XP thresholds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Achievement tier; the ordinal maps to the achievement contract's enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AchievementTier {
    Beginner = 0,
    Intermediate = 1,
    Advanced = 2,
    Expert = 3,
    Master = 4,
}

impl AchievementTier {
    /// All tiers, lowest threshold first.
    pub const ALL: [AchievementTier; 5] = [
        Self::Beginner,
        Self::Intermediate,
        Self::Advanced,
        Self::Expert,
        Self::Master,
    ];

    /// Contract-side enum ordinal.
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Tier from its contract ordinal.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Beginner),
            1 => Some(Self::Intermediate),
            2 => Some(Self::Advanced),
            3 => Some(Self::Expert),
            4 => Some(Self::Master),
            _ => None,
        }
    }

    /// Cumulative XP required to qualify for this tier.
    pub fn xp_threshold(&self) -> u64 {
        match self {
            Self::Beginner => 100,
            Self::Intermediate => 500,
            Self::Advanced => 750,
            Self::Expert => 1000,
            Self::Master => 2000,
        }
    }

    /// Highest tier whose threshold is at or below `total_xp`.
    /// `None` when the total is below the Beginner threshold.
    pub fn for_xp(total_xp: u64) -> Option<Self> {
        Self::ALL
            .iter()
            .rev()
            .find(|tier| tier.xp_threshold() <= total_xp)
            .copied()
    }

    /// Human-readable tier name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
            Self::Expert => "Expert",
            Self::Master => "Master",
        }
    }
}

impl fmt::Display for AchievementTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementTier {
    type Err = String;

    /// Accepts the tier name (any case) or the numeric ordinal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<u8>() {
            return Self::from_id(id).ok_or_else(|| format!("unknown tier ordinal: {id}"));
        }
        Self::ALL
            .iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown achievement tier: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(AchievementTier::Beginner.xp_threshold(), 100);
        assert_eq!(AchievementTier::Intermediate.xp_threshold(), 500);
        assert_eq!(AchievementTier::Advanced.xp_threshold(), 750);
        assert_eq!(AchievementTier::Expert.xp_threshold(), 1000);
        assert_eq!(AchievementTier::Master.xp_threshold(), 2000);
    }

    #[test]
    fn test_tier_for_xp() {
        assert_eq!(AchievementTier::for_xp(0), None);
        assert_eq!(AchievementTier::for_xp(99), None);
        assert_eq!(AchievementTier::for_xp(100), Some(AchievementTier::Beginner));
        assert_eq!(AchievementTier::for_xp(499), Some(AchievementTier::Beginner));
        assert_eq!(AchievementTier::for_xp(500), Some(AchievementTier::Intermediate));
        assert_eq!(AchievementTier::for_xp(750), Some(AchievementTier::Advanced));
        assert_eq!(AchievementTier::for_xp(1999), Some(AchievementTier::Expert));
        assert_eq!(AchievementTier::for_xp(2000), Some(AchievementTier::Master));
        assert_eq!(AchievementTier::for_xp(u64::MAX), Some(AchievementTier::Master));
    }

    #[test]
    fn test_ordinal_mapping() {
        for tier in AchievementTier::ALL {
            assert_eq!(AchievementTier::from_id(tier.id()), Some(tier));
        }
        assert_eq!(AchievementTier::from_id(5), None);
    }

    #[test]
    fn test_parsing() {
        assert_eq!("expert".parse::<AchievementTier>().unwrap(), AchievementTier::Expert);
        assert_eq!("Master".parse::<AchievementTier>().unwrap(), AchievementTier::Master);
        assert_eq!("0".parse::<AchievementTier>().unwrap(), AchievementTier::Beginner);
        assert!("platinum".parse::<AchievementTier>().is_err());
    }
}
