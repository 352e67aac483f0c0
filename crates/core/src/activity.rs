//! XP-earning activity types.
//!
//! The ordinal of each variant maps directly to the experience token's
//! on-chain enum; reward amounts per activity are contract-side state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Activity that earns XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ActivityType {
    LessonCompletion = 0,
    DatasetContribution = 1,
    DailyPractice = 2,
    QuizCompletion = 3,
    AchievementEarned = 4,
}

impl ActivityType {
    /// All activities, in contract-enum order.
    pub const ALL: [ActivityType; 5] = [
        Self::LessonCompletion,
        Self::DatasetContribution,
        Self::DailyPractice,
        Self::QuizCompletion,
        Self::AchievementEarned,
    ];

    /// Contract-side enum ordinal.
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Activity from its contract ordinal.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::LessonCompletion),
            1 => Some(Self::DatasetContribution),
            2 => Some(Self::DailyPractice),
            3 => Some(Self::QuizCompletion),
            4 => Some(Self::AchievementEarned),
            _ => None,
        }
    }

    /// Wire-level name (snake_case).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessonCompletion => "lesson_completion",
            Self::DatasetContribution => "dataset_contribution",
            Self::DailyPractice => "daily_practice",
            Self::QuizCompletion => "quiz_completion",
            Self::AchievementEarned => "achievement_earned",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    /// Accepts the snake_case name or the numeric ordinal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<u8>() {
            return Self::from_id(id).ok_or_else(|| format!("unknown activity ordinal: {id}"));
        }
        Self::ALL
            .iter()
            .find(|activity| activity.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown activity type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_mapping() {
        assert_eq!(ActivityType::LessonCompletion.id(), 0);
        assert_eq!(ActivityType::DatasetContribution.id(), 1);
        assert_eq!(ActivityType::DailyPractice.id(), 2);
        assert_eq!(ActivityType::QuizCompletion.id(), 3);
        assert_eq!(ActivityType::AchievementEarned.id(), 4);

        for activity in ActivityType::ALL {
            assert_eq!(ActivityType::from_id(activity.id()), Some(activity));
        }
        assert_eq!(ActivityType::from_id(5), None);
    }

    #[test]
    fn test_parsing() {
        assert_eq!(
            "dataset_contribution".parse::<ActivityType>().unwrap(),
            ActivityType::DatasetContribution
        );
        assert_eq!(
            "QUIZ_COMPLETION".parse::<ActivityType>().unwrap(),
            ActivityType::QuizCompletion
        );
        assert_eq!("2".parse::<ActivityType>().unwrap(), ActivityType::DailyPractice);
        assert!("arbitrary".parse::<ActivityType>().is_err());
        assert!("9".parse::<ActivityType>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ActivityType::DailyPractice).unwrap();
        assert_eq!(json, "\"daily_practice\"");
    }
}
