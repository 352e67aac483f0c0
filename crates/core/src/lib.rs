//! Core reward orchestration logic.
//!
//! This crate provides the domain layer over the transaction core:
//! - Activity types and achievement tiers with their XP thresholds
//! - The XP and achievement reward façades (validate, precondition,
//!   submit, shape the response)
//! - Table-driven retry policy over the error taxonomy
//! - Uniform response shapes for the HTTP surface
//! - Configuration (env-driven chain settings + tuning profiles)
//! - The orchestrator that wires the whole stack together

mod achievements;
mod activity;
pub mod config;
mod orchestrator;
mod response;
mod retry;
mod tiers;
mod xp;

pub use achievements::AchievementRewardService;
pub use activity::ActivityType;
pub use config::{ChainSettings, TuningConfig};
pub use orchestrator::{RewardOrchestrator, SignerRoles};
pub use response::{check_status_path, ResponseStatus, RewardResponse, XpBalance};
pub use retry::{backoff_delay, retry_class, submit_with_retry, RetryClass};
pub use tiers::AchievementTier;
pub use xp::XpRewardService;
