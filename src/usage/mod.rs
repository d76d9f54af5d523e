//! Usage ledger: per-user daily/monthly call counters gated by tier limits
//!
//! The ledger runs a two-phase protocol. [`UsageLedger::check_and_consume`] reads the
//! counters (applying the lazy day-rollover reset) and rejects the call when the daily
//! limit is reached; [`UsageLedger::record_usage`] commits one call after the provider
//! succeeded. Between the two phases concurrent calls of one user can each pass the gate,
//! so up to `concurrency - 1` extra calls may be admitted unless `strict_limits` is on.

pub mod config;
pub mod tier;

use crate::database::DatabaseManager;
use crate::database::entities::ProfileRecord;
use crate::error::AppError;
use crate::usage::config::UsageConfig;
use crate::usage::tier::{Tier, TierLimits};
use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Counters observed by a successful gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSnapshot {
    pub tier: Tier,
    pub daily_usage: i32,
    pub monthly_usage: i32,
    pub limits: TierLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub daily_usage: i32,
    pub monthly_usage: i32,
    pub daily_limit: i32,
    pub monthly_limit: i32,
    pub tier: Tier,
}

/// Held for the whole gate/provider/commit sequence when limits are strict
pub type UserPermit = OwnedMutexGuard<()>;

#[derive(Clone)]
pub struct UsageLedger {
    database: Arc<dyn DatabaseManager>,
    config: UsageConfig,
    user_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UsageLedger {
    pub fn new(database: Arc<dyn DatabaseManager>, config: UsageConfig) -> Self {
        Self {
            database,
            config,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn strict_limits(&self) -> bool {
        self.config.strict_limits
    }

    /// Per-user serialisation permit; `None` unless `strict_limits` is enabled
    pub async fn acquire(&self, user_id: &str) -> Option<UserPermit> {
        if !self.config.strict_limits {
            return None;
        }

        let lock = self
            .user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        Some(lock.lock_owned().await)
    }

    /// Gate a call: apply the lazy reset for `today`, then reject if the daily limit is reached
    pub async fn check_and_consume(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<GateSnapshot, AppError> {
        let profile = self.load_current(user_id, today).await?;
        let tier = profile.tier();
        let limits = tier.limits();

        if profile.daily_usage >= limits.daily {
            info!(
                user_id = %user_id,
                tier = %tier,
                daily_usage = profile.daily_usage,
                "Daily query limit reached"
            );
            return Err(AppError::QuotaExceeded {
                tier,
                daily_limit: limits.daily,
            });
        }

        Ok(GateSnapshot {
            tier,
            daily_usage: profile.daily_usage,
            monthly_usage: profile.monthly_usage,
            limits,
        })
    }

    /// Commit one successful call to the daily and monthly counters
    pub async fn record_usage(&self, user_id: &str) -> Result<(), AppError> {
        self.database.profiles().increment_usage(user_id).await?;
        debug!(user_id = %user_id, "Recorded usage");
        Ok(())
    }

    pub async fn usage_stats(&self, user_id: &str, today: NaiveDate) -> Result<UsageStats, AppError> {
        let profile = self.load_current(user_id, today).await?;
        let tier = profile.tier();
        let limits = tier.limits();

        Ok(UsageStats {
            daily_usage: profile.daily_usage,
            monthly_usage: profile.monthly_usage,
            daily_limit: limits.daily,
            monthly_limit: limits.monthly,
            tier,
        })
    }

    /// Read the profile with counters valid for `today`
    async fn load_current(&self, user_id: &str, today: NaiveDate) -> Result<ProfileRecord, AppError> {
        let profiles = self.database.profiles();
        let mut profile = profiles
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("profile not found".to_string()))?;

        if profile.last_reset_date != today {
            let new_month = (profile.last_reset_date.year(), profile.last_reset_date.month())
                != (today.year(), today.month());
            let reset_monthly = self.config.monthly_reset && new_month;

            if profiles.reset_counters(user_id, today, reset_monthly).await? {
                debug!(user_id = %user_id, %today, reset_monthly, "Reset usage counters");
            }

            profile.daily_usage = 0;
            if reset_monthly {
                profile.monthly_usage = 0;
            }
            profile.last_reset_date = today;
        }

        Ok(profile)
    }
}
