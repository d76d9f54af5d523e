use crate::usage::tier::Tier;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Identity-provider user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub email: String,
    /// Stored as text; read through [`Model::tier`] so unknown values degrade to free
    pub tier: String,
    pub daily_usage: i32,
    pub monthly_usage: i32,
    pub last_reset_date: NaiveDate,
    #[serde(skip_serializing)]
    pub billing_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(id: impl Into<String>, email: impl Into<String>, tier: Tier) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            tier: tier.as_str().to_string(),
            daily_usage: 0,
            monthly_usage: 0,
            last_reset_date: now.date_naive(),
            billing_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tier(&self) -> Tier {
        Tier::parse_lossy(&self.tier)
    }

    /// Builder method to set counters (for tests and seeding)
    pub fn with_usage(mut self, daily: i32, monthly: i32, last_reset_date: NaiveDate) -> Self {
        self.daily_usage = daily;
        self.monthly_usage = monthly;
        self.last_reset_date = last_reset_date;
        self
    }
}
