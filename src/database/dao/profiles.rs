use crate::database::entities::{ProfileRecord, profiles};
use crate::database::{DatabaseError, DatabaseResult};
use crate::usage::tier::Tier;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};

/// Profiles DAO: one row per user carrying tier and usage counters
#[derive(Clone)]
pub struct ProfilesDao {
    db: DatabaseConnection,
}

impl ProfilesDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new profile; fails with `Constraint` if the id is taken
    pub async fn create(&self, profile: &ProfileRecord) -> DatabaseResult<ProfileRecord> {
        let active_model = profiles::ActiveModel {
            id: Set(profile.id.clone()),
            email: Set(profile.email.clone()),
            tier: Set(profile.tier.clone()),
            daily_usage: Set(profile.daily_usage),
            monthly_usage: Set(profile.monthly_usage),
            last_reset_date: Set(profile.last_reset_date),
            billing_customer_id: Set(profile.billing_customer_id.clone()),
            created_at: Set(profile.created_at),
            updated_at: Set(profile.updated_at),
        };

        active_model.insert(&self.db).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("UNIQUE") || message.contains("duplicate key") {
                DatabaseError::Constraint(format!("profile {} already exists", profile.id))
            } else {
                DatabaseError::Database(message)
            }
        })
    }

    pub async fn find_by_id(&self, user_id: &str) -> DatabaseResult<Option<ProfileRecord>> {
        profiles::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn find_by_billing_customer(
        &self,
        customer_id: &str,
    ) -> DatabaseResult<Option<ProfileRecord>> {
        profiles::Entity::find()
            .filter(profiles::Column::BillingCustomerId.eq(customer_id))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn update_tier(&self, user_id: &str, tier: Tier) -> DatabaseResult<ProfileRecord> {
        let active_model = profiles::ActiveModel {
            id: Set(user_id.to_string()),
            tier: Set(tier.as_str().to_string()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model.update(&self.db).await.map_err(map_update_error)
    }

    pub async fn set_billing_customer(
        &self,
        user_id: &str,
        customer_id: &str,
    ) -> DatabaseResult<ProfileRecord> {
        let active_model = profiles::ActiveModel {
            id: Set(user_id.to_string()),
            billing_customer_id: Set(Some(customer_id.to_string())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model.update(&self.db).await.map_err(map_update_error)
    }

    /// Zero the daily counter and stamp `today`, unless another caller already did.
    ///
    /// With `reset_monthly` the monthly counter is zeroed in the same statement.
    /// Returns whether this call performed the reset.
    pub async fn reset_counters(
        &self,
        user_id: &str,
        today: NaiveDate,
        reset_monthly: bool,
    ) -> DatabaseResult<bool> {
        let mut update = profiles::Entity::update_many()
            .col_expr(profiles::Column::DailyUsage, Expr::value(0))
            .col_expr(profiles::Column::LastResetDate, Expr::value(today));

        if reset_monthly {
            update = update.col_expr(profiles::Column::MonthlyUsage, Expr::value(0));
        }

        let result = update
            .filter(profiles::Column::Id.eq(user_id))
            .filter(profiles::Column::LastResetDate.ne(today))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Atomically add one call to both counters
    pub async fn increment_usage(&self, user_id: &str) -> DatabaseResult<()> {
        let result = profiles::Entity::update_many()
            .col_expr(
                profiles::Column::DailyUsage,
                Expr::col(profiles::Column::DailyUsage).add(1),
            )
            .col_expr(
                profiles::Column::MonthlyUsage,
                Expr::col(profiles::Column::MonthlyUsage).add(1),
            )
            .col_expr(profiles::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(profiles::Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }
}

fn map_update_error(err: sea_orm::DbErr) -> DatabaseError {
    match err {
        sea_orm::DbErr::RecordNotUpdated => DatabaseError::NotFound,
        other => DatabaseError::Database(other.to_string()),
    }
}
