use sea_orm_migration::prelude::*;

pub use sea_orm_migration::MigratorTrait;

mod m20250301_000001_create_profiles_table;
mod m20250301_000002_create_query_history_table;
mod m20250415_000001_add_billing_customer_to_profiles;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_profiles_table::Migration),
            Box::new(m20250301_000002_create_query_history_table::Migration),
            Box::new(m20250415_000001_add_billing_customer_to_profiles::Migration),
        ]
    }
}

/// Common table and column identifiers
#[derive(Iden)]
pub enum Profiles {
    Table,
    Id,
    Email,
    Tier,
    DailyUsage,
    MonthlyUsage,
    LastResetDate,
    BillingCustomerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum QueryHistory {
    Table,
    Id,
    UserId,
    Question,
    Answer,
    PageTitle,
    PageUrl,
    PageDomain,
    ContextText,
    SelectedText,
    ModelUsed,
    ResponseTimeMs,
    CreatedAt,
}
