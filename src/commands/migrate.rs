use crate::Config;
use crate::database::migration::Migrator;
use crate::database::{DatabaseManager, DatabaseManagerImpl};
use clap::Subcommand;
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Roll back the most recent migrations
    Down {
        #[arg(short, long, default_value = "1")]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
}

pub async fn handle_migrate_command(
    action: MigrateAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let database = DatabaseManagerImpl::new_from_config(&config.database).await?;
    let connection = database.connection();

    match action {
        MigrateAction::Up => {
            info!(url = %config.database.url, "Applying pending migrations");
            database.migrate().await?;
        }
        MigrateAction::Down { steps } => {
            info!(steps, "Rolling back migrations");
            Migrator::down(connection, Some(steps)).await?;
            info!("Rollback completed");
        }
        MigrateAction::Status => {
            Migrator::status(connection).await?;
        }
    }

    Ok(())
}
