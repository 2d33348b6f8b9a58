//! Metadata store schema migrations.

use sqlx::PgPool;
use tracing::info;

use filesync_core::error::{AppError, ErrorKind};

/// Apply the embedded migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    let migrator = sqlx::migrate!("../../migrations");
    info!(
        migrations = migrator.iter().count(),
        "Applying metadata store migrations"
    );

    migrator.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Persistence,
            format!("Failed to apply migrations: {e}"),
            e,
        )
    })?;

    info!("Metadata store schema is current");
    Ok(())
}
