//! Loads ingredients from a JSON file: `[{"name": "...", "measurement_unit": "..."}]`.

use foodgram::{actions::ingredients::import_ingredients, config::Config, form::{into_field_errors, IngredientForm}, MIGRATOR};
use sqlx::postgres::PgPoolOptions;
use validator::Validate;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: import-ingredients <file.json>")?;
    let config = Config::load()?;

    let contents = tokio::fs::read_to_string(&path).await?;
    let entries: Vec<IngredientForm> = serde_json::from_str(&contents)?;
    for (index, entry) in entries.iter().enumerate() {
        if let Err(e) = entry.validate().map_err(into_field_errors) {
            log::error!("Entry {index} is invalid: {}", e.body());
            return Err(e.into());
        }
    }

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    if config.run_migrations {
        MIGRATOR.run(&pool).await?;
    }

    let inserted = import_ingredients(&pool, &entries).await?;
    log::info!("Imported {inserted} of {} ingredients from {path}", entries.len());

    Ok(())
}
