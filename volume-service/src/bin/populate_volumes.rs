use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::env;
use time::OffsetDateTime;
use volume_client::domain::ReadingKind;
use volume_service::{backfill, config::AppConfig, observability, store::PgReadingStore};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    let seed: u64 = match args.get(1) {
        Some(raw) => match raw.parse() {
            Ok(seed) => seed,
            Err(_) => bail!("usage: populate_volumes [seed]"),
        },
        None => rand::random(),
    };

    // Same config file as the server; `populate.enabled` only gates the HTTP route.
    let cfg = AppConfig::load()?;
    let offset = cfg.server.utc_offset()?;
    let store = PgReadingStore::connect(cfg.database_url()?, &cfg.database, offset).await?;

    let today = OffsetDateTime::now_utc().to_offset(offset);
    let readings = backfill::synthetic_readings(&mut StdRng::seed_from_u64(seed), today, &cfg.populate);
    let attempted = readings.len();

    let inserted = backfill::populate(&store, ReadingKind::Volume, readings, cfg.populate.concurrency).await;

    tracing::info!(seed, inserted, attempted, "synthetic volumes written");
    Ok(())
}
