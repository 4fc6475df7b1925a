//! Show store totals for the configured deployment.

use crate::config::AppConfig;
use crate::store::LeadStore;
use anyhow::Result;
use std::path::Path;

pub fn run(config_path: &Path) -> Result<()> {
    let cfg = AppConfig::load(config_path)?;
    let store = LeadStore::open(&cfg.store.path)?;
    let (total, unreported) = store.counts()?;

    println!("store:      {}", cfg.store.path.display());
    println!("search:     {} ({})", cfg.search.url, cfg.search.query_ref);
    println!("leads:      {total}");
    println!("unreported: {unreported}");
    Ok(())
}
