//! List the unreported lead backlog.

use crate::config::AppConfig;
use crate::store::LeadStore;
use anyhow::Result;
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> Result<()> {
    let cfg = AppConfig::load(config_path)?;
    let store = LeadStore::open(&cfg.store.path)?;
    let leads = store.unreported()?;

    if json {
        for lead in &leads {
            println!("{}", serde_json::to_string(lead)?);
        }
        return Ok(());
    }

    if leads.is_empty() {
        println!("no unreported leads");
        return Ok(());
    }
    for lead in &leads {
        let estimated = if lead.posted_at_estimated { "~" } else { "" };
        println!(
            "#{}  {}  {}{}  {}",
            lead.id,
            if lead.user_name.is_empty() {
                "(unknown)"
            } else {
                lead.user_name.as_str()
            },
            estimated,
            lead.posted_at.format("%Y-%m-%d %H:%M"),
            lead.post_url
        );
    }
    println!("{} unreported lead(s)", leads.len());
    Ok(())
}
