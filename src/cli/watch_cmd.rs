//! Run acquisition cycles on an interval until interrupted.

use anyhow::Result;
use std::path::Path;
use std::time::Duration;

pub async fn run(config_path: &Path, interval_secs: u64) -> Result<()> {
    anyhow::ensure!(interval_secs > 0, "interval must be at least 1 second");

    let runner = super::build_runner(config_path).await?;
    let cancel = super::cancel_on_ctrl_c();

    let cycles =
        crate::schedule::run_interval(&runner, Duration::from_secs(interval_secs), &cancel).await;
    println!("stopped after {cycles} cycle(s)");
    Ok(())
}
