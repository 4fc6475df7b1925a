//! Run a single acquisition cycle.

use crate::cycle::CycleOutcome;
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    let runner = super::build_runner(config_path).await?;
    let cancel = super::cancel_on_ctrl_c();

    match runner.run_cycle(&cancel).await {
        CycleOutcome::Completed(summary) => {
            println!("{summary}");
            Ok(())
        }
        CycleOutcome::Failed(err) => Err(err.into()),
    }
}
