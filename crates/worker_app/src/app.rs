use anyhow::{Context, Result};
use engine_logging::engine_info;
use worker_engine::{Engine, FileDataSet, LoopbackRuntime, StdioChannel};

use crate::cli::Args;

pub fn run_app(args: Args) -> Result<()> {
    engine_logging::set_worker_slot(args.slave_no);
    let destination = args.log_destination();
    engine_logging::initialize(destination.clone(), args.log_level)
        .with_context(|| format!("could not start logging to {destination:?}"))?;

    let config = args.worker_config();
    engine_info!(
        "worker {} starting for coordinator {}, session at {}",
        config.slave_no,
        config.parent_pid,
        config.session_root.display()
    );

    let data_set = FileDataSet::in_session(&config.session_root);
    let session_root = config.session_root.clone();
    let mut engine = Engine::new(config, StdioChannel::stdio(), LoopbackRuntime::new(), data_set)
        .with_context(|| format!("could not attach to session {}", session_root.display()))?;

    engine.run().context("worker stopped on a fatal error")?;
    engine_info!("worker exiting");
    Ok(())
}
