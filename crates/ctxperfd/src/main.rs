use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ctxperf_core::{init_tracing, EngineConfig, LogFormat, PerformanceOptimizer, ScheduledTask};
use tracing::{info, warn, Level};

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(LogFormat::from_env(), Level::INFO);

    let config = load_config(std::env::args_os().nth(1).map(PathBuf::from))?;
    let interval = config.optimizer.optimization_interval();
    let monitoring = config.optimizer.enable_monitoring;
    info!(version = ctxperf_core::VERSION, interval_ms = interval.as_millis() as u64, "ctxperfd starting");

    let optimizer = Arc::new(PerformanceOptimizer::new(config));
    if monitoring {
        optimizer.monitor().start_monitoring().await?;
    }
    let maintenance = optimizer.cache().start_maintenance().await;

    let cycles = {
        let optimizer = Arc::clone(&optimizer);
        ScheduledTask::every("optimization-cycle", interval, move || {
            let optimizer = Arc::clone(&optimizer);
            async move {
                match optimizer.optimize().await {
                    Ok(result) => info!(
                        cycle_id = %result.id,
                        succeeded = result.succeeded(),
                        improvements = result.improvements.len(),
                        "optimization cycle complete"
                    ),
                    Err(e) => warn!(error = %e, "optimization cycle skipped"),
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    cycles.stop().await;
    maintenance.stop().await;
    optimizer.monitor().stop_monitoring().await;

    let stats = optimizer.statistics().await;
    info!(cycles = stats.total_runs, "ctxperfd stopped");
    Ok(())
}
