use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use decision_orchestrator::{
    init_tracing, load_cycles, CycleOrchestrator, OfflineStrategist, OrchestratorConfig,
    RecordedAgents, RecordedHistory,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(cycles_path) = args.get(1).filter(|a| !a.starts_with("--")).map(PathBuf::from) else {
        eprintln!("Usage:");
        eprintln!("  decision-replay <cycles.json>                        Replay recorded cycles");
        eprintln!("  decision-replay <cycles.json> --history <file.json>  Use recorded agent history for weights");
        std::process::exit(2);
    };
    let history = match args.iter().position(|a| a == "--history").and_then(|i| args.get(i + 1)) {
        Some(path) => RecordedHistory::load(&PathBuf::from(path))?,
        None => RecordedHistory::default(),
    };

    let config = OrchestratorConfig::from_env()?;
    let cycles = load_cycles(&cycles_path)?;
    tracing::info!("Replaying {} recorded cycles from {}", cycles.len(), cycles_path.display());

    let orchestrator = CycleOrchestrator::new(
        config,
        Arc::new(RecordedAgents::from_cycles(&cycles)),
        Arc::new(history),
        Arc::new(OfflineStrategist),
    )?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut actionable = 0usize;
    for cycle in &cycles {
        let decision = orchestrator.run_cycle(cycle.to_request()).await;
        if decision.is_actionable() {
            actionable += 1;
        }
        let line = serde_json::to_string(&decision)
            .with_context(|| format!("failed to serialize decision for {}", decision.symbol))?;
        writeln!(out, "{line}").context("failed to write decision")?;
    }

    tracing::info!("Replay complete: {} decisions, {} actionable", cycles.len(), actionable);
    Ok(())
}
