//! Labscope CLI - stream a research experiment run to the terminal
//!
//! Starts a single-agent or orchestrator experiment against the research
//! backend and mirrors its console output as it arrives.

use std::time::Duration;

use clap::Parser;
use labscope::engine::{
    EngineConfig, RunController, RunMode, RunParams, RunPhase, RunState, RunStatus, StreamKind,
};

#[derive(Parser)]
#[command(name = "labscope")]
#[command(about = "Live viewer for multi-agent research experiment runs", long_about = None)]
struct Cli {
    /// In 'single' mode: the hypothesis to verify.
    /// In 'orchestrator' mode: the high-level research task to investigate.
    task: String,

    /// Execution mode
    #[arg(long, value_enum, default_value_t = RunMode::Orchestrator)]
    mode: RunMode,

    /// GPU type to request for the sandbox (e.g. 'T4', 'A10G', 'A100', 'any')
    #[arg(long)]
    gpu: Option<String>,

    /// Maximum conceptual number of researcher agents (orchestrator mode)
    #[arg(long, default_value_t = 3)]
    num_agents: u32,

    /// Maximum orchestration rounds before the final paper (orchestrator mode)
    #[arg(long, default_value_t = 3)]
    max_rounds: u32,

    /// Maximum concurrently active agents (orchestrator mode)
    #[arg(long, default_value_t = 2)]
    max_parallel: u32,

    /// Ask the backend for canned test responses
    #[arg(long)]
    test_mode: bool,

    /// Base URL of the research backend
    #[arg(long, default_value = "http://localhost:8000")]
    base_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let controller = RunController::new(EngineConfig {
        base_url: cli.base_url,
    });

    let mut params = RunParams::new(cli.task);
    params.gpu = cli.gpu;
    params.num_agents = cli.num_agents;
    params.max_rounds = cli.max_rounds;
    params.max_parallel = cli.max_parallel;
    params.test_mode = cli.test_mode;

    let run_id = controller.start(cli.mode, params)?;
    eprintln!("run {run_id} started in {} mode", cli.mode);

    // Mirror console output until the run terminates.
    let mut printed = 0;
    loop {
        let state = controller.state();
        printed = print_new_entries(&state, printed);

        if matches!(controller.phase(), RunPhase::Terminated(_)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let state = controller.state();
    print_new_entries(&state, printed);

    if let Some(outcome) = &state.outcome {
        eprintln!(
            "run finished: exit code {}, {:.1}s",
            outcome.exit_code, outcome.duration_seconds
        );
    }

    if state.status == RunStatus::Failed {
        match &state.error {
            Some(message) => eprintln!("run failed: {message}"),
            None => eprintln!("run failed"),
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_new_entries(state: &RunState, printed: usize) -> usize {
    for entry in &state.console[printed..] {
        match entry.stream {
            StreamKind::Stdout => println!("{} {}", entry.timestamp, entry.text),
            StreamKind::Stderr => eprintln!("{} {}", entry.timestamp, entry.text),
        }
    }
    state.console.len()
}
