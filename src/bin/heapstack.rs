//! Heap, lifetime and cleanup demonstration
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use heapstack::config::{CoordinatorConfig, DispatchMode, DriverConfig, Scenario};
use heapstack::coordinator::CleanupCoordinator;
use heapstack::driver::Driver;
use heapstack::heap::CountingAllocator;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator::system();

#[derive(Parser, Debug)]
#[command(author, version, about = "Tracked resources, scoped release and background cleanup")]
struct Args {
    /// Resources created by the batch scenario
    #[arg(long, default_value_t = 100_000)]
    batch_size: usize,

    /// Longest wait for pending cleanups after each scenario, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pause_ms: u64,

    /// Where dropped resources are cleaned up: inline or background
    #[arg(long, default_value = "background")]
    dispatch: DispatchMode,

    /// Scenarios to run; all of them when omitted
    #[arg(long = "scenario", value_delimiter = ',')]
    scenarios: Vec<Scenario>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true),
        )
        .with(filter)
        .init();

    if let Some(line) = failure_line(&run(args)) {
        println!("{}", line);
    }
}

/// The line printed for a failed run. The process still exits with status 0.
fn failure_line(outcome: &Result<()>) -> Option<String> {
    outcome
        .as_ref()
        .err()
        .map(|e| format!("An error occurred: {:#}", e))
}

fn run(args: Args) -> Result<()> {
    let coordinator = CleanupCoordinator::with_config(CoordinatorConfig {
        name: "demo".to_string(),
        dispatch: args.dispatch,
        ..CoordinatorConfig::default()
    })
    .context("failed to start cleanup coordinator")?;

    let scenarios = if args.scenarios.is_empty() {
        Scenario::ALL.to_vec()
    } else {
        args.scenarios
    };
    let config = DriverConfig {
        batch_size: args.batch_size,
        pause: Duration::from_millis(args.pause_ms),
        scenarios,
    };

    let report = Driver::new(&coordinator, config).run()?;
    info!(?report, stats = ?coordinator.stats(), "demonstration finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapstack::CleanupError;

    #[test]
    fn successful_run_prints_nothing() {
        assert_eq!(failure_line(&Ok(())), None);
    }

    #[test]
    fn interrupted_run_prints_the_error_chain() {
        let outcome: Result<()> = Err(CleanupError::Interrupted).context("batch scenario");
        assert_eq!(
            failure_line(&outcome).as_deref(),
            Some("An error occurred: batch scenario: Wait for pending cleanups was interrupted")
        );
    }

    #[test]
    fn args_default_to_the_full_demonstration() {
        let args = Args::try_parse_from(["heapstack"]).unwrap();
        assert_eq!(args.batch_size, 100_000);
        assert_eq!(args.pause_ms, 1000);
        assert_eq!(args.dispatch, DispatchMode::Background);
        assert!(args.scenarios.is_empty());
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn scenarios_are_comma_separated() {
        let args =
            Args::try_parse_from(["heapstack", "--scenario", "scoped,explicit", "--dispatch", "inline"])
                .unwrap();
        assert_eq!(args.scenarios, vec![Scenario::Scoped, Scenario::Explicit]);
        assert_eq!(args.dispatch, DispatchMode::Inline);
    }
}
