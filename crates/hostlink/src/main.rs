use std::process::ExitCode;
use std::sync::Arc;

use hostlink::access::{PromptOutcome, StaticPrompt};
use hostlink::dispatch::ActionTable;
use hostlink::{HealthReporter, StructuredHealthReporter, SystemConfigLoader, bootstrap_with, runner};

fn main() -> ExitCode {
    let reporter = Arc::new(StructuredHealthReporter::new());
    let mut gateway = match bootstrap_with(
        &SystemConfigLoader,
        reporter.clone(),
        ActionTable::with_builtins(),
        Box::new(StaticPrompt(PromptOutcome::Deny)),
    ) {
        Ok(gateway) => gateway,
        Err(error) => {
            eprintln!("hostlinkd: {error}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = match runner::shutdown_flag() {
        Ok(flag) => flag,
        Err(error) => {
            eprintln!("hostlinkd: {error}");
            gateway.shutdown();
            return ExitCode::FAILURE;
        }
    };

    let tick = gateway.config().tick_interval();
    runner::run_until(&mut gateway, tick, &shutdown);
    reporter.gateway_stopped(gateway.local_addr());
    ExitCode::SUCCESS
}
