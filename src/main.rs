use ftreduce::{FtError, HarnessConfig, RunConfig, RunController, comm, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = logging::init("info") {
        eprintln!("failed to initialize logging: {e}");
    }

    let run = match RunConfig::from_args(std::env::args().skip(1)) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let harness = HarnessConfig::from_env();
    if let Err(e) = harness.validate() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(run, harness)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(FtError::InjectedFault { round }) => {
            tracing::error!(round, "terminating on injected fault");
            // Skip runtime shutdown and destructors, like a real crash.
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("run failed: {e}");
            eprintln!("ftreduce: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(run: RunConfig, harness: HarnessConfig) -> ftreduce::Result<()> {
    let comm = comm::connect(&harness).await?;
    let ctx = comm.context();
    let host = gethostname::gethostname().to_string_lossy().into_owned();
    println!("participant {ctx} on {host}");

    let summary = RunController::new(comm.as_ref(), run, harness).run().await?;
    tracing::debug!(
        rank = ctx.rank(),
        rounds = summary.rounds,
        start_round = summary.start_round,
        "run complete"
    );
    Ok(())
}
