use cellcheck::core::summary::{render_summary, write_summary_json};
use cellcheck::domain::ports::CellSource;
use cellcheck::utils::{logger, validation::Validate};
use cellcheck::{BatchEngine, CheckError, CliConfig, GdsCellSource, ListCellSource};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn fail(e: &CheckError) -> ! {
    tracing::error!("❌ {} (Category: {:?})", e, e.category());
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting cellcheck {}", cli.mode());

    let config = match cli.batch_config() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if let Err(e) = config.validate() {
        fail(&e);
    }
    tracing::debug!("Batch config: {:?}", config);

    let source: Box<dyn CellSource> = if config.cells.is_empty() {
        Box::new(GdsCellSource::new(&config.input))
    } else {
        Box::new(ListCellSource::new(config.cells.clone()))
    };

    let abort = Arc::new(AtomicBool::new(false));
    let runner = config.klayout_runner(Arc::clone(&abort));
    tracing::debug!("Using tool {}", runner.executable().display());

    let engine = BatchEngine::new(config, runner).with_abort_flag(Arc::clone(&abort));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted: letting running jobs finish, skipping the rest");
            abort.store(true, Ordering::SeqCst);
        }
    });

    let result = match engine.run(source.as_ref()).await {
        Ok(result) => result,
        Err(e) => fail(&e),
    };

    let allow_errored = engine.config().allow_errored;
    println!("{}", render_summary(&result, allow_errored));

    if let Some(path) = &cli.common().summary_json {
        if let Err(e) = write_summary_json(path, &result, allow_errored) {
            tracing::error!("Summary for {} cells not saved", result.total);
            fail(&e);
        }
        println!("📁 Summary saved to: {}", path.display());
    }

    std::process::exit(result.exit_code(allow_errored));
}
