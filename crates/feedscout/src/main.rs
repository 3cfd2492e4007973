use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use feedscout::backend::{LoggingInjector, ReplaySource};
use feedscout::cli::parse_cli;
use feedscout::pipeline::Pipeline;
use feedscout::progress::feed_spinner_style;
use feedscout::settings::resolve_settings;
use feedscout_ocr::{NoopOcrEngine, OcrEngine};
use indicatif::ProgressBar;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let (cli, sources) = parse_cli();
    let settings = match resolve_settings(&cli, &sources) {
        Ok(settings) => settings,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let source = match ReplaySource::open(&settings.replay_dir) {
        Ok(source) => source,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let engine = NoopOcrEngine;
    if let Err(err) = engine.warm_up() {
        log::error!("failed to initialize OCR engine: {err}");
        return ExitCode::FAILURE;
    }
    log::info!(
        "watching for [{}] with {} OCR",
        settings.keywords.join(", "),
        engine.name()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(feed_spinner_style());
    spinner.set_prefix("feed");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut pipeline =
        match Pipeline::new(&settings, source, LoggingInjector::new(), Arc::new(engine)) {
            Ok(pipeline) => pipeline.with_progress(spinner.clone()),
            Err(err) => {
                spinner.abandon_with_message("failed");
                log::error!("{err}");
                return ExitCode::FAILURE;
            }
        };
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    match pipeline.run(shutdown).await {
        Ok(summary) => {
            spinner.finish_with_message(format!(
                "{} after {} iterations, {} opened",
                summary.end, summary.iterations, summary.opened
            ));
            ExitCode::SUCCESS
        }
        Err(err) => {
            spinner.abandon_with_message("failed");
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
