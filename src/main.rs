mod config;
mod error;
mod guard;
mod models;
mod pipeline;
mod publish;
mod scrape;
mod tasks;
mod voting;

#[cfg(test)]
mod test_utils;

use config::Config;
use error::{PipelineError, PublishError};
use guard::FileMarker;
use log::{error, info};
use pipeline::{Pipeline, RunOutcome};
use publish::{
    Announcer, ArtifactStore, GitArtifactStore, IftttAnnouncer, LocalArtifactStore, PngChartRenderer,
    SkippedAnnouncer, load_font,
};
use scrape::{HttpPageSource, PageScraper};
use std::process::ExitCode;
use std::sync::Arc;
use tasks::clock::SystemClock;

async fn run() -> Result<RunOutcome, PipelineError> {
    let config = Config::from_env()?;
    info!(
        "Starting run: final_mode={} run_label={:?} top_n={}",
        config.final_mode, config.run_label, config.top_n
    );

    let clock = Arc::new(SystemClock::new(config.offset()));
    let source = PageScraper::new(
        Box::new(HttpPageSource::new(config.vote_url.as_str())?),
        clock.clone(),
        config.group_markers.clone(),
    );

    let renderer = PngChartRenderer::new(Some(load_font(&config.chart_font)?));

    let store: Box<dyn ArtifactStore> = if config.git_publish {
        let workdir = std::env::current_dir().map_err(|e| PublishError::io(".", e))?;
        Box::new(GitArtifactStore::new(
            config.github_repository.clone().unwrap_or_default(),
            config.github_ref.clone(),
            workdir,
        ))
    } else {
        Box::new(LocalArtifactStore)
    };

    let announcer: Box<dyn Announcer> = match &config.ifttt {
        Some(ifttt) => Box::new(IftttAnnouncer::new(&ifttt.event, &ifttt.key)?),
        None => Box::new(SkippedAnnouncer),
    };

    let guard = FileMarker::new(&config.sentinel_path);

    Pipeline {
        config: &config,
        clock: clock.as_ref(),
        source: &source,
        renderer: &renderer,
        store: store.as_ref(),
        announcer: announcer.as_ref(),
        guard: &guard,
    }
    .run()
    .await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(RunOutcome::Published { artifact, finalized }) => {
            info!(
                "Run complete: published {}{}",
                artifact.path.display(),
                if finalized { " (final)" } else { "" }
            );
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::AlreadyFinalized) => {
            info!("Run complete: skipped: already finalized");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::PastCutoff) => {
            info!("Run complete: skipped: past cutoff");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
