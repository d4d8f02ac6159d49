use crate::config::Config;
use crate::error::PipelineError;
use crate::guard::PublishGuard;
use crate::publish::{
    Announcement, Announcer, ArtifactStore, ChartRenderer, PublishedArtifact, artifact_file_name,
};
use crate::scrape::SnapshotSource;
use crate::tasks::AnchorScheduler;
use crate::tasks::anchor::{resolve_anchor, time_label};
use crate::tasks::clock::Clock;
use crate::voting::rank_snapshot;
use log::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Published {
        artifact: PublishedArtifact,
        finalized: bool,
    },
    AlreadyFinalized,
    PastCutoff,
}

/// One run: guard, capture, rank, render, persist, announce, mark.
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub clock: &'a dyn Clock,
    pub source: &'a dyn SnapshotSource,
    pub renderer: &'a dyn ChartRenderer,
    pub store: &'a dyn ArtifactStore,
    pub announcer: &'a dyn Announcer,
    pub guard: &'a dyn PublishGuard,
}

impl<'a> Pipeline<'a> {
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        let config = self.config;
        let started = self.clock.now();
        let spec = resolve_anchor(
            started,
            config.final_mode,
            config.final_anchor,
            config.run_label,
            config.lead_seconds,
        );

        // Idempotence boundary: nothing else happens once the marker exists
        if spec.is_final() && self.guard.already_finalized()? {
            info!("FINAL_MODE: final announcement already sent; skipping run");
            return Ok(RunOutcome::AlreadyFinalized);
        }

        let scheduler = AnchorScheduler::new(self.clock, config.poll_interval, config.max_wait);
        if scheduler.past_cutoff(&spec, config.stop_at) {
            info!(
                "STOP: {} is past the cutoff {}; skipping run",
                started.to_rfc3339(),
                config.stop_at.to_rfc3339()
            );
            return Ok(RunOutcome::PastCutoff);
        }

        info!(
            "Run anchored at {} ({})",
            spec.target_instant.to_rfc3339(),
            spec.file_tag()
        );
        let snapshot = scheduler.capture(&spec, self.source).await?;
        info!(
            "Snapshot from {}: {}",
            snapshot.captured_at().to_rfc3339(),
            snapshot
                .groups()
                .iter()
                .map(|g| format!("{}={}", g.marker, g.records.len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let captions: Vec<String> = config
            .group_captions
            .iter()
            .map(|caption| format!("{}　上位{}位", caption, config.top_n))
            .collect();
        let ranked = rank_snapshot(&snapshot, &captions, config.top_n);

        let file_name = artifact_file_name(config.top_n, &spec);
        let path = config.public_dir.join(&file_name);
        let url = self.store.public_url(&path)?;
        self.renderer.render(&ranked, &path)?;
        self.store.persist(&path, &format!("Add {}", file_name)).await?;
        let artifact = PublishedArtifact { path, url };
        info!("Chart published at {}", artifact.url);

        let announcement = Announcement {
            body: config.template.compose(&spec, &time_label(&spec, started)),
            image_url: artifact.url.clone(),
        };

        scheduler.hold_until_anchor(&spec).await;

        let sent = self.announcer.announce(&announcement).await;
        println!("IFTTT_TEXT::{}", announcement.body);
        println!("IFTTT_IMG::{}", announcement.image_url);
        if let Err(e) = sent {
            // The chart stays published; the marker stays unset so a retry may announce
            error!("Announcement failed: {}", e);
            return Err(e.into());
        }

        if spec.is_final() {
            self.guard.mark_finalized(self.clock.now())?;
            self.store.persist(&config.sentinel_path, "Mark FINAL_DONE").await?;
        }

        Ok(RunOutcome::Published {
            artifact,
            finalized: spec.is_final(),
        })
    }
}
