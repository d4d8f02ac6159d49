use super::ArtifactStore;
use crate::error::PublishError;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Url;
use std::path::{Component, Path, PathBuf};
use tokio::process::Command;

const BOT_NAME: &str = "github-actions[bot]";
const BOT_EMAIL: &str = "github-actions[bot]@users.noreply.github.com";
const RAW_HOST: &str = "https://raw.githubusercontent.com/";

/// Commits and pushes each artifact to the current branch, served from
/// raw.githubusercontent.com. `workdir` is the checkout root; artifact paths
/// must resolve inside it.
pub struct GitArtifactStore {
    repository: String,
    git_ref: String,
    workdir: PathBuf,
}

impl GitArtifactStore {
    pub fn new(
        repository: impl Into<String>,
        git_ref: impl Into<String>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository: repository.into(),
            git_ref: git_ref.into(),
            workdir: workdir.into(),
        }
    }

    // Path of an artifact relative to the checkout root
    fn relative<'p>(&self, artifact: &'p Path) -> Result<&'p Path, PublishError> {
        let outside = || PublishError::OutsideRepository(artifact.display().to_string());
        let relative = if artifact.is_absolute() {
            artifact.strip_prefix(&self.workdir).map_err(|_| outside())?
        } else {
            artifact
        };
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(outside());
        }
        Ok(relative)
    }
}

#[async_trait]
impl ArtifactStore for GitArtifactStore {
    async fn persist(&self, path: &Path, message: &str) -> Result<(), PublishError> {
        let file = path.to_string_lossy();
        git(&["config", "user.name", BOT_NAME]).await?;
        git(&["config", "user.email", BOT_EMAIL]).await?;
        git(&["add", &file]).await?;
        git(&["commit", "-m", message]).await?;
        git(&["push"]).await?;
        info!("Pushed {} ({})", file, message);
        Ok(())
    }

    fn public_url(&self, artifact: &Path) -> Result<String, PublishError> {
        Ok(raw_url(&self.repository, &self.git_ref, self.relative(artifact)?))
    }
}

async fn git(args: &[&str]) -> Result<(), PublishError> {
    debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .output()
        .await
        .map_err(|e| PublishError::Git {
            args: args.join(" "),
            detail: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(PublishError::Git {
            args: args.join(" "),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// `https://raw.githubusercontent.com/{repo}/{ref}/{path}` with each segment percent-encoded.
/// `artifact` is relative to the repository root.
pub fn raw_url(repository: &str, git_ref: &str, artifact: &Path) -> String {
    let segments: Vec<String> = repository
        .split('/')
        .chain(std::iter::once(git_ref))
        .map(str::to_string)
        .chain(artifact.components().filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        }))
        .collect();

    let Ok(mut url) = Url::parse(RAW_HOST) else {
        return format!("{}{}", RAW_HOST, segments.join("/"));
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(&segments);
    }
    url.to_string()
}

/// Leaves artifacts on disk; used when git publishing is switched off.
pub struct LocalArtifactStore;

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn persist(&self, path: &Path, message: &str) -> Result<(), PublishError> {
        info!("Kept {} locally ({})", path.display(), message);
        Ok(())
    }

    fn public_url(&self, artifact: &Path) -> Result<String, PublishError> {
        Ok(artifact.display().to_string())
    }
}
