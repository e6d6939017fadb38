use tracing::{debug, info};

use crate::diff::analyzer::SharedReportAnalyzer;
use crate::diff::artifact::ArtifactNamer;
use crate::diff::report::{parse_report, reconstruct_dockerfile};
use crate::diff::FetchError;

/// Turns one image name into its reconstructed Dockerfile.
#[derive(Clone)]
pub struct DockerfileFetcher {
    analyzer: SharedReportAnalyzer,
    namer: ArtifactNamer,
}

impl DockerfileFetcher {
    pub fn new(analyzer: SharedReportAnalyzer, namer: ArtifactNamer) -> Self {
        Self { analyzer, namer }
    }

    pub fn namer(&self) -> &ArtifactNamer {
        &self.namer
    }

    pub async fn fetch(&self, image: &str) -> Result<String, FetchError> {
        let mut artifact = self.namer.acquire(image);
        info!(report = %artifact.path().display(), "fetching dockerfile");

        self.analyzer.analyze(image, artifact.path()).await?;

        let raw = tokio::fs::read(artifact.path())
            .await
            .map_err(|source| FetchError::ReportRead {
                path: artifact.path().to_path_buf(),
                source,
            })?;
        let report = parse_report(raw.as_slice()).map_err(|source| FetchError::ReportParse {
            path: artifact.path().to_path_buf(),
            source,
        })?;
        artifact.release().await;

        let dockerfile = reconstruct_dockerfile(&report);
        debug!(lines = dockerfile.lines().count(), dockerfile = %dockerfile, "reconstructed dockerfile");
        Ok(dockerfile)
    }
}
