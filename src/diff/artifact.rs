use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

const REPORT_FILE_SUFFIX: &str = "slim.report.json";

pub fn sanitize_image_name(image: &str) -> String {
    image.replace(['/', ':'], "_")
}

/// Derives report paths under one directory. A path is a function of the
/// image name and a per-invocation token, so two fetches never share a file
/// even when they target the same image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNamer {
    dir: PathBuf,
}

impl ArtifactNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    pub fn path_for(&self, image: &str, invocation: Uuid) -> PathBuf {
        self.dir.join(format!(
            "{}-{}-{REPORT_FILE_SUFFIX}",
            sanitize_image_name(image),
            invocation.simple()
        ))
    }

    pub fn acquire(&self, image: &str) -> ReportArtifact {
        ReportArtifact {
            path: self.path_for(image, Uuid::new_v4()),
            released: false,
        }
    }
}

/// A report file owned by a single fetch. The file is removed by
/// [`ReportArtifact::release`] or, failing that, when the guard drops.
#[derive(Debug)]
pub struct ReportArtifact {
    path: PathBuf,
    released: bool,
}

impl ReportArtifact {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let path = self.path.as_path();
        if !tokio::fs::try_exists(path).await.unwrap_or(true) {
            return;
        }
        debug!(path = %path.display(), "removing analyzer report");
        if let Err(error) = tokio::fs::remove_file(path).await {
            log_removal_failure(path, &error);
        }
    }
}

impl Drop for ReportArtifact {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            release_artifact(self.path.as_path());
        }
    }
}

/// Removing an absent file is a no-op; removal failures are logged only.
pub fn release_artifact(path: &Path) {
    if !path.exists() {
        return;
    }
    debug!(path = %path.display(), "removing analyzer report");
    if let Err(error) = std::fs::remove_file(path) {
        log_removal_failure(path, &error);
    }
}

fn log_removal_failure(path: &Path, error: &std::io::Error) {
    if error.kind() != std::io::ErrorKind::NotFound {
        warn!(path = %path.display(), error = %error, "failed to remove analyzer report");
    }
}
