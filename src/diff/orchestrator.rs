use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

use crate::diff::analyzer::SharedReportAnalyzer;
use crate::diff::artifact::ArtifactNamer;
use crate::diff::fetch::DockerfileFetcher;
use crate::diff::{FetchError, ImageSlot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDockerfile {
    pub name: String,
    pub dockerfile: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub image1: ImageDockerfile,
    pub image2: ImageDockerfile,
}

#[derive(Debug, Error)]
#[error("failed to fetch dockerfile for {} ({image}): {source}", slot.as_str())]
pub struct SlotFailure {
    pub slot: ImageSlot,
    pub image: String,
    #[source]
    pub source: FetchError,
}

/// `Fetch` lists every failed slot in request order; it is never empty.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("{}", join_failures(failures))]
    Fetch { failures: Vec<SlotFailure> },
    #[error("fetch task did not complete: {0}")]
    Task(String),
}

fn join_failures(failures: &[SlotFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

struct FetchOutcome {
    slot: ImageSlot,
    image: String,
    result: Result<String, FetchError>,
}

/// Fetches two dockerfiles in parallel and pairs them with the request's
/// slots. Dropping the `diff` future aborts both fetches, which kills any
/// running analyzer and removes its report.
#[derive(Clone)]
pub struct DiffService {
    fetcher: DockerfileFetcher,
}

impl DiffService {
    pub fn new(fetcher: DockerfileFetcher) -> Self {
        Self { fetcher }
    }

    pub fn with_analyzer(analyzer: SharedReportAnalyzer, namer: ArtifactNamer) -> Self {
        Self::new(DockerfileFetcher::new(analyzer, namer))
    }

    pub async fn diff(&self, image1: &str, image2: &str) -> Result<DiffResult, DiffError> {
        let mut tasks = JoinSet::new();
        for (slot, image) in [(ImageSlot::Image1, image1), (ImageSlot::Image2, image2)] {
            let fetcher = self.fetcher.clone();
            let image = image.to_string();
            let span = info_span!("fetch", slot = slot.as_str(), image = %image);
            tasks.spawn(
                async move {
                    let result = fetcher.fetch(image.as_str()).await;
                    FetchOutcome {
                        slot,
                        image,
                        result,
                    }
                }
                .instrument(span),
            );
        }

        let mut outcomes = BTreeMap::new();
        let mut task_failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    info!(
                        slot = outcome.slot.as_str(),
                        ok = outcome.result.is_ok(),
                        "fetch finished"
                    );
                    outcomes.insert(outcome.slot, outcome);
                }
                Err(join_error) => {
                    error!(error = %join_error, "fetch task aborted");
                    task_failure.get_or_insert_with(|| join_error.to_string());
                }
            }
        }
        if let Some(message) = task_failure {
            return Err(DiffError::Task(message));
        }

        let mut assembled = Vec::with_capacity(ImageSlot::REQUEST_ORDER.len());
        let mut failures = Vec::new();
        for slot in ImageSlot::REQUEST_ORDER {
            let Some(FetchOutcome { image, result, .. }) = outcomes.remove(&slot) else {
                return Err(DiffError::Task(format!("no result for {}", slot.as_str())));
            };
            match result {
                Ok(dockerfile) => assembled.push(ImageDockerfile {
                    name: image,
                    dockerfile,
                }),
                Err(source) => {
                    warn!(slot = slot.as_str(), image = %image, error = %source, "fetch failed");
                    failures.push(SlotFailure {
                        slot,
                        image,
                        source,
                    });
                }
            }
        }
        if !failures.is_empty() {
            return Err(DiffError::Fetch { failures });
        }

        let mut assembled = assembled.into_iter();
        match (assembled.next(), assembled.next()) {
            (Some(image1), Some(image2)) => Ok(DiffResult { image1, image2 }),
            _ => Err(DiffError::Task(String::from("incomplete diff result"))),
        }
    }
}
