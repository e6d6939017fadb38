pub mod analyzer;
pub mod artifact;
pub mod fetch;
pub mod orchestrator;
pub mod report;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    Image1,
    Image2,
}

impl ImageSlot {
    pub const REQUEST_ORDER: [Self; 2] = [Self::Image1, Self::Image2];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image1 => "image1",
            Self::Image2 => "image2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchFailureKind {
    AnalyzerInvocation,
    ReportRead,
    ReportParse,
}

impl FetchFailureKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::AnalyzerInvocation => "analyzer_invocation_failed",
            Self::ReportRead => "report_read_failed",
            Self::ReportParse => "report_parse_failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to launch analyzer ({program}): {source}")]
    AnalyzerLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("analyzer ({program}) exited with {status}")]
    AnalyzerExit { program: String, status: String },
    #[error("analyzer ({program}) did not finish within {timeout:?}")]
    AnalyzerTimeout { program: String, timeout: Duration },
    #[error("failed to read analyzer report {}: {source}", path.display())]
    ReportRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("analyzer report {} does not match the expected schema: {source}", path.display())]
    ReportParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn kind(&self) -> FetchFailureKind {
        match self {
            Self::AnalyzerLaunch { .. }
            | Self::AnalyzerExit { .. }
            | Self::AnalyzerTimeout { .. } => FetchFailureKind::AnalyzerInvocation,
            Self::ReportRead { .. } => FetchFailureKind::ReportRead,
            Self::ReportParse { .. } => FetchFailureKind::ReportParse,
        }
    }
}
