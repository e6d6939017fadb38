use serde::Serialize;

use crate::diff::FetchFailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Provider,
    Infra,
}

impl From<FetchFailureKind> for ErrorKind {
    fn from(kind: FetchFailureKind) -> Self {
        match kind {
            FetchFailureKind::AnalyzerInvocation
            | FetchFailureKind::ReportRead
            | FetchFailureKind::ReportParse => Self::Provider,
        }
    }
}
