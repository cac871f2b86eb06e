//! Progress events and response bodies of the answer pipeline.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Start,
    FindingNode,
    NodeFound,
    FetchingContext,
    ContextReady,
    GeneratingAnswer,
    Complete,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "START",
            Stage::FindingNode => "FINDING_NODE",
            Stage::NodeFound => "NODE_FOUND",
            Stage::FetchingContext => "FETCHING_CONTEXT",
            Stage::ContextReady => "CONTEXT_READY",
            Stage::GeneratingAnswer => "GENERATING_ANSWER",
            Stage::Complete => "COMPLETE",
            Stage::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Error)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame of the answer stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Log {
        message: String,
    },
    MatchedNode {
        node_name: String,
        similarity_score: f32,
    },
    Context {
        context: String,
    },
    Answer {
        answer: String,
    },
    Complete,
    Error {
        message: String,
        traceback: String,
    },
}

impl StreamEvent {
    pub fn log(message: impl Into<String>) -> Self {
        StreamEvent::Log {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Log { .. } => "log",
            StreamEvent::MatchedNode { .. } => "matched_node",
            StreamEvent::Context { .. } => "context",
            StreamEvent::Answer { .. } => "answer",
            StreamEvent::Complete => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// `data: <json>\n\n`
    pub fn to_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":"unserializable event: {}","traceback":""}}"#,
                e
            )
        });
        format!("data: {json}\n\n")
    }
}

/// Successful non-streaming result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeData {
    pub answer: String,
    pub matched_node: String,
    pub similarity_score: f32,
    pub context: String,
}

/// Non-streaming response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzeResponse {
    Success { data: AnalyzeData },
    Error { error: String, traceback: String },
}

impl AnalyzeResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalyzeResponse::Success { .. })
    }
}

/// Error message plus diagnostic trace for a failure in `stage`.
///
/// The trace lists the stage followed by the error's `source()` chain.
pub fn failure_report(stage: Stage, err: &(dyn StdError + 'static)) -> (String, String) {
    let mut trace = format!("stage: {stage}\nerror: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push_str(&format!("\ncaused by: {cause}"));
        source = cause.source();
    }
    (err.to_string(), trace)
}
