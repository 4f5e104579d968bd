//! Bulk report reply polling
//!
//! The registry accepts a bulk report immediately and processes it
//! asynchronously. The reply endpoint answers 404 until the report has been
//! processed, then 200 with feedback, or 400 when the report was rejected.
//!
//! [`ReplyPoller`] is the bounded retry state machine: it is fed one reply
//! at a time and says whether to wait and ask again or stop. The HTTP
//! driving loop lives in [`crate::services::registry_client`], so the wait
//! can be swapped without touching the decision logic.

use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::{SubmissionError, SubmissionResult};

/// Retry bounds for the reply loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

/// Registry feedback codes that identify the reported object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCode {
    /// 100: new object created
    Created,
    /// 101: object already existed and was reported
    Existing,
    /// 121: object name prefix changed
    Renamed,
}

impl FeedbackCode {
    /// Codes in the order they are checked within one feedback entry
    const PRIORITY: [FeedbackCode; 3] = [Self::Created, Self::Existing, Self::Renamed];

    pub fn code(self) -> &'static str {
        match self {
            Self::Created => "100",
            Self::Existing => "101",
            Self::Renamed => "121",
        }
    }

    fn object_name(self, body: &Value) -> Option<String> {
        let field = |name: &str| body.get(name).and_then(Value::as_str);
        match self {
            Self::Created => field("objname").map(|objname| format!("AT{}", objname)),
            Self::Existing => {
                let prefix = field("prefix")?;
                let objname = field("objname")?;
                Some(format!("{}{}", prefix, objname))
            }
            Self::Renamed => field("new_object_name").map(str::to_string),
        }
    }
}

/// Confirmed result of a processed report
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryReply {
    pub code: FeedbackCode,
    pub object_name: String,
    /// Full feedback section as returned by the registry
    pub feedback: Value,
}

impl RegistryReply {
    pub fn message(&self) -> String {
        match self.code {
            FeedbackCode::Created => format!("New transient {} was created", self.object_name),
            FeedbackCode::Existing => {
                format!("Existing transient {} was reported", self.object_name)
            }
            FeedbackCode::Renamed => format!("Transient name changed to {}", self.object_name),
        }
    }
}

/// Flatten one report section into feedback entries
///
/// Sections are normally lists of single-code objects; a bare object is
/// split into one entry per key.
fn section_entries(section: &Value) -> Vec<Value> {
    match section {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let mut entry = serde_json::Map::new();
                entry.insert(k.clone(), v.clone());
                Value::Object(entry)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Collect feedback entries from `at_report` and `classification_report`
fn feedback_entries(feedback: &Value) -> Vec<Value> {
    let mut entries = Vec::new();
    if let Some(at_report) = feedback.get("at_report") {
        entries.extend(section_entries(at_report));
    }
    if let Some(messages) = feedback
        .get("classification_report")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("classification_messages"))
    {
        entries.extend(section_entries(messages));
    }
    entries
}

/// Find the object name in a feedback section
///
/// Entries are scanned in order and the first one carrying 100, 101 or 121
/// (checked in that order) decides the result.
pub fn parse_feedback(feedback: &Value) -> SubmissionResult<RegistryReply> {
    for entry in feedback_entries(feedback) {
        for code in FeedbackCode::PRIORITY {
            let Some(body) = entry.get(code.code()) else {
                continue;
            };
            return match code.object_name(body) {
                Some(object_name) => Ok(RegistryReply {
                    code,
                    object_name,
                    feedback: feedback.clone(),
                }),
                None => Err(SubmissionError::RegistryRejection {
                    message: format!("Feedback code {} did not include an object name", code.code()),
                    feedback: feedback.clone(),
                }),
            };
        }
    }

    Err(SubmissionError::RegistryRejection {
        message: "No recognized feedback in the registry response".to_string(),
        feedback: feedback.clone(),
    })
}

/// Extract `data.feedback` from a reply body
pub fn reply_feedback(body: &Value) -> Value {
    body.get("data")
        .and_then(|d| d.get("feedback"))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Where the poller stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Confirmed,
    Rejected,
    TimedOut,
    Failed,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Polling => "POLLING",
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
            Self::TimedOut => "TIMED_OUT",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// What to do after observing one reply
#[derive(Debug)]
pub enum PollDecision {
    /// Not processed yet; wait this long and ask again
    Retry(Duration),
    Confirmed(RegistryReply),
    Failed(SubmissionError),
}

/// Bounded retry state machine for one report id
#[derive(Debug)]
pub struct ReplyPoller {
    report_id: i64,
    policy: PollPolicy,
    attempts: u32,
    state: PollState,
}

impl ReplyPoller {
    pub fn new(report_id: i64, policy: PollPolicy) -> Self {
        Self {
            report_id,
            policy,
            attempts: 0,
            state: PollState::Polling,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Feed one reply (HTTP status and parsed body, if any)
    ///
    /// Must not be called again once the state has left `Polling`.
    pub fn observe(&mut self, status: u16, body: Option<&Value>) -> PollDecision {
        debug_assert_eq!(self.state, PollState::Polling);
        self.attempts += 1;

        match status {
            404 if self.attempts < self.policy.max_attempts => {
                PollDecision::Retry(self.policy.interval)
            }
            404 => {
                self.state = PollState::TimedOut;
                PollDecision::Failed(SubmissionError::SubmissionTimeout {
                    report_id: self.report_id,
                    attempts: self.attempts,
                })
            }
            400 => {
                self.state = PollState::Rejected;
                let feedback = body.map(reply_feedback).unwrap_or(Value::Null);
                PollDecision::Failed(SubmissionError::RegistryRejection {
                    message: format!(
                        "Report {} failed with feedback: {}",
                        self.report_id, feedback
                    ),
                    feedback,
                })
            }
            200 => {
                let feedback = body.map(reply_feedback).unwrap_or(Value::Null);
                match parse_feedback(&feedback) {
                    Ok(reply) => {
                        self.state = PollState::Confirmed;
                        PollDecision::Confirmed(reply)
                    }
                    Err(e) => {
                        self.state = PollState::Rejected;
                        PollDecision::Failed(e)
                    }
                }
            }
            other => {
                self.state = PollState::Failed;
                PollDecision::Failed(SubmissionError::Transport(format!(
                    "Reply for report {} failed with status code {}",
                    self.report_id, other
                )))
            }
        }
    }
}
