use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run::{Analysis, InfraEvent};

/// Severity level for a reviewable item, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Returns a numeric rank where lower values indicate higher severity.
    /// Critical = 0, High = 1, Medium = 2, Low = 3, Info = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

// Unrecognized labels rank as info rather than failing the whole queue.
impl From<String> for Severity {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision an operator can take on a pending item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Approved,
    Rejected,
    Deferred,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Deferred => "deferred",
        }
    }

    pub fn status(&self) -> ReviewStatus {
        match self {
            Self::Approved => ReviewStatus::Approved,
            Self::Rejected => ReviewStatus::Rejected,
            Self::Deferred => ReviewStatus::Deferred,
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approved" | "approve" => Ok(Self::Approved),
            "rejected" | "reject" => Ok(Self::Rejected),
            "deferred" | "defer" => Ok(Self::Deferred),
            other => Err(format!(
                "resolution must be one of approved | rejected | deferred, got '{}'",
                other
            )),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status. Only `Pending` accepts a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Deferred,
    /// Remediated by the backend after approval.
    Remediated,
}

impl ReviewStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Deferred => "deferred",
            Self::Remediated => "remediated",
        }
    }

    /// Normalize the status vocabularies different backends use.
    /// `resolved` needs the accompanying resolution field to be meaningful.
    pub fn from_wire(status: Option<&str>, resolution: Option<&str>) -> Self {
        let status = status.map(|s| s.trim().to_uppercase()).unwrap_or_default();
        match status.as_str() {
            "APPROVED" | "APPROVED_HITL" => Self::Approved,
            "REJECTED" | "REJECTED_HITL" => Self::Rejected,
            "DEFERRED" => Self::Deferred,
            "REMEDIATED" => Self::Remediated,
            "RESOLVED" => resolution
                .and_then(|r| r.parse::<Resolution>().ok())
                .map(|r| r.status())
                .unwrap_or(Self::Approved),
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incident or escalation awaiting a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawReviewItem")]
pub struct ReviewItem {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub root_cause: String,
    pub reasoning_steps: Vec<String>,
    pub recommended_action: String,
    pub confidence: f64,
    pub status: ReviewStatus,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub service: Option<String>,
    pub resource: Option<String>,
}

impl ReviewItem {
    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending
    }
}

/// Every field shape seen on the wire for a review item; folded into
/// `ReviewItem` by `From`.
#[derive(Deserialize)]
struct RawReviewItem {
    #[serde(alias = "escalation_id", alias = "incident_id")]
    id: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "summary")]
    message: Option<String>,
    #[serde(default)]
    root_cause: Option<String>,
    #[serde(default, alias = "reasoning_chain")]
    reasoning_steps: Option<Vec<String>>,
    #[serde(default, alias = "proposed_action")]
    recommended_action: Option<String>,
    #[serde(default, alias = "confidence_score")]
    confidence: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    resolved_by: Option<String>,
    #[serde(default, alias = "approved_at", alias = "rejected_at")]
    resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    resource: Option<String>,
    #[serde(default)]
    event: Option<InfraEvent>,
    #[serde(default)]
    analysis: Option<Analysis>,
}

impl From<RawReviewItem> for ReviewItem {
    fn from(raw: RawReviewItem) -> Self {
        let event = raw.event.unwrap_or_default();
        let analysis = raw.analysis.unwrap_or_default();
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        let message = raw.message.or_else(|| non_empty(event.message.clone())).unwrap_or_default();
        let title = raw
            .title
            .or_else(|| non_empty(format!("{} {}", event.service, event.resource).trim().to_string()))
            .unwrap_or_else(|| message.clone());

        ReviewItem {
            id: raw.id,
            severity: Severity::from(raw.severity.unwrap_or(event.severity)),
            title,
            message,
            root_cause: raw.root_cause.unwrap_or(analysis.root_cause),
            reasoning_steps: raw.reasoning_steps.unwrap_or(analysis.reasoning_steps),
            recommended_action: raw.recommended_action.unwrap_or(analysis.recommended_action),
            confidence: raw.confidence.unwrap_or(analysis.confidence).clamp(0.0, 1.0),
            status: ReviewStatus::from_wire(raw.status.as_deref(), raw.resolution.as_deref()),
            resolved_by: raw.resolved_by,
            resolved_at: raw.resolved_at,
            created_at: raw.created_at,
            service: raw.service.or_else(|| non_empty(event.service)),
            resource: raw.resource.or_else(|| non_empty(event.resource)),
        }
    }
}
