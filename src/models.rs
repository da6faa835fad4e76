use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RiskCategory {
    High,
    Medium,
    Low,
    /// Anything the warehouse emits outside the three known labels.
    Other(String),
}

impl RiskCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "HIGH_RISK" => RiskCategory::High,
            "MEDIUM_RISK" => RiskCategory::Medium,
            "LOW_RISK" => RiskCategory::Low,
            other => RiskCategory::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RiskCategory::High => "HIGH_RISK",
            RiskCategory::Medium => "MEDIUM_RISK",
            RiskCategory::Low => "LOW_RISK",
            RiskCategory::Other(value) => value,
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RiskCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScoreRow {
    pub supplier_id: String,
    pub supplier_name: String,
    pub avg_sentiment_score: Option<f64>,
    pub total_communications: i64,
    pub negative_count: i64,
    pub risk_category: RiskCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRow {
    pub supplier_name: String,
    pub subject: String,
    pub communication_date: NaiveDateTime,
    pub sentiment_score: Option<f64>,
    pub source_type: String,
    pub key_phrases: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub day: NaiveDate,
    /// `None` when every score on that day is NULL.
    pub avg_sentiment: Option<f64>,
    pub comm_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub category: String,
    pub supplier_count: i64,
    pub avg_sentiment: Option<f64>,
    pub negative_count: i64,
}

/// Everything one render pass reads. Each set is shared with the cache and
/// stays valid after the cache moves on to a newer snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub risk_scores: Arc<Vec<RiskScoreRow>>,
    pub alerts: Arc<Vec<AlertRow>>,
    pub trend: Arc<Vec<TrendPoint>>,
    pub categories: Arc<Vec<CategoryRow>>,
}
