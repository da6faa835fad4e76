use serde::Serialize;

use crate::models::{RiskCategory, RiskScoreRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub high_risk_count: usize,
    /// `None` when no supplier has a usable score.
    pub avg_sentiment: Option<f64>,
    pub total_communications: i64,
    pub negative_alerts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: RiskCategory,
    pub count: usize,
}

pub fn summarize(rows: &[RiskScoreRow]) -> DashboardMetrics {
    DashboardMetrics {
        high_risk_count: rows
            .iter()
            .filter(|row| row.risk_category == RiskCategory::High)
            .count(),
        avg_sentiment: mean_sentiment(rows),
        total_communications: rows.iter().map(|row| row.total_communications).sum(),
        negative_alerts: rows.iter().map(|row| row.negative_count).sum(),
    }
}

/// Arithmetic mean over the scores that are present and finite.
pub fn mean_sentiment(rows: &[RiskScoreRow]) -> Option<f64> {
    let (total, count) = rows
        .iter()
        .filter_map(|row| row.avg_sentiment_score)
        .filter(|score| score.is_finite())
        .fold((0.0, 0usize), |(total, count), score| (total + score, count + 1));

    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// Supplier count per risk category, largest first. Equal counts keep the
/// order in which the categories first appear.
pub fn risk_distribution(rows: &[RiskScoreRow]) -> Vec<CategoryShare> {
    let mut shares: Vec<CategoryShare> = Vec::new();

    for row in rows {
        match shares
            .iter_mut()
            .find(|share| share.category == row.risk_category)
        {
            Some(share) => share.count += 1,
            None => shares.push(CategoryShare {
                category: row.risk_category.clone(),
                count: 1,
            }),
        }
    }

    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}
