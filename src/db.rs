use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::WarehouseError;
use crate::models::{AlertRow, CategoryRow, RiskCategory, RiskScoreRow, TrendPoint};

pub const RISK_SCORES: &str = "supplier_risk_scores";
pub const RECENT_ALERTS: &str = "recent_alerts";
pub const SENTIMENT_TREND: &str = "sentiment_trend";
pub const CATEGORY_ANALYSIS: &str = "category_analysis";
pub const SUPPLIER_COUNT: &str = "supplier_count";

/// Upper bound on alert rows, enforced by the query and again when rendering.
pub const ALERT_LIMIT: usize = 10;

const RISK_SCORES_SQL: &str = r#"
    SELECT
        SUPPLIER_ID::text AS supplier_id,
        SUPPLIER_NAME::text AS supplier_name,
        AVG_SENTIMENT_SCORE::float8 AS avg_sentiment_score,
        TOTAL_COMMUNICATIONS::bigint AS total_communications,
        NEGATIVE_COUNT::bigint AS negative_count,
        RISK_CATEGORY::text AS risk_category
    FROM V_SUPPLIER_RISK_SCORE
    ORDER BY AVG_SENTIMENT_SCORE ASC
"#;

const RECENT_ALERTS_SQL: &str = r#"
    SELECT
        SUPPLIER_NAME::text AS supplier_name,
        SUBJECT::text AS subject,
        COMMUNICATION_DATE::timestamp AS communication_date,
        SENTIMENT_SCORE::float8 AS sentiment_score,
        SOURCE_TYPE::text AS source_type,
        KEY_PHRASES::text AS key_phrases
    FROM V_RECENT_ALERTS
    LIMIT 10
"#;

const SENTIMENT_TREND_SQL: &str = r#"
    SELECT
        DATE_TRUNC('day', sc.COMMUNICATION_DATE)::date AS day,
        AVG(sa.SENTIMENT_SCORE)::float8 AS avg_sentiment,
        COUNT(*)::bigint AS comm_count
    FROM SUPPLIER_COMMUNICATIONS sc
    JOIN SENTIMENT_ANALYSIS sa ON sc.COMM_ID = sa.COMM_ID
    GROUP BY DATE_TRUNC('day', sc.COMMUNICATION_DATE)
    ORDER BY day
"#;

const CATEGORY_ANALYSIS_SQL: &str = r#"
    SELECT
        s.CATEGORY::text AS category,
        COUNT(DISTINCT s.SUPPLIER_ID)::bigint AS supplier_count,
        AVG(sa.SENTIMENT_SCORE)::float8 AS avg_sentiment,
        SUM(CASE WHEN sa.SENTIMENT_LABEL = 'NEGATIVE' THEN 1 ELSE 0 END)::bigint AS negative_count
    FROM SUPPLIERS s
    JOIN SENTIMENT_ANALYSIS sa ON s.SUPPLIER_ID = sa.SUPPLIER_ID
    GROUP BY s.CATEGORY
    ORDER BY avg_sentiment ASC
"#;

const SUPPLIER_COUNT_SQL: &str = "SELECT COUNT(*)::bigint AS supplier_count FROM SUPPLIERS";

pub async fn fetch_risk_scores(pool: &PgPool) -> Result<Vec<RiskScoreRow>, WarehouseError> {
    let records = sqlx::query(RISK_SCORES_SQL)
        .fetch_all(pool)
        .await
        .map_err(WarehouseError::query(RISK_SCORES))?;

    records
        .iter()
        .map(risk_score_from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(WarehouseError::query(RISK_SCORES))
}

fn risk_score_from_row(row: &PgRow) -> Result<RiskScoreRow, sqlx::Error> {
    let category: Option<String> = row.try_get("risk_category")?;
    Ok(RiskScoreRow {
        supplier_id: text(row, "supplier_id")?,
        supplier_name: text(row, "supplier_name")?,
        avg_sentiment_score: row.try_get("avg_sentiment_score")?,
        total_communications: count(row, "total_communications")?,
        negative_count: count(row, "negative_count")?,
        risk_category: RiskCategory::parse(category.as_deref().unwrap_or_default()),
    })
}

pub async fn fetch_recent_alerts(pool: &PgPool) -> Result<Vec<AlertRow>, WarehouseError> {
    let records = sqlx::query(RECENT_ALERTS_SQL)
        .fetch_all(pool)
        .await
        .map_err(WarehouseError::query(RECENT_ALERTS))?;

    records
        .iter()
        .take(ALERT_LIMIT)
        .map(alert_from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(WarehouseError::query(RECENT_ALERTS))
}

fn alert_from_row(row: &PgRow) -> Result<AlertRow, sqlx::Error> {
    Ok(AlertRow {
        supplier_name: text(row, "supplier_name")?,
        subject: text(row, "subject")?,
        communication_date: row.try_get("communication_date")?,
        sentiment_score: row.try_get("sentiment_score")?,
        source_type: text(row, "source_type")?,
        key_phrases: text(row, "key_phrases")?,
    })
}

pub async fn fetch_sentiment_trend(pool: &PgPool) -> Result<Vec<TrendPoint>, WarehouseError> {
    let records = sqlx::query(SENTIMENT_TREND_SQL)
        .fetch_all(pool)
        .await
        .map_err(WarehouseError::query(SENTIMENT_TREND))?;

    records
        .iter()
        .map(|row| -> Result<TrendPoint, sqlx::Error> {
            Ok(TrendPoint {
                day: row.try_get("day")?,
                avg_sentiment: row.try_get("avg_sentiment")?,
                comm_count: count(row, "comm_count")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(WarehouseError::query(SENTIMENT_TREND))
}

pub async fn fetch_category_analysis(pool: &PgPool) -> Result<Vec<CategoryRow>, WarehouseError> {
    let records = sqlx::query(CATEGORY_ANALYSIS_SQL)
        .fetch_all(pool)
        .await
        .map_err(WarehouseError::query(CATEGORY_ANALYSIS))?;

    records
        .iter()
        .map(|row| -> Result<CategoryRow, sqlx::Error> {
            Ok(CategoryRow {
                category: text(row, "category")?,
                supplier_count: count(row, "supplier_count")?,
                avg_sentiment: row.try_get("avg_sentiment")?,
                negative_count: count(row, "negative_count")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(WarehouseError::query(CATEGORY_ANALYSIS))
}

/// NULL text columns decode as empty strings.
fn text(row: &PgRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

/// NULL counts decode as zero.
fn count(row: &PgRow, column: &str) -> Result<i64, sqlx::Error> {
    Ok(row.try_get::<Option<i64>, _>(column)?.unwrap_or(0))
}

pub async fn count_suppliers(pool: &PgPool) -> Result<i64, WarehouseError> {
    sqlx::query(SUPPLIER_COUNT_SQL)
        .fetch_one(pool)
        .await
        .and_then(|row| row.try_get("supplier_count"))
        .map_err(WarehouseError::query(SUPPLIER_COUNT))
}
