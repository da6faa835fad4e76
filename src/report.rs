use std::f64::consts::{PI, TAU};
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::db::ALERT_LIMIT;
use crate::error::DashboardError;
use crate::metrics::{self, CategoryShare, DashboardMetrics};
use crate::models::{
    AlertRow, CategoryRow, DashboardSnapshot, RiskCategory, RiskScoreRow, TrendPoint,
};

pub const PAGE_TITLE: &str = "Supplier Risk Intelligence";
pub const ERROR_HINT: &str =
    "Please check your environment configuration and ensure the warehouse credentials are correct.";

const NEUTRAL_LINE: f64 = 0.0;
const NEGATIVE_THRESHOLD: f64 = -0.3;
const POSITIVE_THRESHOLD: f64 = 0.3;

const TREND_COLOR: &str = "#4ecdc4";
const RED_YELLOW_GREEN: [(u8, u8, u8); 3] = [(255, 0, 0), (255, 255, 0), (0, 128, 0)];
const REDS: [(u8, u8, u8); 3] = [(255, 245, 240), (251, 106, 74), (103, 0, 13)];
const MISSING_COLOR: &str = "#d0d0d0";

const STYLE: &str = r#"
body {
  font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif;
  margin: 0 2rem 2rem;
  color: #262730;
}
hr { border: none; border-top: 1px solid #e6e6e6; margin: 1.5rem 0; }
.subtitle { font-style: italic; color: #555; }
.metrics { display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; }
.metric .label { font-size: 0.9rem; color: #555; }
.metric .value { font-size: 2rem; }
.row { display: grid; grid-template-columns: 2fr 1fr; gap: 2rem; }
.pair { display: grid; grid-template-columns: 1fr 1fr; gap: 2rem; }
.table-wrap { max-height: 400px; overflow-y: auto; }
table { border-collapse: collapse; width: 100%; font-size: 0.85rem; }
th, td { border-bottom: 1px solid #eee; padding: 0.3rem 0.5rem; text-align: left; }
td.num { text-align: right; }
svg { width: 100%; height: auto; }
details {
  border: 1px solid #e6e6e6;
  border-radius: 4px;
  margin-bottom: 0.5rem;
  padding: 0.5rem 1rem;
}
details .body { display: grid; grid-template-columns: 1fr 3fr; gap: 1rem; margin-top: 0.5rem; }
.banner { background: #ffe0e0; color: #7d1010; padding: 1rem; border-radius: 4px; }
.hint { background: #e0efff; color: #10407d; padding: 1rem; border-radius: 4px; margin-top: 1rem; }
.empty { color: #888; }
footer { font-style: italic; color: #555; }
"#;

/// Renders one pass: the full report when every query succeeded, otherwise
/// the header and a single error banner.
pub fn render_page(
    outcome: &Result<DashboardSnapshot, DashboardError>,
    rendered_at: DateTime<Utc>,
) -> String {
    match outcome {
        Ok(snapshot) => render_dashboard(snapshot, rendered_at),
        Err(err) => render_error(err),
    }
}

pub fn render_dashboard(snapshot: &DashboardSnapshot, rendered_at: DateTime<Utc>) -> String {
    let summary = metrics::summarize(&snapshot.risk_scores);
    let shares = metrics::risk_distribution(&snapshot.risk_scores);

    let mut output = page_start();
    let _ = writeln!(output, "<hr>");
    output.push_str(&metric_strip(&summary));
    let _ = writeln!(output, "<hr>");

    let _ = writeln!(output, "<div class=\"row\">");
    let _ = writeln!(output, "<section><h3>Supplier Risk Scores</h3>");
    output.push_str(&risk_table(&snapshot.risk_scores));
    let _ = writeln!(output, "</section>");
    let _ = writeln!(output, "<section><h3>Risk Distribution</h3>");
    output.push_str(&pie_chart(&shares));
    let _ = writeln!(output, "</section>");
    let _ = writeln!(output, "</div>");
    let _ = writeln!(output, "<hr>");

    let _ = writeln!(output, "<section><h3>Sentiment Trend Over Time</h3>");
    output.push_str(&trend_chart(&snapshot.trend));
    let _ = writeln!(output, "</section>");
    let _ = writeln!(output, "<hr>");

    let _ = writeln!(output, "<div class=\"pair\">");
    let _ = writeln!(output, "<section><h3>Risk by Category</h3>");
    output.push_str(&bar_chart(&sentiment_bars(&snapshot.categories), "Average Sentiment", 2));
    let _ = writeln!(output, "</section>");
    let _ = writeln!(output, "<section><h3>Negative Communications by Category</h3>");
    output.push_str(&bar_chart(&negative_bars(&snapshot.categories), "Negative Count", 0));
    let _ = writeln!(output, "</section>");
    let _ = writeln!(output, "</div>");
    let _ = writeln!(output, "<hr>");

    let _ = writeln!(output, "<section><h3>Recent Negative Alerts</h3>");
    output.push_str(&alert_list(&snapshot.alerts));
    let _ = writeln!(output, "</section>");

    let _ = writeln!(output, "<hr>");
    let _ = writeln!(
        output,
        "<footer>Data refreshes every 5 minutes | rendered {}</footer>",
        rendered_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    page_end(output)
}

pub fn render_error(err: &DashboardError) -> String {
    let mut output = page_start();
    let _ = writeln!(
        output,
        "<div class=\"banner\" role=\"alert\">Error connecting to the warehouse: {}</div>",
        html_escape(&err.to_string())
    );
    let _ = writeln!(output, "<div class=\"hint\">{}</div>", html_escape(ERROR_HINT));
    page_end(output)
}

fn page_start() -> String {
    let mut output = String::new();
    let _ = writeln!(output, "<!DOCTYPE html>");
    let _ = writeln!(output, "<html lang=\"en\">");
    let _ = writeln!(output, "<head>");
    let _ = writeln!(output, "<meta charset=\"utf-8\">");
    let _ = writeln!(output, "<title>{PAGE_TITLE}</title>");
    let _ = writeln!(output, "<style>{STYLE}</style>");
    let _ = writeln!(output, "</head>");
    let _ = writeln!(output, "<body>");
    let _ = writeln!(output, "<h1>Supplier Risk Intelligence Dashboard</h1>");
    let _ = writeln!(
        output,
        "<p class=\"subtitle\">Sentiment scores and risk categories computed in the warehouse</p>"
    );
    output
}

fn page_end(mut output: String) -> String {
    let _ = writeln!(output, "</body>");
    let _ = writeln!(output, "</html>");
    output
}

fn metric_strip(summary: &DashboardMetrics) -> String {
    let avg = summary
        .avg_sentiment
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|| "&mdash;".to_string());

    let mut output = String::new();
    let _ = writeln!(output, "<div class=\"metrics\">");
    for (label, value) in [
        ("High Risk Suppliers", summary.high_risk_count.to_string()),
        ("Avg Sentiment Score", avg),
        ("Total Communications", summary.total_communications.to_string()),
        ("Negative Alerts", summary.negative_alerts.to_string()),
    ] {
        let _ = writeln!(
            output,
            "<div class=\"metric\"><div class=\"label\">{label}</div>\
             <div class=\"value\">{value}</div></div>"
        );
    }
    let _ = writeln!(output, "</div>");
    output
}

pub fn risk_tint(category: &RiskCategory) -> &'static str {
    match category {
        RiskCategory::High => "#ffcccc",
        RiskCategory::Medium => "#fff4cc",
        RiskCategory::Low | RiskCategory::Other(_) => "#ccffcc",
    }
}

pub fn risk_color(category: &RiskCategory) -> &'static str {
    match category {
        RiskCategory::High => "#ff6b6b",
        RiskCategory::Medium => "#ffd93d",
        RiskCategory::Low => "#6bcf7f",
        RiskCategory::Other(_) => "#b0b0b0",
    }
}

fn risk_table(rows: &[RiskScoreRow]) -> String {
    let mut output = String::new();
    if rows.is_empty() {
        let _ = writeln!(output, "<p class=\"empty\">No supplier risk scores available.</p>");
        return output;
    }

    let _ = writeln!(output, "<div class=\"table-wrap\"><table>");
    let _ = writeln!(
        output,
        "<thead><tr><th>SUPPLIER_ID</th><th>SUPPLIER_NAME</th><th>AVG_SENTIMENT_SCORE</th>\
         <th>TOTAL_COMMUNICATIONS</th><th>NEGATIVE_COUNT</th><th>RISK_CATEGORY</th></tr></thead>"
    );
    let _ = writeln!(output, "<tbody>");
    for row in rows {
        let score = row
            .avg_sentiment_score
            .map(|value| format!("{value:.3}"))
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>\
             <td class=\"num\">{}</td><td style=\"background-color: {}\">{}</td></tr>",
            html_escape(&row.supplier_id),
            html_escape(&row.supplier_name),
            score,
            row.total_communications,
            row.negative_count,
            risk_tint(&row.risk_category),
            html_escape(row.risk_category.as_str())
        );
    }
    let _ = writeln!(output, "</tbody></table></div>");
    output
}

fn pie_chart(shares: &[CategoryShare]) -> String {
    let total: usize = shares.iter().map(|share| share.count).sum();
    if total == 0 {
        return "<p class=\"empty\">No suppliers in this snapshot.</p>\n".to_string();
    }

    let (cx, cy, r) = (150.0, 150.0, 130.0);
    let mut output = String::new();
    let _ = writeln!(
        output,
        "<svg class=\"pie\" viewBox=\"0 0 300 300\" role=\"img\" aria-label=\"Risk distribution\">"
    );

    let mut start = -PI / 2.0;
    for share in shares {
        let fraction = share.count as f64 / total as f64;
        let sweep = fraction * TAU;
        let color = risk_color(&share.category);
        let label = html_escape(share.category.as_str());

        if share.count == total {
            let _ = writeln!(
                output,
                "<circle cx=\"{cx}\" cy=\"{cy}\" r=\"{r}\" fill=\"{color}\">\
                 <title>{label}: {}</title></circle>",
                share.count
            );
        } else {
            let end = start + sweep;
            let large_arc = if sweep > PI { 1 } else { 0 };
            let _ = writeln!(
                output,
                "<path d=\"M {cx} {cy} L {:.2} {:.2} A {r} {r} 0 {large_arc} 1 {:.2} {:.2} Z\" \
                 fill=\"{color}\" stroke=\"#fff\"><title>{label}: {}</title></path>",
                cx + r * start.cos(),
                cy + r * start.sin(),
                cx + r * end.cos(),
                cy + r * end.sin(),
                share.count
            );
        }

        let mid = start + sweep / 2.0;
        let (lx, ly) = if share.count == total {
            (cx, cy)
        } else {
            (cx + r * 0.6 * mid.cos(), cy + r * 0.6 * mid.sin())
        };
        let _ = writeln!(
            output,
            "<text x=\"{lx:.2}\" y=\"{ly:.2}\" text-anchor=\"middle\" font-size=\"11\">\
             <tspan x=\"{lx:.2}\">{label}</tspan>\
             <tspan x=\"{lx:.2}\" dy=\"13\">{:.1}%</tspan></text>",
            fraction * 100.0
        );
        start += sweep;
    }

    let _ = writeln!(output, "</svg>");
    output
}

fn trend_chart(points: &[TrendPoint]) -> String {
    if points.is_empty() {
        return "<p class=\"empty\">No communications recorded yet.</p>\n".to_string();
    }

    let (width, height) = (900.0, 400.0);
    let (left, right, top, bottom) = (60.0, 150.0, 20.0, 50.0);
    let plot_w = width - left - right;
    let plot_h = height - top - bottom;

    let known = || points.iter().filter_map(|p| p.avg_sentiment);
    let data_min = known().fold(f64::INFINITY, f64::min);
    let data_max = known().fold(f64::NEG_INFINITY, f64::max);
    let low = data_min.min(NEGATIVE_THRESHOLD);
    let high = data_max.max(POSITIVE_THRESHOLD);
    let pad = (high - low) * 0.1;
    let (y_lo, y_hi) = (low - pad, high + pad);
    let y = |value: f64| top + (y_hi - value) / (y_hi - y_lo) * plot_h;

    let first = points[0].day;
    let span = points
        .last()
        .map(|p| (p.day - first).num_days())
        .unwrap_or(0)
        .max(1) as f64;
    let x = |point: &TrendPoint| {
        if points.len() == 1 {
            left + plot_w / 2.0
        } else {
            left + (point.day - first).num_days() as f64 / span * plot_w
        }
    };

    let mut output = String::new();
    let _ = writeln!(
        output,
        "<svg class=\"trend\" viewBox=\"0 0 {width} {height}\" role=\"img\" \
         aria-label=\"Sentiment trend\">"
    );

    for step in 0..=4 {
        let value = y_lo + (y_hi - y_lo) * step as f64 / 4.0;
        let _ = writeln!(
            output,
            "<line x1=\"{left}\" x2=\"{:.2}\" y1=\"{:.2}\" y2=\"{:.2}\" stroke=\"#f0f0f0\"/>\
             <text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\" font-size=\"11\">{value:.2}</text>",
            left + plot_w,
            y(value),
            y(value),
            left - 6.0,
            y(value) + 4.0
        );
    }

    for (value, label, color) in [
        (NEUTRAL_LINE, "Neutral", "gray"),
        (NEGATIVE_THRESHOLD, "Negative Threshold", "red"),
        (POSITIVE_THRESHOLD, "Positive Threshold", "green"),
    ] {
        let _ = writeln!(
            output,
            "<line class=\"reference\" x1=\"{left}\" x2=\"{:.2}\" y1=\"{:.2}\" y2=\"{:.2}\" \
             stroke=\"{color}\" stroke-dasharray=\"6 4\"/>\
             <text x=\"{:.2}\" y=\"{:.2}\" font-size=\"11\" fill=\"{color}\">{label}</text>",
            left + plot_w,
            y(value),
            y(value),
            left + plot_w + 6.0,
            y(value) + 4.0
        );
    }

    // days without an average break the line
    let mut segment: Vec<String> = Vec::new();
    let mut segments: Vec<Vec<String>> = Vec::new();
    for point in points {
        match point.avg_sentiment {
            Some(value) => segment.push(format!("{:.2},{:.2}", x(point), y(value))),
            None if !segment.is_empty() => segments.push(std::mem::take(&mut segment)),
            None => {}
        }
    }
    if !segment.is_empty() {
        segments.push(segment);
    }
    for path in &segments {
        let _ = writeln!(
            output,
            "<polyline points=\"{}\" fill=\"none\" stroke=\"{TREND_COLOR}\" stroke-width=\"3\"/>",
            path.join(" ")
        );
    }
    for point in points {
        let Some(value) = point.avg_sentiment else {
            continue;
        };
        let _ = writeln!(
            output,
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"4\" fill=\"{TREND_COLOR}\">\
             <title>{}: {value:.3} ({} communications)</title></circle>",
            x(point),
            y(value),
            point.day,
            point.comm_count
        );
    }

    let stride = points.len().div_ceil(6).max(1);
    for point in points.iter().step_by(stride) {
        let _ = writeln!(
            output,
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-size=\"11\">{}</text>",
            x(point),
            top + plot_h + 18.0,
            point.day.format("%Y-%m-%d")
        );
    }

    let _ = writeln!(
        output,
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-size=\"12\">Date</text>",
        left + plot_w / 2.0,
        height - 8.0
    );
    let _ = writeln!(
        output,
        "<text x=\"14\" y=\"{:.2}\" text-anchor=\"middle\" font-size=\"12\" \
         transform=\"rotate(-90 14 {:.2})\">Sentiment Score</text>",
        top + plot_h / 2.0,
        top + plot_h / 2.0
    );
    let _ = writeln!(output, "</svg>");
    output
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarDatum {
    pub label: String,
    /// `None` draws an empty slot labelled with a dash.
    pub value: Option<f64>,
    pub color: String,
}

/// Average sentiment per category on a red-yellow-green scale, in the order
/// the warehouse returned the categories.
pub fn sentiment_bars(categories: &[CategoryRow]) -> Vec<BarDatum> {
    let values: Vec<f64> = categories.iter().filter_map(|c| c.avg_sentiment).collect();
    categories
        .iter()
        .map(|c| BarDatum {
            label: c.category.clone(),
            value: c.avg_sentiment,
            color: match c.avg_sentiment {
                Some(value) => scale_color(&RED_YELLOW_GREEN, &values, value),
                None => MISSING_COLOR.to_string(),
            },
        })
        .collect()
}

/// Negative communication count per category, darker red for larger counts.
pub fn negative_bars(categories: &[CategoryRow]) -> Vec<BarDatum> {
    let values: Vec<f64> = categories.iter().map(|c| c.negative_count as f64).collect();
    categories
        .iter()
        .map(|c| BarDatum {
            label: c.category.clone(),
            value: Some(c.negative_count as f64),
            color: scale_color(&REDS, &values, c.negative_count as f64),
        })
        .collect()
}

fn scale_color(stops: &[(u8, u8, u8)], values: &[f64], value: f64) -> String {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let t = if max > min { (value - min) / (max - min) } else { 0.5 };
    interpolate(stops, t)
}

fn interpolate(stops: &[(u8, u8, u8)], t: f64) -> String {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    let segments = (stops.len() - 1) as f64;
    let position = t * segments;
    let index = (position.floor() as usize).min(stops.len() - 2);
    let local = position - index as f64;
    let (a, b) = (stops[index], stops[index + 1]);
    let channel =
        |from: u8, to: u8| (from as f64 + (to as f64 - from as f64) * local).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(a.0, b.0),
        channel(a.1, b.1),
        channel(a.2, b.2)
    )
}

fn bar_chart(bars: &[BarDatum], y_title: &str, decimals: usize) -> String {
    if bars.is_empty() {
        return "<p class=\"empty\">No category data available.</p>\n".to_string();
    }

    let (width, height) = (560.0, 400.0);
    let (left, right, top, bottom) = (60.0, 20.0, 30.0, 60.0);
    let plot_w = width - left - right;
    let plot_h = height - top - bottom;

    let lo = bars.iter().filter_map(|b| b.value).fold(0.0, f64::min);
    let hi = bars.iter().filter_map(|b| b.value).fold(0.0, f64::max);
    let pad = ((hi - lo) * 0.15).max(f64::EPSILON);
    let (y_lo, y_hi) = (if lo < 0.0 { lo - pad } else { 0.0 }, hi + pad);
    let y = |value: f64| top + (y_hi - value) / (y_hi - y_lo) * plot_h;
    let slot = plot_w / bars.len() as f64;
    let bar_w = slot * 0.7;

    let mut output = String::new();
    let _ = writeln!(
        output,
        "<svg class=\"bars\" viewBox=\"0 0 {width} {height}\" role=\"img\" aria-label=\"{}\">",
        html_escape(y_title)
    );
    let _ = writeln!(
        output,
        "<line x1=\"{left}\" x2=\"{:.2}\" y1=\"{:.2}\" y2=\"{:.2}\" stroke=\"#999\"/>",
        left + plot_w,
        y(0.0),
        y(0.0)
    );

    for (index, bar) in bars.iter().enumerate() {
        let x = left + slot * index as f64 + (slot - bar_w) / 2.0;
        let label = html_escape(&bar.label);
        let text_y = match bar.value {
            Some(value) => {
                let (bar_top, bar_bottom) = if value >= 0.0 {
                    (y(value), y(0.0))
                } else {
                    (y(0.0), y(value))
                };
                let _ = writeln!(
                    output,
                    "<rect x=\"{x:.2}\" y=\"{bar_top:.2}\" width=\"{bar_w:.2}\" \
                     height=\"{:.2}\" fill=\"{}\"><title>{label}: {:.*}</title></rect>",
                    (bar_bottom - bar_top).max(0.0),
                    bar.color,
                    decimals,
                    value
                );
                if value >= 0.0 {
                    bar_top - 5.0
                } else {
                    bar_bottom + 14.0
                }
            }
            None => y(0.0) - 5.0,
        };
        let text = bar
            .value
            .map(|value| format!("{value:.decimals$}"))
            .unwrap_or_else(|| "&mdash;".to_string());
        let _ = writeln!(
            output,
            "<text x=\"{:.2}\" y=\"{text_y:.2}\" text-anchor=\"middle\" \
             font-size=\"11\">{text}</text>",
            x + bar_w / 2.0
        );
        let _ = writeln!(
            output,
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-size=\"11\">{label}</text>",
            x + bar_w / 2.0,
            top + plot_h + 18.0
        );
    }

    let _ = writeln!(
        output,
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-size=\"12\">CATEGORY</text>",
        left + plot_w / 2.0,
        height - 12.0
    );
    let _ = writeln!(
        output,
        "<text x=\"14\" y=\"{:.2}\" text-anchor=\"middle\" font-size=\"12\" \
         transform=\"rotate(-90 14 {:.2})\">{}</text>",
        top + plot_h / 2.0,
        top + plot_h / 2.0,
        html_escape(y_title)
    );
    let _ = writeln!(output, "</svg>");
    output
}

fn alert_list(alerts: &[AlertRow]) -> String {
    let mut output = String::new();
    if alerts.is_empty() {
        let _ = writeln!(output, "<p class=\"empty\">No recent negative alerts.</p>");
        return output;
    }

    for alert in alerts.iter().take(ALERT_LIMIT) {
        let score = alert
            .sentiment_score
            .map(|value| format!("{value:.3}"))
            .unwrap_or_else(|| "&mdash;".to_string());
        let _ = writeln!(
            output,
            "<details class=\"alert\"><summary>{} - {} ({})</summary>",
            html_escape(&alert.supplier_name),
            html_escape(&alert.subject),
            alert.communication_date.format("%Y-%m-%d")
        );
        let _ = writeln!(
            output,
            "<div class=\"body\"><div><div class=\"label\">Sentiment Score</div>\
             <div class=\"value\">{score}</div><p><strong>Source:</strong> {}</p></div>",
            html_escape(&alert.source_type)
        );
        let _ = writeln!(
            output,
            "<div><p><strong>Summary:</strong></p><p>{}</p></div></div></details>",
            html_escape(&alert.key_phrases)
        );
    }
    output
}

fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
