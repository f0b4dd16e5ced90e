use chrono::{DateTime, NaiveDate, Utc};
use halal_check::report::{CSV_HEADER, certification_state};
use halal_check::{
    AppStatus, CertificationState, ChatMessage, CheckOutcome, ExpiryAlert, IngredientResult,
    ResultSource, ResultStats,
};

pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `2025-12-15` → `15 Dec 2025`; anything unparseable is shown as-is.
pub fn format_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%-d %b %Y").to_string(),
        Err(_) => date.to_string(),
    }
}

fn status_label(result: &IngredientResult, now: DateTime<Utc>, threshold_days: i64) -> String {
    match certification_state(result, now, threshold_days) {
        CertificationState::Expiring => format!("{} (expiring)", result.status),
        CertificationState::Certified | CertificationState::Issue => result.status.to_string(),
    }
}

fn rows(results: &[IngredientResult], now: DateTime<Utc>, threshold_days: i64) -> Vec<[String; 5]> {
    results
        .iter()
        .map(|r| {
            [
                capitalize_first(&r.ingredient),
                status_label(r, now, threshold_days),
                format_date(&r.expiry_date),
                r.supplier.clone(),
                r.certificate_id.clone(),
            ]
        })
        .collect()
}

pub fn results_table(results: &[IngredientResult], now: DateTime<Utc>, threshold_days: i64) -> String {
    let rows = rows(results, now, threshold_days);

    let mut widths = CSV_HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(CSV_HEADER.to_vec())];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

pub fn stats_line(stats: &ResultStats) -> String {
    format!(
        "Total: {}  Certified: {}  Expiring: {}  Issues: {}",
        stats.total, stats.certified, stats.expiring, stats.issues
    )
}

pub fn print_outcome(outcome: &CheckOutcome, now: DateTime<Utc>, threshold_days: i64) {
    if let ResultSource::Degraded { reason } = &outcome.source {
        eprintln!("Error: Failed to check ingredients ({})", reason);
        eprintln!("Warning: Using demo data due to connection issues");
    }

    println!("{}", results_table(&outcome.results, now, threshold_days));
    println!();
    println!(
        "{}",
        stats_line(&ResultStats::compute(&outcome.results, now, threshold_days))
    );

    if let Some(alert) = ExpiryAlert::find(&outcome.results, now, threshold_days) {
        eprintln!("{}", alert.message());
    }
}

pub fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = if m.is_user { "You" } else { "Assistant" };
            let at = DateTime::<Utc>::from_timestamp_millis(m.timestamp)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            format!("[{}] {}: {}", at, speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn status_lines(status: &AppStatus) -> String {
    format!(
        "version: {}\nmock mode: {}\napi endpoint: {}\nchat history size: {}",
        status.version, status.mock_mode, status.api_endpoint, status.chat_history_size
    )
}
