// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier stats` command implementation.
//!
//! Reads the per-day counters straight from the database, so it works
//! whether or not a server is running.

use std::sync::Arc;

use courier_config::CourierConfig;
use courier_core::{CourierError, SystemClock};
use courier_ledger::{DailyStats, OutcomeRecorder};
use courier_storage::Database;

/// Runs the `courier stats` command.
pub async fn run_stats(config: &CourierConfig, days: u32, json: bool) -> Result<(), CourierError> {
    let db = Database::from_config(&config.storage).await?;
    let recorder = OutcomeRecorder::new(db.clone(), &config.ledger, Arc::new(SystemClock));
    let range = recorder.query_range(days).await?;
    db.close().await?;

    if json {
        let rendered = serde_json::to_string_pretty(&range)
            .map_err(|e| CourierError::Internal(format!("failed to render stats: {e}")))?;
        println!("{rendered}");
    } else {
        print!("{}", render_table(&range));
    }
    Ok(())
}

fn render_table(range: &[DailyStats]) -> String {
    let mut out = format!(
        "{:<12} {:>8} {:>10} {:>8} {:>10} {:>10}\n",
        "date", "total", "successful", "failed", "avg_ms", "cost"
    );
    for day in range {
        let avg = day
            .avg_duration_ms()
            .map(|ms| format!("{ms:.0}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<12} {:>8} {:>10} {:>8} {:>10} {:>10.4}\n",
            day.date, day.total, day.successful, day.failed, avg, day.total_cost
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_header_and_one_row_per_day() {
        let mut busy = DailyStats::empty("2024-01-15");
        busy.total = 5;
        busy.successful = 3;
        busy.failed = 2;
        busy.total_duration_ms = 5_000;
        let range = vec![DailyStats::empty("2024-01-14"), busy];

        let table = render_table(&range);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date"));
        assert!(lines[1].starts_with("2024-01-14"));
        assert!(lines[1].contains(" - "));
        assert!(lines[2].contains("1000"));
    }
}
