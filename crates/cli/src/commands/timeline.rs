use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use busline_persistence::codec::decode_entry;
use busline_persistence::wal;

/// Lists records in log order, optionally for one device and only the last `limit`.
pub fn run(log_path: &str, device: Option<&str>, limit: Option<usize>) -> anyhow::Result<usize> {
    let mut rows = Vec::new();
    for entry in wal::read_stream(log_path)? {
        let report = decode_entry(&entry?)?;
        if device.is_some_and(|d| report.device_id.as_str() != d) {
            continue;
        }
        rows.push(report);
    }
    if let Some(limit) = limit {
        let skip = rows.len().saturating_sub(limit);
        rows.drain(..skip);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Device", "Latitude", "Longitude", "Reported", "Received"]);

    for report in &rows {
        let reported = report
            .timestamp
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            report.id.to_string(),
            report.device_id.to_string(),
            format!("{:.6}", report.latitude),
            format!("{:.6}", report.longitude),
            reported,
            report.received_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ]);
    }

    println!("\nRecord Timeline\n");
    println!("{table}\n");

    Ok(rows.len())
}
