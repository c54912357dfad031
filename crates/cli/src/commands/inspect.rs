use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use std::collections::BTreeSet;
use std::path::Path;

use busline_persistence::codec::decode_entry;
use busline_persistence::wal;

pub fn run(log_path: &str) -> anyhow::Result<()> {
    let path = Path::new(log_path);

    println!("\nBusline Log Report");
    println!("------------------");

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Property", "Value"]);

    if !path.exists() {
        table.add_row(vec!["Log", "MISSING"]);
        println!("{table}\n");
        return Ok(());
    }

    let scan = match wal::scan(path) {
        Ok(scan) => scan,
        Err(e) => {
            table.add_row(vec!["Log".to_string(), format!("CORRUPT: {}", e)]);
            println!("{table}\n");
            return Err(e.into());
        }
    };

    let mut devices = BTreeSet::new();
    let mut first_seen = None;
    let mut last_seen = None;
    for entry in &scan.entries {
        let report = decode_entry(entry)?;
        first_seen.get_or_insert(report.received_at);
        last_seen = Some(report.received_at);
        devices.insert(report.device_id.to_string());
    }

    let file_len = std::fs::metadata(path)?.len();
    table.add_row(vec!["Format".to_string(), format!("BUSL v{}", wal::LogHeader::VERSION)]);
    table.add_row(vec!["Size".to_string(), format!("{} bytes", file_len)]);
    table.add_row(vec!["Records".to_string(), scan.entries.len().to_string()]);
    table.add_row(vec!["Devices".to_string(), devices.len().to_string()]);
    table.add_row(vec![
        "Last Record ID".to_string(),
        scan.entries
            .last()
            .map(|e| e.header.record_id.to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(vec![
        "Received".to_string(),
        match (first_seen, last_seen) {
            (Some(a), Some(b)) => format!("{} .. {}", a.to_rfc3339(), b.to_rfc3339()),
            _ => "-".to_string(),
        },
    ]);
    table.add_row(vec![
        "Torn Tail".to_string(),
        if scan.torn_bytes > 0 {
            format!("{} bytes (dropped on next open)", scan.torn_bytes)
        } else {
            "none".to_string()
        },
    ]);

    println!("{table}\n");
    Ok(())
}
