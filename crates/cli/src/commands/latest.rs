use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use crate::engine::ForensicEngine;

/// Latest position per device, as of record `at` (or the end of the log).
pub fn run(log_path: &str, at: Option<u64>) -> anyhow::Result<usize> {
    let mut engine = ForensicEngine::new();
    engine.replay_to(log_path, at)?;

    if let Some(target) = at {
        if engine.current_id < target {
            println!("\n⚠️  Log ends at record {}; showing final state.", engine.current_id);
        }
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Device", "Record", "Latitude", "Longitude", "Received"]);

    let latest = engine.state.all_latest(None);
    for report in &latest {
        table.add_row(vec![
            report.device_id.to_string(),
            report.id.to_string(),
            format!("{:.6}", report.latitude),
            format!("{:.6}", report.longitude),
            report.received_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ]);
    }

    println!("\nFleet as of record {}\n", engine.current_id);
    println!("{table}\n");

    Ok(latest.len())
}
