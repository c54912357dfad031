use anyhow::Result;
use busline_kernel::{ReportDraft, TrackState};
use busline_persistence::codec::encode_report;
use busline_persistence::wal::LogWriter;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::f64::consts::TAU;
use std::path::Path;

const CENTER: (f64, f64) = (17.6600, 75.9000);
const RADIUS_DEG: f64 = 0.02;
const BUSES: usize = 4;
const STEPS: usize = 60;
const STOPS: usize = 8;

/// Point on the loop at `fraction` of the way round.
fn on_loop(fraction: f64) -> (f64, f64) {
    let angle = fraction * TAU;
    (CENTER.0 + RADIUS_DEG * angle.sin(), CENTER.1 + RADIUS_DEG * angle.cos())
}

fn main() -> Result<()> {
    let out_dir = Path::new("demo_db");
    if out_dir.exists() {
        std::fs::remove_dir_all(out_dir)?;
    }
    std::fs::create_dir_all(out_dir)?;

    println!("🎬 Generating 'Campus Loop' Dataset...");

    // --- Catalog: one circular route with evenly spaced stops ---
    println!("1. Writing routes.json and stops.csv...");
    let points: Vec<[f64; 2]> = (0..=72)
        .map(|i| {
            let (lat, lon) = on_loop(i as f64 / 72.0);
            [lat, lon]
        })
        .collect();
    let routes = json!([{ "id": "loop", "name": "Campus Loop", "color": "#d9480f", "points": points }]);
    std::fs::write(out_dir.join("routes.json"), serde_json::to_vec_pretty(&routes)?)?;

    let mut stops = String::from("id,name,lat,lon,approximate\n");
    for s in 0..STOPS {
        let (lat, lon) = on_loop(s as f64 / STOPS as f64);
        // Odd stops were placed from memory, not surveyed.
        stops.push_str(&format!("s{},Stop {},{:.6},{:.6},{}\n", s + 1, s + 1, lat, lon, s % 2));
    }
    std::fs::write(out_dir.join("stops.csv"), stops)?;

    // --- Record log: buses spread around the loop, reporting every 20s ---
    println!("2. Writing {} reports for {} buses...", BUSES * STEPS, BUSES);
    let log_path = out_dir.join("locations.log");
    let mut writer = LogWriter::open(&log_path)?;
    let mut state = TrackState::new();
    let start = DateTime::<Utc>::from_timestamp(1_763_652_000, 0).unwrap_or_default();

    for step in 0..STEPS {
        for bus in 0..BUSES {
            // bus04 drops off the air halfway through.
            if bus == 3 && step >= STEPS / 2 {
                continue;
            }
            let fraction = bus as f64 / BUSES as f64 + step as f64 / STEPS as f64;
            let (lat, lon) = on_loop(fraction.fract());
            let reported = start + Duration::seconds(step as i64 * 20);

            let mut draft = ReportDraft::new(format!("bus{:02}", bus + 1), lat, lon)
                .with_timestamp(reported.timestamp());
            draft.accuracy = Some(5.0 + bus as f64);
            draft.provider = Some("gps".to_string());
            draft.raw_fields = json!({
                "_type": "location",
                "tid": format!("bus{:02}", bus + 1),
                "lat": lat,
                "lon": lon,
                "tst": reported.timestamp(),
            })
            .as_object()
            .cloned()
            .unwrap_or_default();

            let report = state
                .prepare(draft, reported + Duration::milliseconds(350))
                .map_err(|e| anyhow::anyhow!("generated an invalid report: {}", e))?;
            writer.append(report.id.0, &encode_report(&report)?)?;
            state
                .apply(report)
                .map_err(|e| anyhow::anyhow!("kernel rejected generated report: {}", e))?;
        }
    }

    println!("✅ Demo data generated at: {:?}", out_dir.canonicalize()?);
    let silent_after = state.get_latest("bus04").map(|r| r.id.0).unwrap_or_default();
    println!("📊 Story: {} buses circle the loop; bus04 goes silent after record {}", BUSES, silent_after);
    println!("   Try: busline timeline demo_db/locations.log --device bus04");
    println!("   Or:  BUSLINE_LOG_PATH=demo_db/locations.log BUSLINE_STOPS_PATH=demo_db/stops.csv \\");
    println!("        BUSLINE_ROUTES_PATH=demo_db/routes.json busline-node");

    Ok(())
}
