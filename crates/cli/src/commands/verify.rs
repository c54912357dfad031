use busline_kernel::verify::digest_hex;

use crate::engine::ForensicEngine;

/// Replays the whole log through the kernel and prints the state digest.
///
/// Two logs with the same digest rebuild to the same state.
pub fn run(log_path: &str) -> anyhow::Result<String> {
    let mut engine = ForensicEngine::new();
    match engine.replay_to(log_path, None) {
        Ok(count) => {
            let digest = digest_hex(&busline_kernel::verify::state_digest(&engine.state));
            println!("\n✅ VERIFIED\n");
            println!("Records:  {}", count);
            println!("Devices:  {}", engine.state.device_count());
            println!("Digest:   {}\n", digest);
            Ok(digest)
        }
        Err(e) => {
            println!("\n❌ CORRUPTED\n");
            println!("Replayed {} records before failure", engine.applied);
            println!("Error:    {:#}\n", e);
            Err(e)
        }
    }
}
