//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `songbook_core` wiring.
//! - Keep output deterministic for quick local sanity checks.

use songbook_core::db::open_db_in_memory;
use songbook_core::{AlwaysOnline, ReplicaManager, SqliteSongRepository};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("songbook_core ping={}", songbook_core::ping());
    println!("songbook_core version={}", songbook_core::core_version());

    // Exercise the replica path end to end against an empty in-memory
    // store with no remote source configured.
    match open_db_in_memory() {
        Ok(conn) => {
            let manager = Arc::new(ReplicaManager::new(
                Arc::new(SqliteSongRepository::new(conn)),
                None,
                Arc::new(AlwaysOnline),
            ));
            manager.load_initial(false).await;
            println!("songbook_core records={}", manager.snapshot().len());
            println!("songbook_core syncing={}", manager.is_syncing());
        }
        Err(err) => {
            eprintln!("songbook_core db_open failed: {err}");
            std::process::exit(1);
        }
    }
}
