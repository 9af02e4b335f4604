//! Stands in for the real vision pipeline, which lives outside this process:
//! periodically broadcasts plausible `ScanReport`/`PerfStats` traffic to
//! every connected peer so the wire layer has real application payloads to
//! carry.

use std::sync::Arc;
use std::time::Duration;

use cardsync_proto::message::{PerfStats, ScanReport};
use cardsync_proto::peer::PeerTable;
use rand::Rng;
use tokio_util::sync::CancellationToken;

const SCAN_INTERVAL: Duration = Duration::from_secs(4);

const DECK_IDS: &[&str] = &["standard-52", "tarot-78", "uno-108"];

pub async fn run(peers: Arc<PeerTable>, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(SCAN_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tick.tick() => broadcast_one_cycle(&peers).await,
        }
    }
}

async fn broadcast_one_cycle(peers: &Arc<PeerTable>) {
    let connected = peers.snapshot();
    if connected.is_empty() {
        return;
    }

    let (scan, perf) = {
        let mut rng = rand::thread_rng();
        let scan = ScanReport {
            deck_id: DECK_IDS[rng.gen_range(0..DECK_IDS.len())].to_string(),
            card_count: rng.gen_range(40..=54),
            confidence_pct: rng.gen_range(80..=99),
        };
        let perf = PerfStats {
            fps_x100: rng.gen_range(2800..=3200),
            cpu_pct: rng.gen_range(10..=60),
            queue_depth: rng.gen_range(0..=4),
        };
        (scan, perf)
    };

    for peer in connected {
        if let Err(e) = peer.send_message(&scan).await {
            log::debug!("scan report send failed: {e}");
        }
        if let Err(e) = peer.send_message(&perf).await {
            log::debug!("perf stats send failed: {e}");
        }
    }
}
