//! UseCase: 無応答セッションの検出と切断（ハートビート）
//!
//! 一定間隔で Registry のスナップショットを走査する。非アクティブ時間がしきい値を超えた
//! セッションには ping を送り、次の走査でもしきい値を超えたまま（pong も他の受信もない）なら
//! 切断を要求する。切断後の後処理（Registry 削除・退出通知）は各セッションのワーカーが行う。

use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{CloseReason, SessionRegistry},
    infrastructure::{codec::encode_payload, dto::wire::WireMessage},
};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub evicted: usize,
}

pub struct HeartbeatMonitor {
    registry: Arc<dyn SessionRegistry>,
    interval: Duration,
    inactivity_timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        interval: Duration,
        inactivity_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            interval,
            inactivity_timeout,
        }
    }

    /// Sweep every `interval` until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Heartbeat monitor started (interval {:?}, inactivity timeout {:?})",
            self.interval,
            self.inactivity_timeout
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                tick = ticker.tick() => {
                    let report = self.sweep(tick).await;
                    if report.probed > 0 || report.evicted > 0 {
                        tracing::debug!(
                            probed = report.probed,
                            evicted = report.evicted,
                            "Heartbeat sweep finished"
                        );
                    }
                }
            }
        }

        tracing::info!("Heartbeat monitor stopped");
    }

    /// 1 回分の走査
    ///
    /// 走査はスナップショットに対して行い、Registry のロックは保持しない。
    pub async fn sweep(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();

        let ping = match encode_payload(&WireMessage::Ping) {
            Ok(ping) => ping,
            Err(e) => {
                tracing::error!("Failed to encode heartbeat probe: {}", e);
                return report;
            }
        };

        for session in self.registry.snapshot().await {
            if session.is_close_requested() {
                continue;
            }

            let idle = session.idle_for(now);
            if idle <= self.inactivity_timeout {
                continue;
            }

            if session.mark_probe_sent() {
                tracing::info!(
                    session_id = %session.id(),
                    "Evicting '{}' after {:?} without activity",
                    session.display_name(),
                    idle
                );
                session.request_close(CloseReason::HeartbeatTimeout);
                report.evicted += 1;
                continue;
            }

            match session.deliver(ping.clone()) {
                Ok(()) => report.probed += 1,
                Err(e) => {
                    tracing::info!(
                        session_id = %session.id(),
                        "Heartbeat probe to '{}' failed: {}",
                        session.display_name(),
                        e
                    );
                    session.request_close(CloseReason::HeartbeatTimeout);
                    report.evicted += 1;
                }
            }
        }

        report
    }
}
