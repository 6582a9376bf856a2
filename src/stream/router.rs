use crate::record::LogRecord;
use crate::source::SourceItem;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub routed: usize,
    pub unknown: usize,
}

/// Fans the shared source queue out to one accumulation loop per server.
#[derive(Debug, Default)]
pub struct StreamRouter {
    senders: HashMap<String, mpsc::Sender<LogRecord>>,
}

impl StreamRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, server: impl Into<String>, sender: mpsc::Sender<LogRecord>) {
        self.senders.insert(server.into(), sender);
    }

    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.senders.keys().map(String::as_str)
    }

    /// Forward items until the queue closes or `cancel` fires. Every record is
    /// stamped with its receipt time on the way through.
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<SourceItem>,
        cancel: CancellationToken,
    ) -> RouterStats {
        let mut stats = RouterStats::default();
        info!(servers = self.senders.len(), "log router started");

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            let Some(sender) = self.senders.get(&item.server) else {
                // Nothing would ever drain records for this server
                error!(server = %item.server, "received log record for unknown server, discarding");
                stats.unknown += 1;
                continue;
            };

            let mut record = item.record;
            record.collected_at = Utc::now();

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = sender.send(record) => sent,
            };
            if sent.is_err() {
                error!(server = %item.server, "accumulation loop for server has stopped, discarding");
                stats.unknown += 1;
                continue;
            }
            stats.routed += 1;
        }

        info!(routed = stats.routed, unknown = stats.unknown, "log router stopped");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;

    fn item(server: &str, content: &str) -> SourceItem {
        let stale = Utc::now() - chrono::Duration::hours(1);
        SourceItem {
            server: server.to_string(),
            record: LogRecord::new(LogLevel::Log, content, stale),
        }
    }

    #[tokio::test]
    async fn test_routes_by_server_and_stamps_receipt() {
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        let mut router = StreamRouter::new();
        router.register("a", a_tx);
        router.register("b", b_tx);

        let (tx, rx) = mpsc::channel(8);
        tx.send(item("a", "one\n")).await.unwrap();
        tx.send(item("b", "two\n")).await.unwrap();
        tx.send(item("c", "lost\n")).await.unwrap();
        tx.send(item("a", "three\n")).await.unwrap();
        drop(tx);

        let before = Utc::now();
        let stats = router.run(rx, CancellationToken::new()).await;
        assert_eq!(stats, RouterStats { routed: 3, unknown: 1 });

        let first = a_rx.recv().await.unwrap();
        assert_eq!(first.content, "one\n");
        assert!(first.collected_at >= before);
        assert_eq!(a_rx.recv().await.unwrap().content, "three\n");
        assert_eq!(b_rx.recv().await.unwrap().content, "two\n");
        assert!(a_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let (a_tx, _a_rx) = mpsc::channel(8);
        let mut router = StreamRouter::new();
        router.register("a", a_tx);
        assert_eq!(router.servers().collect::<Vec<_>>(), vec!["a"]);

        let (_tx, rx) = mpsc::channel::<SourceItem>(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stats = tokio::time::timeout(std::time::Duration::from_secs(1), router.run(rx, cancel))
            .await
            .unwrap();
        assert_eq!(stats, RouterStats::default());
    }
}
