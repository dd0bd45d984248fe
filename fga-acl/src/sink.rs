//! Row sinks the retrieval strategies write into.
//!
//! A sink is both the destination of facts and the row-budget oracle: every
//! strategy asks [`FactSink::rows_remaining`] before each backend page and
//! before each row, and stops without error once it reaches zero.
//!
//! Emitting is async so that a slow consumer applies backpressure to the
//! query instead of letting rows pile up in memory.

use crate::backend::BoxFuture;
use crate::fact::PermissionFact;
use tokio::sync::mpsc;

/// Budget value meaning "no limit".
pub const UNLIMITED: u64 = u64::MAX;

/// Rows buffered by a [`ChannelSink`] before `emit` waits for the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Destination for the facts produced by a query.
pub trait FactSink: Send {
    /// How many more rows the caller wants. `0` means stop.
    fn rows_remaining(&self) -> u64;

    /// Accept one fact. Order of calls is the order rows are returned.
    ///
    /// May wait until the consumer has room for the row.
    fn emit(&mut self, fact: PermissionFact) -> BoxFuture<'_, ()>;
}

/// Collects facts into a `Vec`, optionally capped at a row limit.
#[derive(Debug, Default)]
pub struct CollectSink {
    rows: Vec<PermissionFact>,
    limit: Option<u64>,
}

impl CollectSink {
    /// A sink without a row limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that asks for at most `limit` rows.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            rows: Vec::new(),
            limit: Some(limit),
        }
    }

    pub fn rows(&self) -> &[PermissionFact] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PermissionFact> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FactSink for CollectSink {
    fn rows_remaining(&self) -> u64 {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.rows.len() as u64),
            None => UNLIMITED,
        }
    }

    fn emit(&mut self, fact: PermissionFact) -> BoxFuture<'_, ()> {
        self.rows.push(fact);
        Box::pin(std::future::ready(()))
    }
}

/// Forwards facts to a channel so a consumer can stream them while the query runs.
///
/// The channel is bounded: when the consumer falls behind, `emit` waits and
/// the query stops pulling from the backend. Once the receiver is dropped the
/// budget drops to zero, which ends the query early without error.
pub struct ChannelSink {
    tx: mpsc::Sender<PermissionFact>,
    remaining: u64,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel, buffering
    /// [`DEFAULT_CHANNEL_CAPACITY`] rows.
    pub fn new(limit: Option<u64>) -> (Self, mpsc::Receiver<PermissionFact>) {
        Self::with_capacity(limit, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Like [`new`](Self::new) with an explicit buffer size (at least 1).
    pub fn with_capacity(
        limit: Option<u64>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<PermissionFact>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            tx,
            remaining: limit.unwrap_or(UNLIMITED),
        };
        (sink, rx)
    }
}

impl FactSink for ChannelSink {
    fn rows_remaining(&self) -> u64 {
        if self.tx.is_closed() {
            0
        } else {
            self.remaining
        }
    }

    fn emit(&mut self, fact: PermissionFact) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.tx.send(fact).await.is_ok() && self.remaining != UNLIMITED {
                self.remaining = self.remaining.saturating_sub(1);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fact(id: &str) -> PermissionFact {
        PermissionFact::new("doc", id, "user", "alice", "viewer")
    }

    #[tokio::test]
    async fn test_collect_sink_budget() {
        let mut sink = CollectSink::with_limit(2);
        assert_eq!(sink.rows_remaining(), 2);
        sink.emit(fact("1")).await;
        sink.emit(fact("2")).await;
        assert_eq!(sink.rows_remaining(), 0);
        assert_eq!(sink.len(), 2);

        assert_eq!(CollectSink::new().rows_remaining(), UNLIMITED);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (mut sink, mut rx) = ChannelSink::new(Some(3));
        sink.emit(fact("1")).await;
        sink.emit(fact("2")).await;
        assert_eq!(sink.rows_remaining(), 1);

        assert_eq!(rx.recv().await.unwrap().object_id, "1");
        assert_eq!(rx.recv().await.unwrap().object_id, "2");
    }

    #[test]
    fn test_channel_sink_stops_when_receiver_dropped() {
        let (sink, rx) = ChannelSink::new(None);
        assert_eq!(sink.rows_remaining(), UNLIMITED);
        drop(rx);
        assert_eq!(sink.rows_remaining(), 0);
    }

    #[tokio::test]
    async fn test_channel_sink_waits_for_slow_consumer() {
        let (mut sink, mut rx) = ChannelSink::with_capacity(None, 1);
        sink.emit(fact("1")).await;

        // Buffer is full: the second row waits for the consumer.
        let blocked = tokio::time::timeout(Duration::from_millis(50), sink.emit(fact("2"))).await;
        assert!(blocked.is_err());

        assert_eq!(rx.recv().await.unwrap().object_id, "1");
        tokio::time::timeout(Duration::from_secs(1), sink.emit(fact("3")))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().object_id, "3");
    }

    #[tokio::test]
    async fn test_channel_sink_budget_counts_delivered_rows() {
        let (mut sink, rx) = ChannelSink::with_capacity(Some(2), 4);
        sink.emit(fact("1")).await;
        assert_eq!(sink.rows_remaining(), 1);

        drop(rx);
        sink.emit(fact("2")).await;
        assert_eq!(sink.rows_remaining(), 0);
    }
}
