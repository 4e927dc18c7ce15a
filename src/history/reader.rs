//! Lazy, batch-by-batch history reader.
//!
//! Each batch requests the identifier range `[current, current + n)` where
//! `n = min(batch_size, remaining)`. Buffered messages are handed out without
//! suspending; the reader only awaits when the buffer is empty and another
//! batch is due.
//!
//! A batch that returns fewer messages than it could have ends the read.
//! Identifier `0` never exists, so it is not counted when a batch starts
//! there.

use std::collections::VecDeque;

use futures::Stream;
use thiserror::Error;
use tracing::{debug, trace};

use super::{ChatId, DEFAULT_BATCH_SIZE, FetchError, MessageFetcher};

/// Errors produced while reading history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to fetch batch starting at message {start}: {source}")]
    Fetch {
        start: i32,
        #[source]
        source: FetchError,
    },
}

/// Tunables for a [`HistoryReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Maximum number of identifiers requested per batch.
    pub batch_size: usize,

    /// Stop as soon as a batch returns fewer messages than requested.
    ///
    /// When false, the reader stops only on a batch that returns nothing,
    /// which reads past gaps left by deleted messages at the cost of one
    /// extra fetch at the end.
    pub stop_on_short_batch: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            stop_on_short_batch: true,
        }
    }
}

impl ReaderConfig {
    /// Creates a config with the given batch size.
    #[must_use]
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }
}

/// Reader position. Owned by exactly one reader.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    /// Next identifier to request.
    current: i32,
    /// Messages left to emit.
    remaining: usize,
}

/// Single-pass reader over a chat's history.
pub struct HistoryReader<'a, F: MessageFetcher + ?Sized> {
    fetcher: &'a F,
    chat: ChatId,
    cursor: Cursor,
    config: ReaderConfig,
    buffer: VecDeque<F::Message>,
    exhausted: bool,
}

impl<'a, F: MessageFetcher + ?Sized> HistoryReader<'a, F> {
    /// Creates a reader with the default batch size.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidArgument`] if `offset` is negative.
    pub fn new(fetcher: &'a F, chat: ChatId, limit: usize, offset: i32) -> Result<Self, HistoryError> {
        Self::with_config(fetcher, chat, limit, offset, ReaderConfig::default())
    }

    /// Creates a reader with explicit tunables.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidArgument`] if `offset` is negative or
    /// the batch size is zero. No fetch is issued in that case.
    pub fn with_config(
        fetcher: &'a F,
        chat: ChatId,
        limit: usize,
        offset: i32,
        config: ReaderConfig,
    ) -> Result<Self, HistoryError> {
        if offset < 0 {
            return Err(HistoryError::InvalidArgument(format!(
                "offset must be >= 0, got {offset}"
            )));
        }
        if config.batch_size == 0 {
            return Err(HistoryError::InvalidArgument(
                "batch size must be > 0".to_owned(),
            ));
        }

        debug!("Reading up to {} messages from {} starting at {}", limit, chat, offset);

        Ok(Self {
            fetcher,
            chat,
            cursor: Cursor {
                current: offset,
                remaining: limit,
            },
            config,
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Returns the next message, fetching a new batch when the buffer is empty.
    ///
    /// Returns `None` once the limit is reached or the chat is exhausted. A
    /// fetch failure is returned once, after which the reader is finished.
    pub async fn next_message(&mut self) -> Option<Result<F::Message, HistoryError>> {
        loop {
            if let Some(message) = self.buffer.pop_front() {
                self.cursor.remaining -= 1;
                return Some(Ok(message));
            }

            if self.is_finished() {
                return None;
            }

            if let Err(e) = self.fill_buffer().await {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }

    /// Converts the reader into a [`Stream`] of messages.
    pub fn into_stream(self) -> impl Stream<Item = Result<F::Message, HistoryError>> {
        futures::stream::unfold(self, |mut reader| async move {
            let item = reader.next_message().await?;
            Some((item, reader))
        })
    }

    /// Identifier the next batch will start at.
    #[must_use]
    pub fn position(&self) -> i32 {
        self.cursor.current
    }

    /// Number of messages still allowed to be emitted.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cursor.remaining
    }

    /// True once no further messages will be produced.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.buffer.is_empty() && (self.exhausted || self.cursor.remaining == 0)
    }

    /// Issues exactly one fetch for the next batch.
    async fn fill_buffer(&mut self) -> Result<(), HistoryError> {
        let start = self.cursor.current;
        let wanted = self.config.batch_size.min(self.cursor.remaining);
        let span = i32::try_from(wanted).unwrap_or(i32::MAX);
        let end = start.saturating_add(span);

        if end <= start {
            // Identifier space exhausted.
            self.exhausted = true;
            return Ok(());
        }

        let ids: Vec<i32> = (start..end).collect();
        let requested = ids.len();
        let expected = requested - usize::from(start == 0);
        trace!("Fetching {} ids [{}, {}) from {}", requested, start, end, self.chat);

        let mut messages = self
            .fetcher
            .fetch(&self.chat, &ids)
            .await
            .map_err(|source| HistoryError::Fetch { start, source })?;

        self.cursor.current = end;

        let received = messages.len();
        if received == 0 || (self.config.stop_on_short_batch && received < expected) {
            debug!(
                "Batch [{}, {}) returned {}/{} messages, end of history",
                start, end, received, expected
            );
            self.exhausted = true;
        }

        messages.truncate(self.cursor.remaining);
        self.buffer.extend(messages);
        Ok(())
    }
}

impl<F: MessageFetcher + ?Sized> std::fmt::Debug for HistoryReader<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryReader")
            .field("chat", &self.chat)
            .field("cursor", &self.cursor)
            .field("config", &self.config)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;

    /// In-memory chat whose messages have identifiers `1..=last_id`.
    struct MockChat {
        last_id: i32,
        deleted: Vec<i32>,
        fail_on_call: Option<usize>,
        calls: Mutex<Vec<Vec<i32>>>,
    }

    impl MockChat {
        fn new(last_id: i32) -> Self {
            Self {
                last_id,
                deleted: Vec::new(),
                fail_on_call: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<i32>> {
            self.calls.lock().unwrap().clone()
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.calls().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl MessageFetcher for MockChat {
        type Message = i32;

        async fn fetch(&self, _chat: &ChatId, ids: &[i32]) -> Result<Vec<i32>, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(ids.to_vec());
                calls.len()
            };

            if self.fail_on_call == Some(call) {
                return Err("connection reset".into());
            }

            Ok(ids
                .iter()
                .copied()
                .filter(|id| (1..=self.last_id).contains(id) && !self.deleted.contains(id))
                .collect())
        }
    }

    fn chat() -> ChatId {
        ChatId::Handle("test_chat".to_owned())
    }

    async fn collect(reader: HistoryReader<'_, MockChat>) -> Vec<i32> {
        reader
            .into_stream()
            .map(|item| item.unwrap())
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn test_zero_limit_is_empty_without_fetching() {
        let source = MockChat::new(1000);
        let reader = HistoryReader::new(&source, chat(), 0, 0).unwrap();
        assert!(reader.is_finished());

        assert!(collect(reader).await.is_empty());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_yields_at_most_limit_in_increasing_order() {
        let source = MockChat::new(1000);
        let reader = HistoryReader::new(&source, chat(), 250, 0).unwrap();
        let ids = collect(reader).await;

        assert!(ids.len() <= 250);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_batch_sizes_follow_remaining() {
        let source = MockChat::new(10_000);
        let reader = HistoryReader::new(&source, chat(), 450, 1).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids.len(), 450);
        assert_eq!(source.batch_sizes(), vec![200, 200, 50]);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&450));
    }

    #[tokio::test]
    async fn test_ranges_are_exclusive_and_contiguous() {
        let source = MockChat::new(10_000);
        let reader = HistoryReader::new(&source, chat(), 450, 1).unwrap();
        collect(reader).await;

        let calls = source.calls();
        assert_eq!(calls[0].first(), Some(&1));
        assert_eq!(calls[0].last(), Some(&200));
        assert_eq!(calls[1].first(), Some(&201));
        assert_eq!(calls[2].last(), Some(&450));
    }

    #[tokio::test]
    async fn test_offset_sets_first_requested_id() {
        let source = MockChat::new(1000);
        let reader = HistoryReader::new(&source, chat(), 10, 5).unwrap();
        let ids = collect(reader).await;

        assert_eq!(source.calls()[0].first(), Some(&5));
        assert!(ids[0] >= 5);
        assert_eq!(ids, (5..15).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_short_batch_ends_reading() {
        let source = MockChat::new(250);
        let reader = HistoryReader::new(&source, chat(), 1000, 1).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids.len(), 250);
        // Second batch [201, 401) comes back with 50 messages.
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_short_first_batch_is_the_only_fetch() {
        let source = MockChat::new(50);
        let reader = HistoryReader::new(&source, chat(), 1000, 1).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids, (1..=50).collect::<Vec<_>>());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_gap_ends_reading_by_default() {
        let mut source = MockChat::new(600);
        source.deleted = (150..=260).collect();
        let reader = HistoryReader::new(&source, chat(), 10_000, 1).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids, (1..150).collect::<Vec<_>>());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_only_mode_reads_past_short_batch_until_empty() {
        let source = MockChat::new(250);
        let config = ReaderConfig {
            stop_on_short_batch: false,
            ..ReaderConfig::default()
        };
        let reader = HistoryReader::with_config(&source, chat(), 10_000, 1, config).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids.len(), 250);
        // Short batch at 201, then one empty batch at 401 ends it.
        assert_eq!(source.calls().len(), 3);
        assert!(source.calls()[2].iter().all(|id| *id > 250));
    }

    #[tokio::test]
    async fn test_empty_only_mode_reads_past_gaps() {
        let mut source = MockChat::new(600);
        source.deleted = (150..=260).collect();
        let config = ReaderConfig {
            stop_on_short_batch: false,
            ..ReaderConfig::default()
        };
        let reader = HistoryReader::with_config(&source, chat(), 10_000, 1, config).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids.len(), 600 - 111);
        assert!(!ids.contains(&200));
        assert_eq!(ids.last(), Some(&600));
    }

    #[tokio::test]
    async fn test_offset_zero_does_not_count_missing_first_id() {
        // Identifier 0 never exists, so a full first batch holds 199 messages.
        let source = MockChat::new(1000);
        let reader = HistoryReader::new(&source, chat(), 300, 0).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids.len(), 300);
        assert_eq!(ids[0], 1);
        assert_eq!(source.batch_sizes(), vec![200, 101]);
    }

    #[tokio::test]
    async fn test_offset_zero_short_chat_stops_after_one_fetch() {
        let source = MockChat::new(120);
        let reader = HistoryReader::new(&source, chat(), 1000, 0).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids.len(), 120);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_after_partial_results() {
        let mut source = MockChat::new(1000);
        source.fail_on_call = Some(2);
        let mut reader = HistoryReader::new(&source, chat(), 300, 1).unwrap();

        let mut yielded = Vec::new();
        let mut error = None;
        while let Some(item) = reader.next_message().await {
            match item {
                Ok(id) => yielded.push(id),
                Err(e) => error = Some(e),
            }
        }

        assert_eq!(yielded.len(), 200);
        assert!(matches!(error, Some(HistoryError::Fetch { start: 201, .. })));
        assert!(reader.next_message().await.is_none());
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_fetching() {
        let source = MockChat::new(10_000);
        let reader = HistoryReader::new(&source, chat(), 1000, 1).unwrap();
        let first: Vec<i32> = reader
            .into_stream()
            .take(5)
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(first, vec![1, 2, 3, 4, 5]);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_same_arguments_restart_deterministically() {
        let source = MockChat::new(500);
        let first = collect(HistoryReader::new(&source, chat(), 120, 30).unwrap()).await;
        let second = collect(HistoryReader::new(&source, chat(), 120, 30).unwrap()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_position_never_decreases() {
        let source = MockChat::new(1000);
        let mut reader =
            HistoryReader::with_config(&source, chat(), 95, 10, ReaderConfig::with_batch_size(20))
                .unwrap();

        let mut last = reader.position();
        while let Some(item) = reader.next_message().await {
            item.unwrap();
            assert!(reader.position() >= last);
            last = reader.position();
        }
        assert_eq!(reader.remaining(), 0);
        assert_eq!(source.batch_sizes(), vec![20, 20, 20, 20, 15]);
    }

    #[test]
    fn test_invalid_arguments_fail_fast() {
        let source = MockChat::new(10);
        assert!(matches!(
            HistoryReader::new(&source, chat(), 10, -1),
            Err(HistoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            HistoryReader::with_config(&source, chat(), 10, 0, ReaderConfig::with_batch_size(0)),
            Err(HistoryError::InvalidArgument(_))
        ));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_identifier_space_end() {
        let source = MockChat::new(i32::MAX);
        let reader = HistoryReader::new(&source, chat(), 1000, i32::MAX - 10).unwrap();
        let ids = collect(reader).await;

        assert_eq!(ids.len(), 10);
        assert_eq!(ids.last(), Some(&(i32::MAX - 1)));
    }
}
