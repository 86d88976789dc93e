//! Item source, transformer and sink traits
//!
//! A chunk-oriented step pulls items from an [`ItemReader`], passes each one
//! through an [`ItemProcessor`] and hands the survivors to an [`ItemWriter`]
//! one chunk at a time.

use async_trait::async_trait;
use std::collections::VecDeque;

use super::fault::Fault;
use crate::error::Result;

/// One pull from a reader
#[derive(Debug, Clone, PartialEq)]
pub enum ReadItem<T> {
    /// A well-formed item
    Item(T),
    /// A raw record that could not be parsed; the reader moves past it
    Fault(Fault),
}

/// Pull-based record source
///
/// `read` yields items in source order and `Ok(None)` once exhausted. An
/// `Err` is an unrecoverable source failure, as opposed to a parse fault.
#[async_trait]
pub trait ItemReader<T>: Send {
    /// Prepare the source (open files, run the first query)
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<ReadItem<T>>>;
}

/// Pure per-item transformation
///
/// Returning `None` filters the item out: it is counted as read but never
/// reaches the writer.
pub trait ItemProcessor<I, O>: Send + Sync {
    fn process(&self, item: I) -> Option<O>;
}

/// Identity transformation
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughProcessor;

impl<T> ItemProcessor<T, T> for PassThroughProcessor {
    fn process(&self, item: T) -> Option<T> {
        Some(item)
    }
}

/// Chunk sink
///
/// Each `write` call receives one complete chunk and must persist all of it
/// or none of it.
#[async_trait]
pub trait ItemWriter<T>: Send {
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn write(&mut self, items: &[T]) -> Result<()>;

    /// Flush and release the sink after the last chunk
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Reader over a pre-built list of items and faults
#[derive(Debug, Default)]
pub struct ListItemReader<T> {
    items: VecDeque<ReadItem<T>>,
}

impl<T> ListItemReader<T> {
    pub fn new(items: impl IntoIterator<Item = ReadItem<T>>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Reader yielding only well-formed items
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        Self::new(items.into_iter().map(ReadItem::Item))
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
impl<T: Send> ItemReader<T> for ListItemReader<T> {
    async fn read(&mut self) -> Result<Option<ReadItem<T>>> {
        Ok(self.items.pop_front())
    }
}

/// Writer that keeps every chunk it receives in memory
#[derive(Debug, Default)]
pub struct ListItemWriter<T> {
    chunks: Vec<Vec<T>>,
    closed: bool,
}

impl<T> ListItemWriter<T> {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            closed: false,
        }
    }

    /// Chunks in the order they were written
    pub fn chunks(&self) -> &[Vec<T>] {
        &self.chunks
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.chunks.iter().flatten()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> ItemWriter<T> for ListItemWriter<T> {
    async fn write(&mut self, items: &[T]) -> Result<()> {
        self.chunks.push(items.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_reader_preserves_order() {
        let mut reader = ListItemReader::new(vec![
            ReadItem::Item(1),
            ReadItem::Fault(Fault::new(2, "x", "bad")),
            ReadItem::Item(3),
        ]);
        reader.open().await.unwrap();

        assert_eq!(reader.read().await.unwrap(), Some(ReadItem::Item(1)));
        assert!(matches!(
            reader.read().await.unwrap(),
            Some(ReadItem::Fault(f)) if f.position == 2
        ));
        assert_eq!(reader.read().await.unwrap(), Some(ReadItem::Item(3)));
        assert_eq!(reader.read().await.unwrap(), None);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_pass_through() {
        assert_eq!(PassThroughProcessor.process("abc"), Some("abc"));
    }

    #[tokio::test]
    async fn test_list_writer_keeps_chunks() {
        let mut writer = ListItemWriter::new();
        writer.write(&[1, 2]).await.unwrap();
        writer.write(&[3]).await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(writer.chunks(), &[vec![1, 2], vec![3]]);
        assert_eq!(writer.items().count(), 3);
        assert!(writer.is_closed());
    }
}
