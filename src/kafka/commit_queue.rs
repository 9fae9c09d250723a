//! 推模式有序提交队列
//!
//! 每个分区维护一个按到达顺序排列的待提交队列。处理器可以乱序确认消息，
//! 但只有从队头开始连续确认的那一段才会被移出，并且只提交这一段中 offset 最大的消息。
//! 提交 offset N 即表示该分区所有 ≤ N 的消息都已处理完成，所以队头未确认时，
//! 后面已确认的消息只能继续等待。

use std::collections::{HashMap, VecDeque};

use crate::kafka::message::ConsumedMessage;

/// 已投递、尚未提交的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub message: ConsumedMessage,
    pub done: bool,
}

/// 单个分区的待提交队列
///
/// 队列内 offset 单调递增（由 broker 的分区内顺序保证），只在队尾追加、只从队头移除
#[derive(Debug, Default)]
pub struct PartitionQueue {
    entries: VecDeque<CommitEntry>,
}

impl PartitionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在队尾追加一条未确认的消息
    pub fn push(&mut self, message: ConsumedMessage) {
        self.entries.push_back(CommitEntry {
            message,
            done: false,
        });
    }

    /// 将指定 offset 标记为已确认，找不到时返回 false
    pub fn mark_done(&mut self, offset: i64) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.message.offset == offset)
        {
            Some(entry) => {
                entry.done = true;
                true
            }
            None => false,
        }
    }

    /// 从队头移除连续已确认的条目，返回最后移除的消息
    pub fn trim_done(&mut self) -> Option<ConsumedMessage> {
        let mut last_removed = None;
        while self.entries.front().is_some_and(|entry| entry.done) {
            last_removed = self.entries.pop_front().map(|entry| entry.message);
        }
        last_removed
    }

    /// 队列中是否有该 offset
    pub fn contains(&self, offset: i64) -> bool {
        self.entries.iter().any(|entry| entry.message.offset == offset)
    }

    pub fn head(&self) -> Option<&CommitEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitEntry> {
        self.entries.iter()
    }
}

/// 按分区组织的有序提交队列
#[derive(Debug, Default)]
pub struct FlowingCommitQueue {
    partitions: HashMap<i32, PartitionQueue>,
}

impl FlowingCommitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条已投递的消息（分区队列按需创建）
    pub fn on_message(&mut self, message: ConsumedMessage) {
        self.partitions
            .entry(message.partition)
            .or_default()
            .push(message);
    }

    /// 确认一条消息
    ///
    /// 返回本次需要提交的消息（队头连续已确认段中 offset 最大的一条）；
    /// 队头仍未确认，或者该消息不在队列中时返回 `None`
    pub fn acknowledge(&mut self, partition: i32, offset: i64) -> Option<ConsumedMessage> {
        let queue = self.partitions.get_mut(&partition)?;
        if !queue.mark_done(offset) {
            return None;
        }
        queue.trim_done()
    }

    /// 按消息确认，等价于 `acknowledge(message.partition, message.offset)`
    pub fn acknowledge_message(&mut self, message: &ConsumedMessage) -> Option<ConsumedMessage> {
        self.acknowledge(message.partition, message.offset)
    }

    /// 获取分区队列
    pub fn partition(&self, partition: i32) -> Option<&PartitionQueue> {
        self.partitions.get(&partition)
    }

    /// 消息是否在待提交队列中
    pub fn contains(&self, partition: i32, offset: i64) -> bool {
        self.partitions
            .get(&partition)
            .is_some_and(|queue| queue.contains(offset))
    }

    /// 所有分区中尚未提交的消息数
    pub fn pending(&self) -> usize {
        self.partitions.values().map(PartitionQueue::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(partition: i32, offset: i64) -> ConsumedMessage {
        ConsumedMessage::new("topic", partition, offset)
    }

    fn queue_with(partition: i32, offsets: &[i64]) -> FlowingCommitQueue {
        let mut queue = FlowingCommitQueue::new();
        for &offset in offsets {
            queue.on_message(message(partition, offset));
        }
        queue
    }

    fn offsets(queue: &FlowingCommitQueue, partition: i32) -> Vec<i64> {
        queue
            .partition(partition)
            .map(|q| q.iter().map(|e| e.message.offset).collect())
            .unwrap_or_default()
    }

    #[test]
    fn head_ack_commits_immediately() {
        let mut queue = queue_with(0, &[10, 11]);

        let committed = queue.acknowledge(0, 10);

        assert_eq!(committed.map(|m| m.offset), Some(10));
        assert_eq!(offsets(&queue, 0), vec![11]);
    }

    #[test]
    fn out_of_order_acks_wait_for_head() {
        let mut queue = queue_with(0, &[1, 2, 3, 4]);

        assert!(queue.acknowledge(0, 2).is_none());
        assert!(queue.acknowledge(0, 3).is_none());
        assert_eq!(queue.partition(0).map(PartitionQueue::len), Some(4));
        assert_eq!(
            queue.partition(0).and_then(PartitionQueue::head),
            Some(&CommitEntry {
                message: message(0, 1),
                done: false
            })
        );

        let committed = queue.acknowledge(0, 1);

        assert_eq!(committed.map(|m| m.offset), Some(3));
        assert_eq!(offsets(&queue, 0), vec![4]);
    }

    #[test]
    fn unknown_offset_is_noop() {
        let mut queue = queue_with(0, &[1, 2]);

        assert!(queue.acknowledge(0, 99).is_none());
        assert!(queue.acknowledge(7, 1).is_none());
        assert_eq!(offsets(&queue, 0), vec![1, 2]);
        assert!(queue.partition(0).is_some_and(|q| q.iter().all(|e| !e.done)));
    }

    #[test]
    fn duplicate_ack_after_trim_is_noop() {
        let mut queue = queue_with(0, &[1, 2]);

        assert_eq!(queue.acknowledge(0, 1).map(|m| m.offset), Some(1));
        assert!(queue.acknowledge(0, 1).is_none());
        assert_eq!(offsets(&queue, 0), vec![2]);
    }

    #[test]
    fn draining_whole_queue_leaves_it_empty() {
        let mut queue = queue_with(3, &[5, 6, 7]);

        assert!(queue.acknowledge(3, 7).is_none());
        assert!(queue.acknowledge(3, 6).is_none());
        assert_eq!(queue.acknowledge(3, 5).map(|m| m.offset), Some(7));
        assert!(queue.partition(3).is_some_and(PartitionQueue::is_empty));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn partitions_are_tracked_independently() {
        let mut queue = queue_with(0, &[1, 2]);
        for offset in [6, 7, 8, 9] {
            queue.on_message(message(1, offset));
        }

        assert!(queue.acknowledge(1, 7).is_none());
        assert!(queue.acknowledge(0, 2).is_none());
        assert!(queue.acknowledge(1, 8).is_none());
        assert_eq!(queue.acknowledge(1, 6).map(|m| m.offset), Some(8));

        assert_eq!(offsets(&queue, 1), vec![9]);
        assert_eq!(offsets(&queue, 0), vec![1, 2]);
        assert_eq!(queue.pending(), 3);
    }
}
