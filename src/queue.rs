use crate::entry::EntryNode;

use generational_arena::{Arena, Index};

/// Which of an entry's two link pairs a queue threads through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueKind {
  Access,
  Write,
}

/// An intrusive, time-ordered queue over a segment's entry arena.
///
/// Nodes live in the arena; the queue owns only the head and tail indices
/// and relinks through the `Links` embedded in each entry, giving O(1)
/// push, unlink, and move-to-back under the segment write lock. The head is
/// always the oldest entry for the queue's ordering (least recently written
/// or least recently used), so expiration and size eviction both sweep from
/// the front.
#[derive(Debug)]
pub(crate) struct OrderQueue {
  kind: QueueKind,
  head: Option<Index>,
  tail: Option<Index>,
}

impl OrderQueue {
  pub(crate) fn new(kind: QueueKind) -> Self {
    Self {
      kind,
      head: None,
      tail: None,
    }
  }

  #[inline]
  pub(crate) fn peek_front(&self) -> Option<Index> {
    self.head
  }

  /// Appends `idx` as the newest entry. The entry must not already be linked.
  pub(crate) fn push_back<K, V>(&mut self, entries: &mut Arena<EntryNode<K, V>>, idx: Index) {
    debug_assert!(!self.is_linked(entries, idx));
    let kind = self.kind;
    match self.tail {
      Some(tail) => {
        entries[tail].links_mut(kind).next = Some(idx);
        let links = entries[idx].links_mut(kind);
        links.prev = Some(tail);
        links.next = None;
        self.tail = Some(idx);
      }
      None => {
        let links = entries[idx].links_mut(kind);
        links.prev = None;
        links.next = None;
        self.head = Some(idx);
        self.tail = Some(idx);
      }
    }
  }

  /// Detaches `idx` from the queue. A no-op if the entry is not linked.
  pub(crate) fn unlink<K, V>(&mut self, entries: &mut Arena<EntryNode<K, V>>, idx: Index) {
    if !self.is_linked(entries, idx) {
      return;
    }
    let kind = self.kind;
    let (prev, next) = {
      let links = entries[idx].links(kind);
      (links.prev, links.next)
    };
    match prev {
      Some(prev) => entries[prev].links_mut(kind).next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => entries[next].links_mut(kind).prev = prev,
      None => self.tail = prev,
    }
    let links = entries[idx].links_mut(kind);
    links.prev = None;
    links.next = None;
  }

  /// Moves `idx` to the tail, linking it first if necessary.
  pub(crate) fn requeue<K, V>(&mut self, entries: &mut Arena<EntryNode<K, V>>, idx: Index) {
    if self.tail == Some(idx) {
      return;
    }
    self.unlink(entries, idx);
    self.push_back(entries, idx);
  }

  /// Drops all links without touching the arena contents.
  pub(crate) fn reset(&mut self) {
    self.head = None;
    self.tail = None;
  }

  fn is_linked<K, V>(&self, entries: &Arena<EntryNode<K, V>>, idx: Index) -> bool {
    let links = entries[idx].links(self.kind);
    links.prev.is_some() || links.next.is_some() || self.head == Some(idx)
  }
}
