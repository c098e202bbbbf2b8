//! Per-connection reassembly contexts with LRU recycling.

use tracing::{debug, warn};

use crate::transport::{Segment, SeriesAssembler};

/// Reassembly state for one (source, destination) address pair.
#[derive(Debug)]
pub struct Context {
    pub src: u16,
    pub dst: u16,
    /// Deep copy of the most recent segment; owned here so it survives
    /// the parse that produced it
    pub(crate) last_segment: Option<Segment>,
    /// In-flight series recognizer, present while a series is open
    pub(crate) assembler: Option<SeriesAssembler>,
    /// Tokens fed to `assembler` by earlier segments
    pub(crate) tokens_fed: u64,
    /// Raw link-frame bytes of the fragment in progress
    pub(crate) raw: Vec<u8>,
}

impl Context {
    fn new(src: u16, dst: u16) -> Self {
        Self {
            src,
            dst,
            last_segment: None,
            assembler: None,
            tokens_fed: 0,
            raw: Vec::new(),
        }
    }

    /// Raw frame bytes accumulated for the current fragment
    pub fn pending_raw(&self) -> &[u8] {
        &self.raw
    }

    /// Drop all reassembly state without emitting anything.
    fn reset(&mut self) {
        self.assembler = None;
        self.tokens_fed = 0;
        self.last_segment = None;
        self.raw.clear();
    }
}

/// Table statistics
#[derive(Debug, Clone, Default)]
pub struct TableStats {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

/// MRU-ordered context table, capped at a fixed capacity.
///
/// The head of the list is the most recently used entry; recycling takes
/// the tail.
#[derive(Debug)]
pub struct ContextTable {
    entries: Vec<Context>,
    max: usize,
    pub stats: TableStats,
}

impl ContextTable {
    pub fn new(max: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max),
            max,
            stats: TableStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate contexts from most to least recently used
    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.entries.iter()
    }

    /// Find the context for an address pair, creating or recycling one if
    /// needed, and promote it to the head of the list.
    pub fn lookup_or_create(&mut self, src: u16, dst: u16) -> &mut Context {
        self.stats.lookups += 1;

        if let Some(i) = self
            .entries
            .iter()
            .position(|c| c.src == src && c.dst == dst)
        {
            self.stats.hits += 1;
            let ctx = self.entries.remove(i);
            self.entries.insert(0, ctx);
        } else if self.entries.len() < self.max {
            self.stats.misses += 1;
            self.stats.inserts += 1;
            debug!("new context {} -> {}", src, dst);
            self.entries.insert(0, Context::new(src, dst));
        } else {
            self.stats.misses += 1;
            self.stats.evictions += 1;
            let mut ctx = self.entries.pop().expect("capacity is nonzero");
            if !ctx.raw.is_empty() {
                warn!(
                    "context {} -> {} recycled with {} raw bytes dropped",
                    ctx.src,
                    ctx.dst,
                    ctx.raw.len()
                );
            }
            ctx.reset();
            ctx.src = src;
            ctx.dst = dst;
            self.entries.insert(0, ctx);
        }

        &mut self.entries[0]
    }

    /// Drop every context, abandoning in-flight series.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_creates_then_hits() {
        let mut table = ContextTable::new(4);
        table.lookup_or_create(1, 2);
        assert_eq!(table.len(), 1);
        table.lookup_or_create(1, 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.stats.hits, 1);
        assert_eq!(table.stats.inserts, 1);
    }

    #[test]
    fn test_direction_matters() {
        let mut table = ContextTable::new(4);
        table.lookup_or_create(1, 2);
        table.lookup_or_create(2, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_hit_promotes_to_head() {
        let mut table = ContextTable::new(4);
        table.lookup_or_create(1, 2);
        table.lookup_or_create(3, 4);
        table.lookup_or_create(1, 2);
        let order: Vec<(u16, u16)> = table.iter().map(|c| (c.src, c.dst)).collect();
        assert_eq!(order, vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn test_full_table_recycles_lru() {
        let mut table = ContextTable::new(2);
        table.lookup_or_create(1, 2);
        table.lookup_or_create(3, 4);
        table.lookup_or_create(5, 6); // (1,2) is the tail and gets recycled
        assert_eq!(table.len(), 2);
        assert_eq!(table.stats.evictions, 1);
        let order: Vec<(u16, u16)> = table.iter().map(|c| (c.src, c.dst)).collect();
        assert_eq!(order, vec![(5, 6), (3, 4)]);
    }

    #[test]
    fn test_recycled_context_is_clean() {
        let mut table = ContextTable::new(1);
        {
            let ctx = table.lookup_or_create(1, 2);
            ctx.raw.extend_from_slice(b"pending");
            ctx.tokens_fed = 5;
            ctx.last_segment = Some(crate::transport::Segment {
                fir: true,
                fin: false,
                seq: 0,
                payload: vec![1],
            });
            ctx.assembler = Some(SeriesAssembler::start());
        }
        let ctx = table.lookup_or_create(9, 9);
        assert_eq!((ctx.src, ctx.dst), (9, 9));
        assert!(ctx.raw.is_empty());
        assert_eq!(ctx.tokens_fed, 0);
        assert!(ctx.last_segment.is_none());
        assert!(ctx.assembler.is_none());
    }
}
