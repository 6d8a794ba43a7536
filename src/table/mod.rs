//! ブロックテーブル.
//!
//! アドレス空間全体を分割するブロック群を保持し、割当(分割)と解放(併合)を担当する.
//!
//! テーブルが担当するのは領域の計算処理のみで、実際のバイト列の読み書き等を、この中で行うことは無い.
pub use self::block::Block;

use slog::Logger;
use std::collections::BTreeMap;

use crate::codec::{Bitmap, HoleList};
use crate::metrics::AllocatorMetrics;
use crate::strategy::Placement;
use crate::word::WordSize;
use crate::{ErrorKind, Result};

mod block;

/// アドレス空間を構成するブロック群を管理するテーブル.
///
/// ブロックは開始位置(ワード単位)をキーとした順序付きマップで保持されており、
/// 解放時の前後のブロックの探索は`O(log n)`で行われる.
///
/// # 不変条件
///
/// 全ての公開メソッドの呼び出し前後で、以下が成立する:
///
/// - ブロック群は`[0, capacity)`を隙間無く、かつ重なり無く覆う
/// - 隣接する二つのブロックが、共に空き領域であることは無い
#[derive(Debug)]
pub struct BlockTable {
    word_size: WordSize,
    capacity: u32,
    blocks: BTreeMap<u32, Block>,
    usage: u32,
    logger: Logger,
    metrics: AllocatorMetrics,
}
impl BlockTable {
    /// 全体が一つの空き領域となっているテーブルを生成する.
    ///
    /// `capacity`はバイト単位で、`word_size`の倍数である必要がある.
    pub fn new(
        logger: Logger,
        metrics: AllocatorMetrics,
        word_size: WordSize,
        capacity: u32,
    ) -> Self {
        debug_assert!(word_size.is_aligned(u64::from(capacity)));
        let mut blocks = BTreeMap::new();
        blocks.insert(0, Block::new(0, capacity, false));
        metrics.usage_bytes.set(0.0);
        BlockTable {
            word_size,
            capacity,
            blocks,
            usage: 0,
            logger,
            metrics,
        }
    }

    /// ワードサイズを返す.
    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    /// 容量(バイト単位)を返す.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 容量(ワード単位)を返す.
    pub fn capacity_words(&self) -> u32 {
        self.word_size.to_words(self.capacity)
    }

    /// 割当済みのバイト数を返す.
    pub fn usage(&self) -> u32 {
        self.usage
    }

    /// 全てのブロックを、開始位置の昇順で返す.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// 空き領域を、開始位置の昇順で返す.
    pub fn free_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values().filter(|b| b.is_free())
    }

    /// 開始位置が`offset`のブロックを返す.
    pub fn get(&self, offset: u32) -> Option<&Block> {
        self.blocks.get(&offset)
    }

    /// アドレス空間全体が、一つの空き領域となっているかどうかを判定する.
    pub fn is_all_free(&self) -> bool {
        self.blocks.len() == 1
            && self
                .blocks
                .get(&0)
                .map_or(false, |b| b.is_free() && b.size == self.capacity)
    }

    /// 空き領域が一つも存在しないかどうかを判定する.
    pub fn is_all_allocated(&self) -> bool {
        self.free_blocks().next().is_none()
    }

    /// 現在の空き領域記述子を返す.
    pub fn hole_list(&self) -> HoleList {
        HoleList::encode(self)
    }

    /// 現在の割当状況を表すビットマップを返す.
    pub fn bitmap(&self) -> Bitmap {
        Bitmap::encode(self)
    }

    /// `size`バイト分のブロックの割当を行う.
    ///
    /// 割当位置は`placement`によって決定される.
    /// ただし、全体が空いている場合には、戦略には問い合わせずに先頭が選択される.
    ///
    /// 以下の場合には`Ok(None)`が返され、テーブルの状態は変化しない:
    ///
    /// - `size`が`0`、ワードサイズの倍数ではない、あるいは容量を超えている
    /// - `placement`が適切な空き領域を見つけられなかった
    ///
    /// # Errors
    ///
    /// `placement`が選択した位置が、要求を満たす空き領域の先頭ではない場合には、
    /// 種類が`ErrorKind::InconsistentState`のエラーが返される.
    pub fn allocate<P>(&mut self, size: u32, placement: &mut P) -> Result<Option<Block>>
    where
        P: Placement + ?Sized,
    {
        if size == 0 || !self.word_size.is_aligned(u64::from(size)) || size > self.capacity {
            debug!(self.logger, "Rejected allocation request"; "size" => size);
            self.metrics.invalid_requests.increment();
            return Ok(None);
        }
        let size_in_words = self.word_size.to_words(size);

        let offset = if self.is_all_free() {
            0
        } else {
            let holes = self.hole_list();
            if let Some(offset) = placement.choose(size_in_words as u16, &holes) {
                u32::from(offset)
            } else {
                debug!(self.logger, "No hole fits"; "size" => size, "holes" => holes.hole_count());
                self.metrics.nospace_failures.increment();
                return Ok(None);
            }
        };

        let mut block = match self.blocks.get(&offset) {
            Some(b) if b.is_free() && b.size >= size => *b,
            found => {
                warn!(self.logger, "Placement chose an unusable offset";
                      "offset" => offset, "size" => size, "found" => format!("{:?}", found));
                track_panic!(
                    ErrorKind::InconsistentState,
                    "No free block of {} bytes starts at offset {}: found={:?}",
                    size,
                    offset,
                    found
                );
            }
        };
        if let Some(rest) = block.split_front(size, self.word_size) {
            self.blocks.insert(rest.offset, rest);
        }
        self.blocks.insert(block.offset, block);

        self.usage += size;
        self.metrics.count_allocation(size);
        self.metrics.usage_bytes.set(f64::from(self.usage));
        debug!(self.logger, "Allocated"; "offset" => block.offset, "size" => block.size);
        Ok(Some(block))
    }

    /// 開始位置が`offset`の割当済みブロックを解放する.
    ///
    /// 前後に空き領域が隣接している場合には、それらと併合される.
    /// 解放された(併合前の)ブロックが結果として返される.
    ///
    /// # Errors
    ///
    /// `offset`が割当済みブロックの先頭ではない場合には、
    /// 種類が`ErrorKind::InvalidAddress`のエラーが返される.
    pub fn release(&mut self, offset: u32) -> Result<Block> {
        let block = match self.blocks.get(&offset) {
            Some(b) if b.allocated => *b,
            found => {
                warn!(self.logger, "Rejected release request";
                      "offset" => offset, "found" => format!("{:?}", found));
                self.metrics.invalid_requests.increment();
                track_panic!(
                    ErrorKind::InvalidAddress,
                    "No allocated block starts at offset {}: found={:?}",
                    offset,
                    found
                );
            }
        };

        // 「`block`の始端」に一致する終端を持つブロックが`prev`、
        // 「`block`の終端」に一致する始端を持つブロックが`next`となる.
        // どちらも存在しない場合は、それぞれ空間の先頭ないし末尾に位置している.
        let word_size = self.word_size;
        let prev = self
            .blocks
            .range(..offset)
            .next_back()
            .map(|(_, b)| *b)
            .filter(|b| b.end(word_size) == offset && b.is_free());
        let next = self
            .blocks
            .get(&block.end(word_size))
            .cloned()
            .filter(|b| b.is_free());

        let merged = match (prev, next) {
            (Some(prev), Some(next)) => {
                Block::new(prev.offset, prev.size + block.size + next.size, false)
            }
            (Some(prev), None) => Block::new(prev.offset, prev.size + block.size, false),
            (None, Some(next)) => Block::new(block.offset, block.size + next.size, false),
            (None, None) => Block::new(block.offset, block.size, false),
        };
        let mut coalesced = 0;
        for neighbour in prev.iter().chain(next.iter()) {
            self.blocks.remove(&neighbour.offset);
            coalesced += 1;
        }
        self.blocks.remove(&block.offset);
        self.blocks.insert(merged.offset, merged);

        self.usage -= block.size;
        self.metrics.count_releasion(block.size, coalesced);
        self.metrics.usage_bytes.set(f64::from(self.usage));
        debug!(self.logger, "Released";
               "offset" => block.offset, "size" => block.size,
               "hole_offset" => merged.offset, "hole_size" => merged.size);
        Ok(block)
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let mut tail = 0;
        let mut prev_is_free = false;
        for (&offset, b) in &self.blocks {
            assert_eq!(offset, b.offset);
            assert_eq!(b.offset, tail, "gap or overlap at {:?}", b);
            assert!(b.size > 0);
            assert!(self.word_size.is_aligned(u64::from(b.size)));
            assert!(!(prev_is_free && b.is_free()), "uncoalesced hole at {:?}", b);
            prev_is_free = b.is_free();
            tail = b.end(self.word_size);
        }
        assert_eq!(tail, self.capacity_words());
        let total: u32 = self.blocks.values().map(|b| b.size).sum();
        assert_eq!(total, self.capacity);
        let used: u32 = self.blocks.values().filter(|b| b.allocated).map(|b| b.size).sum();
        assert_eq!(used, self.usage);
    }
}
