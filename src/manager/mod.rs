//! 利用者が直接操作するメモリマネージャ.
use slog::Logger;
use std::io::Write;
use std::path::Path;

pub use self::builder::MemoryManagerBuilder;

use crate::codec::{Bitmap, HoleList};
use crate::dump::MapDump;
use crate::metrics::AllocatorMetrics;
use crate::space::{AddressSpace, Handle};
use crate::strategy::PlacementStrategy;
use crate::table::{Block, BlockTable};
use crate::word::WordSize;
use crate::{ErrorKind, Result};

mod builder;

/// 連続したアドレス空間を管理するメモリマネージャ.
///
/// 生成直後は未初期化状態であり、`initialize`によってアドレス空間が確保される.
///
/// # 注意
///
/// 内部で排他制御は行わないので、複数スレッドから操作する場合には、利用者側で同期を行う必要がある.
///
/// # Examples
///
/// ```
/// use memmgr::manager::MemoryManager;
/// use memmgr::strategy::PlacementStrategy;
/// use memmgr::word::WordSize;
///
/// let word_size = WordSize::new(4).unwrap();
/// let mut manager = MemoryManager::new(word_size, PlacementStrategy::BestFit);
/// manager.initialize(10).unwrap();
/// assert_eq!(manager.memory_limit(), 40);
///
/// let handle = manager.allocate(16).unwrap().unwrap();
/// assert_eq!(manager.hole_list().as_words(), &[1, 4, 6]);
///
/// manager.free(handle).unwrap();
/// assert!(manager.hole_list().is_all_free());
/// ```
#[derive(Debug)]
pub struct MemoryManager {
    word_size: WordSize,
    strategy: PlacementStrategy,
    memory: Option<Memory>,
    logger: Logger,
    metrics: AllocatorMetrics,
}
impl MemoryManager {
    /// デフォルト設定で、新しい`MemoryManager`インスタンスを生成する.
    pub fn new(word_size: WordSize, strategy: PlacementStrategy) -> Self {
        MemoryManagerBuilder::new()
            .word_size(word_size)
            .finish(strategy)
    }

    pub(crate) fn new_with_builder(
        builder: &MemoryManagerBuilder,
        strategy: PlacementStrategy,
        metrics: AllocatorMetrics,
    ) -> Self {
        MemoryManager {
            word_size: builder.word_size,
            strategy,
            memory: None,
            logger: builder.logger.clone(),
            metrics,
        }
    }

    /// `size_in_words`ワード分のアドレス空間を確保して、全体を一つの空き領域とする.
    ///
    /// 既に初期化済みの場合には、まず`shutdown`が行われる.
    /// (それまでに発行された全てのハンドルは無効となる)
    ///
    /// # Errors
    ///
    /// `size_in_words`が`0`ないし`word::MAX_WORDS`を超える場合には、
    /// 種類が`ErrorKind::InvalidInput`のエラーが返される.
    ///
    /// バッファの確保に失敗した場合には、種類が`ErrorKind::Other`のエラーが返される.
    pub fn initialize(&mut self, size_in_words: u32) -> Result<()> {
        if self.memory.is_some() {
            self.shutdown();
        }
        let space = track!(AddressSpace::new(self.word_size, size_in_words))?;
        let table = BlockTable::new(
            self.logger.clone(),
            self.metrics.clone(),
            self.word_size,
            space.capacity(),
        );
        self.metrics
            .capacity_bytes
            .set(f64::from(space.capacity()));
        info!(self.logger, "Initialized";
              "words" => size_in_words, "word_size" => self.word_size.as_u16(),
              "capacity" => space.capacity());
        self.memory = Some(Memory { space, table });
        Ok(())
    }

    /// 確保済みのアドレス空間を解放する.
    ///
    /// 未初期化の場合には何も行わない.
    pub fn shutdown(&mut self) {
        if let Some(memory) = self.memory.take() {
            info!(self.logger, "Shutdown";
                  "capacity" => memory.space.capacity(), "usage" => memory.table.usage());
            self.metrics.capacity_bytes.set(0.0);
            self.metrics.usage_bytes.set(0.0);
        }
    }

    /// 初期化済みかどうかを判定する.
    pub fn is_initialized(&self) -> bool {
        self.memory.is_some()
    }

    /// `size_in_bytes`バイト分の領域を割り当てる.
    ///
    /// 以下の場合には`Ok(None)`が返され、状態は変化しない:
    ///
    /// - 未初期化
    /// - `size_in_bytes`が`0`、ワードサイズの倍数ではない、あるいは容量を超えている
    /// - 配置戦略が適切な空き領域を見つけられなかった
    ///
    /// # Errors
    ///
    /// 配置戦略が、要求を満たす空き領域の先頭以外の位置を返した場合には、
    /// 種類が`ErrorKind::InconsistentState`のエラーが返される.
    pub fn allocate(&mut self, size_in_bytes: u32) -> Result<Option<Handle>> {
        let memory = if let Some(memory) = self.memory.as_mut() {
            memory
        } else {
            debug!(self.logger, "Not initialized"; "size" => size_in_bytes);
            return Ok(None);
        };
        let block = track!(memory.table.allocate(size_in_bytes, &mut self.strategy))?;
        Ok(block.map(|b| memory.space.handle(b.offset)))
    }

    /// `handle`が指す領域を解放する.
    ///
    /// # Errors
    ///
    /// `handle`が割当済み領域の先頭を指していない場合には、
    /// 種類が`ErrorKind::InvalidAddress`のエラーが返される.
    pub fn free(&mut self, handle: Handle) -> Result<()> {
        let offset = self
            .memory
            .as_ref()
            .and_then(|m| m.space.offset_of(handle));
        let (memory, offset) = match (self.memory.as_mut(), offset) {
            (Some(memory), Some(offset)) => (memory, offset),
            (memory, _) => {
                warn!(self.logger, "Rejected release request";
                      "handle" => format!("{:?}", handle), "initialized" => memory.is_some());
                self.metrics.invalid_requests.increment();
                track_panic!(
                    ErrorKind::InvalidAddress,
                    "Out of the address space: {:?}",
                    handle
                );
            }
        };
        track!(memory.table.release(offset))?;
        Ok(())
    }

    /// 配置戦略を差し替える.
    ///
    /// 以降の`allocate`呼び出しには、新しい戦略が使用される.
    pub fn set_strategy(&mut self, strategy: PlacementStrategy) {
        info!(self.logger, "Placement strategy replaced";
              "old" => format!("{:?}", self.strategy), "new" => format!("{:?}", strategy));
        self.strategy = strategy;
    }

    /// 現在の配置戦略を返す.
    pub fn strategy(&self) -> &PlacementStrategy {
        &self.strategy
    }

    /// 現在の空き領域記述子を返す.
    ///
    /// 未初期化の場合には、ホール数が`0`の記述子が返される.
    pub fn hole_list(&self) -> HoleList {
        self.memory
            .as_ref()
            .map_or_else(HoleList::no_holes, |m| m.table.hole_list())
    }

    /// 現在の割当状況を表すビットマップを返す.
    ///
    /// 未初期化の場合には、ペイロードが空のビットマップが返される.
    pub fn bitmap(&self) -> Bitmap {
        self.memory
            .as_ref()
            .map_or_else(Bitmap::empty, |m| m.table.bitmap())
    }

    /// 空き領域の一覧をテキストとして`writer`に書き出す.
    ///
    /// 空き領域が無い場合と、全体が空いている場合には、共に何も書き出されない.
    /// 詳細は[`MapDump`]を参照のこと.
    ///
    /// [`MapDump`]: ../dump/struct.MapDump.html
    pub fn dump_memory_map<W: Write>(&self, writer: W) -> Result<()> {
        track!(MapDump::new(&self.hole_list()).write_to(writer))
    }

    /// 空き領域の一覧をテキストとして`path`のファイルに書き出す.
    pub fn dump_memory_map_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        track!(MapDump::new(&self.hole_list()).write_to_file(path))
    }

    /// ワードサイズを返す.
    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    /// アドレス空間の先頭アドレスを返す.
    ///
    /// 未初期化の場合には`None`が返される.
    pub fn memory_start(&self) -> Option<*const u8> {
        self.memory.as_ref().map(|m| m.space.start())
    }

    /// アドレス空間の容量をバイト単位で返す.
    ///
    /// 未初期化の場合には`0`が返される.
    pub fn memory_limit(&self) -> u32 {
        self.memory.as_ref().map_or(0, |m| m.space.capacity())
    }

    /// 現在のブロック群を開始位置の昇順で返す.
    pub fn blocks(&self) -> Vec<Block> {
        self.memory
            .as_ref()
            .map_or_else(Vec::new, |m| m.table.blocks().cloned().collect())
    }

    /// `handle`が指す割当済み領域の内容を返す.
    ///
    /// # Errors
    ///
    /// `handle`が割当済み領域の先頭を指していない場合には、
    /// 種類が`ErrorKind::InvalidAddress`のエラーが返される.
    pub fn bytes(&self, handle: Handle) -> Result<&[u8]> {
        let memory = track_assert_some!(self.memory.as_ref(), ErrorKind::InvalidAddress);
        let range = track!(memory.allocated_range(handle))?;
        Ok(memory.space.bytes(range))
    }

    /// `handle`が指す割当済み領域の内容を、書き込み可能な形で返す.
    ///
    /// # Errors
    ///
    /// `bytes`メソッドと同様.
    pub fn bytes_mut(&mut self, handle: Handle) -> Result<&mut [u8]> {
        let memory = track_assert_some!(self.memory.as_mut(), ErrorKind::InvalidAddress);
        let range = track!(memory.allocated_range(handle))?;
        Ok(memory.space.bytes_mut(range))
    }

    /// メトリクスを返す.
    pub fn metrics(&self) -> &AllocatorMetrics {
        &self.metrics
    }
}

/// 初期化済みの`MemoryManager`が保持する状態.
#[derive(Debug)]
struct Memory {
    space: AddressSpace,
    table: BlockTable,
}
impl Memory {
    fn allocated_range(&self, handle: Handle) -> Result<std::ops::Range<usize>> {
        let block = self
            .space
            .offset_of(handle)
            .and_then(|offset| self.table.get(offset))
            .filter(|b| b.allocated);
        let block = track_assert_some!(block, ErrorKind::InvalidAddress, "{:?}", handle);
        let start = self.space.word_size().to_bytes(block.offset) as usize;
        Ok(start..start + block.size as usize)
    }
}

#[cfg(test)]
mod tests {
    use prometrics::metrics::MetricBuilder;
    use slog::{Discard, Logger};
    use tempdir::TempDir;
    use trackable::result::TestResult;

    use super::*;
    use crate::strategy;

    #[test]
    fn allocate_splits_and_free_merges() -> TestResult {
        let mut manager = MemoryManager::new(track!(WordSize::new(4))?, PlacementStrategy::BestFit);
        track!(manager.initialize(10))?;
        assert_eq!(manager.memory_limit(), 40);
        assert_eq!(manager.blocks(), vec![Block::new(0, 40, false)]);

        let handle = track!(manager.allocate(16))?.unwrap();
        assert_eq!(Some(handle.as_ptr()), manager.memory_start());
        assert_eq!(
            manager.blocks(),
            vec![Block::new(0, 16, true), Block::new(4, 24, false)]
        );

        track!(manager.free(handle))?;
        assert_eq!(manager.blocks(), vec![Block::new(0, 40, false)]);
        Ok(())
    }

    #[test]
    fn hole_list_and_dump_reflect_holes() -> TestResult {
        let mut manager = MemoryManager::new(WordSize::min(), PlacementStrategy::BestFit);
        track!(manager.initialize(100))?;
        let first = track!(manager.allocate(30))?.unwrap();
        let second = track!(manager.allocate(20))?.unwrap();
        assert_eq!(second.address() - first.address(), 30);

        track!(manager.free(first))?;
        assert_eq!(manager.hole_list().as_words(), &[2, 0, 30, 50, 50]);

        let mut buf = Vec::new();
        track!(manager.dump_memory_map(&mut buf))?;
        assert_eq!(buf, b"[0, 30] - [50, 50]");
        Ok(())
    }

    #[test]
    fn bitmap_tracks_allocated_words() -> TestResult {
        let mut manager = MemoryManager::new(track!(WordSize::new(2))?, PlacementStrategy::BestFit);
        track!(manager.initialize(8))?;
        assert_eq!(manager.bitmap().as_bytes(), &[0x01, 0x00, 0x00]);

        let handle = track!(manager.allocate(4))?.unwrap();
        assert_eq!(manager.bitmap().as_bytes(), &[0x01, 0x00, 0b0000_0011]);
        track!(manager.free(handle))?;
        assert_eq!(manager.bitmap().as_bytes(), &[0x01, 0x00, 0x00]);
        Ok(())
    }

    #[test]
    fn full_and_empty_spaces_dump_identically() -> TestResult {
        let mut manager = MemoryManager::new(WordSize::min(), PlacementStrategy::BestFit);
        track!(manager.initialize(16))?;

        let mut all_free = Vec::new();
        track!(manager.dump_memory_map(&mut all_free))?;

        track!(manager.allocate(16))?.unwrap();
        let mut all_allocated = Vec::new();
        track!(manager.dump_memory_map(&mut all_allocated))?;

        // 二つの状態は、ダンプ上は区別できない
        assert!(all_free.is_empty());
        assert_eq!(all_free, all_allocated);

        // 記述子では区別できる
        assert_eq!(manager.hole_list(), HoleList::no_holes());
        Ok(())
    }

    #[test]
    fn dump_to_file_works() -> TestResult {
        let dir = track_io!(TempDir::new("memmgr_test"))?;
        let path = dir.path().join("map.txt");

        let mut manager = MemoryManager::new(WordSize::min(), PlacementStrategy::WorstFit);
        track!(manager.initialize(10))?;
        let a = track!(manager.allocate(2))?.unwrap();
        track!(manager.allocate(3))?.unwrap();
        track!(manager.free(a))?;

        track!(manager.dump_memory_map_to_file(&path))?;
        assert_eq!(track_io!(std::fs::read_to_string(&path))?, "[0, 2] - [5, 5]");
        Ok(())
    }

    #[test]
    fn allocate_rejects_invalid_requests() -> TestResult {
        let mut manager = MemoryManager::new(track!(WordSize::new(4))?, PlacementStrategy::BestFit);
        assert_eq!(track!(manager.allocate(4))?, None);

        track!(manager.initialize(4))?;
        assert_eq!(track!(manager.allocate(0))?, None);
        assert_eq!(track!(manager.allocate(3))?, None);
        assert_eq!(track!(manager.allocate(20))?, None);
        assert!(track!(manager.allocate(16))?.is_some());
        assert_eq!(track!(manager.allocate(4))?, None);
        assert_eq!(manager.metrics().invalid_requests(), 3);
        assert_eq!(manager.metrics().nospace_failures(), 1);
        Ok(())
    }

    #[test]
    fn free_rejects_invalid_addresses() -> TestResult {
        let mut manager = MemoryManager::new(track!(WordSize::new(4))?, PlacementStrategy::BestFit);
        let dangling = Handle::from_address(0x1000);
        let e = manager.free(dangling).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidAddress));
        assert_eq!(manager.metrics().invalid_requests(), 1);

        track!(manager.initialize(10))?;
        let handle = track!(manager.allocate(8))?.unwrap();
        let inside = Handle::from_address(handle.address() + 4);
        let misaligned = Handle::from_address(handle.address() + 1);
        let outside = Handle::from_address(handle.address() + 40);
        for h in &[inside, misaligned, outside] {
            let e = manager.free(*h).err().map(|e| *e.kind());
            assert_eq!(e, Some(ErrorKind::InvalidAddress));
        }
        assert_eq!(manager.metrics().invalid_requests(), 4);
        assert_eq!(
            manager.blocks(),
            vec![Block::new(0, 8, true), Block::new(2, 32, false)]
        );

        track!(manager.free(handle))?;
        let e = manager.free(handle).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidAddress));
        assert_eq!(manager.metrics().invalid_requests(), 5);
        assert_eq!(manager.metrics().released_blocks(), 1);
        Ok(())
    }

    #[test]
    fn reinitialize_tears_down_previous_state() -> TestResult {
        let mut manager = MemoryManager::new(track!(WordSize::new(2))?, PlacementStrategy::BestFit);
        track!(manager.initialize(10))?;
        track!(manager.allocate(4))?.unwrap();
        track!(manager.allocate(6))?.unwrap();
        assert_eq!(manager.metrics().usage_bytes(), 10);

        track!(manager.initialize(20))?;
        assert_eq!(manager.memory_limit(), 40);
        assert_eq!(manager.blocks(), vec![Block::new(0, 40, false)]);
        assert_eq!(manager.metrics().usage_bytes(), 0);
        assert_eq!(manager.metrics().capacity_bytes(), 40);

        manager.shutdown();
        assert!(!manager.is_initialized());
        assert_eq!(manager.memory_limit(), 0);
        assert_eq!(manager.memory_start(), None);
        assert!(manager.blocks().is_empty());
        assert_eq!(manager.hole_list(), HoleList::no_holes());
        assert_eq!(manager.bitmap(), Bitmap::empty());
        assert_eq!(manager.metrics().capacity_bytes(), 0);

        // 二回目の`shutdown`は何もしない
        manager.shutdown();

        assert!(manager.initialize(0).is_err());
        assert!(!manager.is_initialized());
        Ok(())
    }

    #[test]
    fn set_strategy_changes_placement() -> TestResult {
        let mut manager = MemoryManager::new(WordSize::min(), PlacementStrategy::BestFit);
        track!(manager.initialize(20))?;

        // [0-7: 空き][7-8][8-13: 空き][13-14][14-20: 空き]
        let handles = (0..5)
            .map(|_| manager.allocate(1))
            .collect::<Result<Vec<_>>>();
        let handles = track!(handles)?;
        let a = track!(manager.allocate(2))?.unwrap();
        track!(manager.allocate(1))?.unwrap();
        let c = track!(manager.allocate(5))?.unwrap();
        track!(manager.allocate(1))?.unwrap();
        for h in handles.into_iter().flatten() {
            track!(manager.free(h))?;
        }
        track!(manager.free(a))?;
        track!(manager.free(c))?;
        assert_eq!(manager.hole_list().as_words(), &[3, 0, 7, 8, 5, 14, 6]);

        let start = manager.memory_start().unwrap() as usize;
        let best = track!(manager.allocate(5))?.unwrap();
        assert_eq!(best.address() - start, 8);
        track!(manager.free(best))?;

        manager.set_strategy(PlacementStrategy::WorstFit);
        let worst = track!(manager.allocate(5))?.unwrap();
        assert_eq!(worst.address() - start, 0);
        track!(manager.free(worst))?;

        manager.set_strategy(PlacementStrategy::custom(|size: u16, holes: &HoleList| {
            holes.holes().filter(|h| h.size >= size).last().map(|h| h.offset)
        }));
        let last = track!(manager.allocate(5))?.unwrap();
        assert_eq!(last.address() - start, 14);
        assert_eq!(format!("{:?}", manager.strategy()), "Custom(_)");
        Ok(())
    }

    #[test]
    fn broken_strategy_fails_fast() -> TestResult {
        let mut manager = MemoryManager::new(
            WordSize::min(),
            PlacementStrategy::custom(|_: u16, _: &HoleList| Some(1u16)),
        );
        track!(manager.initialize(10))?;

        // 全体が空いている間は戦略に問い合わせない
        let handle = track!(manager.allocate(4))?.unwrap();

        let e = manager.allocate(2).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InconsistentState));
        assert_eq!(
            manager.blocks(),
            vec![Block::new(0, 4, true), Block::new(4, 6, false)]
        );

        manager.set_strategy(PlacementStrategy::custom(strategy::first_fit));
        track!(manager.free(handle))?;
        assert!(track!(manager.allocate(2))?.is_some());
        Ok(())
    }

    #[test]
    fn bytes_are_accessible_through_handles() -> TestResult {
        let mut manager = MemoryManagerBuilder::new()
            .word_size(track!(WordSize::new(4))?)
            .logger(Logger::root(Discard, o!()))
            .metrics(MetricBuilder::new())
            .finish(PlacementStrategy::custom(strategy::NextFit::new()));
        track!(manager.initialize(16))?;

        let a = track!(manager.allocate(8))?.unwrap();
        let b = track!(manager.allocate(12))?.unwrap();
        track!(manager.bytes_mut(a))?.copy_from_slice(b"abcdefgh");
        track!(manager.bytes_mut(b))?.copy_from_slice(&[7; 12]);
        assert_eq!(track!(manager.bytes(a))?, b"abcdefgh");
        assert_eq!(track!(manager.bytes(b))?, &[7; 12][..]);

        track!(manager.free(a))?;
        let e = manager.bytes(a).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidAddress));
        Ok(())
    }

    #[test]
    fn metrics_are_updated() -> TestResult {
        let mut manager = MemoryManager::new(WordSize::min(), PlacementStrategy::BestFit);
        track!(manager.initialize(32))?;
        let a = track!(manager.allocate(8))?.unwrap();
        let b = track!(manager.allocate(8))?.unwrap();
        let c = track!(manager.allocate(8))?.unwrap();
        track!(manager.free(a))?;
        track!(manager.free(c))?;
        track!(manager.free(b))?;

        let m = manager.metrics();
        assert_eq!(m.allocated_blocks(), 3);
        assert_eq!(m.allocated_bytes(), 24);
        assert_eq!(m.released_blocks(), 3);
        assert_eq!(m.released_bytes(), 24);
        assert_eq!(m.coalesced_blocks(), 3);
        assert_eq!(m.usage_bytes(), 0);
        assert_eq!(m.capacity_bytes(), 32);
        Ok(())
    }
}
