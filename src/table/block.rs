//! Block

use crate::word::WordSize;

/// アドレス空間を分割する一つの領域.
///
/// ブロック群は、アドレス空間全体を隙間無く、かつ重なり無く覆う.
/// 隣接関係は`offset`と`size`からのみ判断される.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
    /// 開始位置（ワード単位）
    pub offset: u32,

    /// 長さ（バイト単位）
    pub size: u32,

    /// 割当済みかどうか
    pub allocated: bool,
}
impl Block {
    /// 新しい`Block`インスタンスを生成する.
    pub fn new(offset: u32, size: u32, allocated: bool) -> Self {
        Block {
            offset,
            size,
            allocated,
        }
    }

    /// ブロックの長さをワード単位で返す.
    pub fn size_in_words(&self, word_size: WordSize) -> u32 {
        word_size.to_words(self.size)
    }

    /// ブロックの終端位置（ワード単位）を返す.
    ///
    /// **注意**: ブロックは [offset, end) の領域を用いる.
    pub fn end(&self, word_size: WordSize) -> u32 {
        self.offset + self.size_in_words(word_size)
    }

    /// 空き領域かどうかを判定する.
    pub fn is_free(&self) -> bool {
        !self.allocated
    }

    /// 先頭から`size`バイト分を割り当てて、残りの空き領域を返す.
    ///
    /// 自身は割当済みブロックに変換される.
    ///
    /// # Panics
    ///
    /// `size`が`self.size`を超えている場合には、現在のスレッドがパニックする.
    pub(crate) fn split_front(&mut self, size: u32, word_size: WordSize) -> Option<Block> {
        assert!(size <= self.size);
        let rest = if size < self.size {
            Some(Block::new(
                self.offset + word_size.to_words(size),
                self.size - size,
                false,
            ))
        } else {
            None
        };
        self.size = size;
        self.allocated = true;
        rest
    }
}
