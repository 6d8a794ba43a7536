//! アドレス空間(管理対象のバイト列)とハンドル.
use std::ops::Range;

use crate::word::{WordSize, MAX_WORDS};
use crate::{ErrorKind, Result};

/// `allocate`が返す、割当済み領域の先頭アドレス.
///
/// 値は`memory_start + offset * word_size`で計算される.
///
/// # 注意
///
/// ハンドルは対応する`free`の呼び出し、あるいは`shutdown`(および再`initialize`)によって無効となる.
/// 無効となったハンドルを使わないことは利用者の責務である.
/// (安全なアクセサ群は、ブロックテーブルと照合した上で`ErrorKind::InvalidAddress`を返す)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(usize);
impl Handle {
    /// 任意のアドレスから`Handle`を生成する.
    pub fn from_address(address: usize) -> Self {
        Handle(address)
    }

    /// ハンドルが指すアドレスを返す.
    pub fn address(self) -> usize {
        self.0
    }

    /// ハンドルが指すアドレスをポインタとして返す.
    pub fn as_ptr(self) -> *const u8 {
        self.0 as *const u8
    }
}

/// 管理対象となる連続したアドレス空間.
///
/// 内部のバッファは、このインスタンスが排他的に所有しており、ドロップ時に解放される.
#[derive(Debug)]
pub struct AddressSpace {
    word_size: WordSize,
    storage: Vec<u8>,
}
impl AddressSpace {
    /// `size_in_words`ワード分の(ゼロ初期化済みの)アドレス空間を確保する.
    ///
    /// # Errors
    ///
    /// `size_in_words`が`0`ないし`MAX_WORDS`を超える場合には、
    /// 種類が`ErrorKind::InvalidInput`のエラーが返される.
    ///
    /// バッファの確保に失敗した場合には、種類が`ErrorKind::Other`のエラーが返される.
    pub fn new(word_size: WordSize, size_in_words: u32) -> Result<Self> {
        track_assert!(size_in_words > 0, ErrorKind::InvalidInput);
        track_assert!(
            size_in_words <= MAX_WORDS,
            ErrorKind::InvalidInput,
            "size_in_words:{}, max:{}",
            size_in_words,
            MAX_WORDS
        );
        let capacity = word_size.to_bytes(size_in_words) as usize;
        let mut storage = Vec::new();
        track!(storage.try_reserve_exact(capacity).map_err(crate::Error::from))?;
        storage.resize(capacity, 0);
        Ok(AddressSpace { word_size, storage })
    }

    /// ワードサイズを返す.
    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    /// 容量をバイト単位で返す.
    pub fn capacity(&self) -> u32 {
        self.storage.len() as u32
    }

    /// 容量をワード単位で返す.
    pub fn capacity_words(&self) -> u32 {
        self.word_size.to_words(self.capacity())
    }

    /// 先頭アドレスを返す.
    pub fn start(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    /// ワード単位のオフセットに対応するハンドルを返す.
    pub fn handle(&self, offset: u32) -> Handle {
        let byte_offset = self.word_size.to_bytes(offset) as usize;
        Handle(self.start() as usize + byte_offset)
    }

    /// ハンドルをワード単位のオフセットに変換する.
    ///
    /// ハンドルが空間外を指している、ないしワード境界に沿っていない場合には`None`が返される.
    pub fn offset_of(&self, handle: Handle) -> Option<u32> {
        let byte_offset = handle.address().checked_sub(self.start() as usize)?;
        if byte_offset >= self.storage.len() || !self.word_size.is_aligned(byte_offset as u64) {
            return None;
        }
        Some(self.word_size.to_words(byte_offset as u32))
    }

    pub(crate) fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.storage[range]
    }

    pub(crate) fn bytes_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        &mut self.storage[range]
    }
}
