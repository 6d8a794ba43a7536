//! 割当の最小単位である"ワード"関連の構成要素.
use crate::{ErrorKind, Result};

/// アドレス空間が保持可能なワード数の上限.
///
/// 空き領域記述子およびビットマップのヘッダは16bit幅の値で構成されるため、
/// それを超える数のワードを持つアドレス空間は表現できない.
pub const MAX_WORDS: u32 = 0xFFFF;

/// [`MemoryManager`]のワードサイズ(バイト単位)を表現するための構造体.
///
/// 割当要求のサイズは、このワードサイズの倍数である必要がある.
///
/// [`MemoryManager`]: ../manager/struct.MemoryManager.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WordSize(u16);
impl WordSize {
    /// 許容されるワードサイズの最小値.
    ///
    /// また`WordSize::default()`で使われる値でもある.
    pub const MIN: u16 = 1;

    /// 最小のワードサイズを持つ`WordSize`インスタンスを返す.
    ///
    /// # Examples
    ///
    /// ```
    /// use memmgr::word::WordSize;
    ///
    /// assert_eq!(WordSize::min().as_u16(), WordSize::MIN);
    /// ```
    pub fn min() -> Self {
        WordSize(Self::MIN)
    }

    /// 指定された値のワードサイズを表現する`WordSize`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// `word_size`が`0`の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    ///
    /// # Examples
    ///
    /// ```
    /// use memmgr::ErrorKind;
    /// use memmgr::word::WordSize;
    ///
    /// assert_eq!(WordSize::new(4).ok().map(|w| w.as_u16()), Some(4));
    /// assert_eq!(WordSize::new(0).err().map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new(word_size: u16) -> Result<Self> {
        track_assert!(word_size >= Self::MIN, ErrorKind::InvalidInput);
        Ok(WordSize(word_size))
    }

    /// ワードサイズ値を`u16`に変換して返す.
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// ワードサイズ値を`u32`に変換して返す.
    pub fn as_u32(self) -> u32 {
        u32::from(self.0)
    }

    /// 指定バイト数がワード境界に沿っているかどうかを判定する.
    ///
    /// # Examples
    ///
    /// ```
    /// use memmgr::word::WordSize;
    ///
    /// let word_size = WordSize::new(4).unwrap();
    /// assert!(word_size.is_aligned(0));
    /// assert!(word_size.is_aligned(16));
    /// assert!(!word_size.is_aligned(6));
    /// ```
    pub fn is_aligned(self, bytes: u64) -> bool {
        bytes % u64::from(self.0) == 0
    }

    /// バイト数をワード数に変換する.
    ///
    /// 端数は切り捨てられる.
    pub fn to_words(self, bytes: u32) -> u32 {
        bytes / self.as_u32()
    }

    /// ワード数をバイト数に変換する.
    pub fn to_bytes(self, words: u32) -> u32 {
        words * self.as_u32()
    }
}
impl Default for WordSize {
    fn default() -> Self {
        Self::min()
    }
}
