use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Write};

use crate::table::BlockTable;
use crate::{ErrorKind, Result};

/// ヘッダ(ペイロード長)を表現するのに必要なバイト数.
const HEADER_SIZE: usize = 2;

/// ワード毎の割当状況を表すビットマップ.
///
/// # フォーマット
///
/// ```text
/// [ペイロード長 (u16, リトルエンディアン)][ペイロード (ceil(N/8) バイト)]
/// ```
///
/// `N`はアドレス空間のワード数で、割当済みのワードが`1`、空いているワードが`0`となる.
///
/// ペイロードは、長さ`N`のベクタを末尾側から(i.e., ワード`w`を位置`N-1-w`に)詰めたものを、
/// 先頭から8ビットずつ区切って作られる.
/// 区切りの端数(`N % 8`ビット)は先頭側に生じ、ペイロードの最後のバイトとして格納される.
/// 結果として、ワード`w`の状態は`w / 8`バイト目の`w % 8`ビット目(最下位ビットが`0`)に位置する.
///
/// # Examples
///
/// ```
/// use memmgr::codec::Bitmap;
///
/// let bitmap = Bitmap::from_bytes(vec![2, 0, 0b1000_0011, 0b0000_0001]).unwrap();
/// assert_eq!(bitmap.payload_len(), 2);
/// assert_eq!(bitmap.is_allocated(0), Some(true));
/// assert_eq!(bitmap.is_allocated(2), Some(false));
/// assert_eq!(bitmap.is_allocated(7), Some(true));
/// assert_eq!(bitmap.is_allocated(8), Some(true));
/// assert_eq!(bitmap.is_allocated(16), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bitmap(Vec<u8>);
impl Bitmap {
    /// ブロックテーブルの現在の割当状況からビットマップを生成する.
    pub fn encode(table: &BlockTable) -> Self {
        let word_size = table.word_size();
        let words = table.capacity_words() as usize;
        let payload_len = (words + 7) / 8;

        let mut bytes = vec![0; HEADER_SIZE + payload_len];
        LittleEndian::write_u16(&mut bytes, payload_len as u16);

        let payload = &mut bytes[HEADER_SIZE..];
        for word in 0..words {
            set_bit(payload, word, true);
        }
        for block in table.free_blocks() {
            let start = block.offset as usize;
            for word in start..start + block.size_in_words(word_size) as usize {
                set_bit(payload, word, false);
            }
        }
        Bitmap(bytes)
    }

    /// 空のアドレス空間(i.e., ワード数が`0`)を表すビットマップを返す.
    pub fn empty() -> Self {
        Bitmap(vec![0; HEADER_SIZE])
    }

    /// バイト列をビットマップとして解釈する.
    ///
    /// # Errors
    ///
    /// ヘッダが欠けている、あるいはヘッダのペイロード長と実際の長さが一致しない場合には、
    /// 種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        track_assert!(
            bytes.len() >= HEADER_SIZE,
            ErrorKind::InvalidInput,
            "len:{}",
            bytes.len()
        );
        let payload_len = usize::from(LittleEndian::read_u16(&bytes));
        track_assert_eq!(
            bytes.len() - HEADER_SIZE,
            payload_len,
            ErrorKind::InvalidInput
        );
        Ok(Bitmap(bytes))
    }

    /// `reader`から(終端まで)ビットマップを読み込む.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        track_io!(reader.read_to_end(&mut bytes))?;
        track!(Self::from_bytes(bytes))
    }

    /// ビットマップを`writer`に書き込む.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_io!(writer.write_all(&self.0))
    }

    /// ヘッダを含むバイト列を返す.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// ヘッダを含むバイト列に変換する.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// ヘッダに格納されているペイロード長を返す.
    pub fn payload_len(&self) -> u16 {
        LittleEndian::read_u16(&self.0)
    }

    /// ペイロード部分を返す.
    pub fn payload(&self) -> &[u8] {
        &self.0[HEADER_SIZE..]
    }

    /// ワード`word`が割当済みかどうかを返す.
    ///
    /// `word`がペイロードの範囲外の場合には`None`が返される.
    /// (末尾のバイトの未使用ビットは`0`、すなわち"空き"として報告される)
    pub fn is_allocated(&self, word: usize) -> Option<bool> {
        self.payload()
            .get(word / 8)
            .map(|byte| byte & (1u8 << (word % 8)) != 0)
    }
}

fn set_bit(payload: &mut [u8], word: usize, allocated: bool) {
    let mask = 1u8 << (word % 8);
    if allocated {
        payload[word / 8] |= mask;
    } else {
        payload[word / 8] &= !mask;
    }
}
