use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{Read, Write};

use crate::table::BlockTable;
use crate::{ErrorKind, Result};

/// 一つの空き領域(ホール).
///
/// 位置・長さ共にワード単位.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hole {
    /// 開始位置（ワード単位）
    pub offset: u16,

    /// 長さ（ワード単位）
    pub size: u16,
}
impl Hole {
    /// ホールの終端位置を返す.
    pub fn end(&self) -> u32 {
        u32::from(self.offset) + u32::from(self.size)
    }
}

/// 空き領域記述子.
///
/// 形式は`[ホール数, 開始位置0, 長さ0, 開始位置1, 長さ1, ...]`の`u16`列で、
/// ホールは開始位置の昇順に並ぶ.
///
/// アドレス空間全体が一つの空き領域である場合には、列挙を省略した空の記述子となる
/// (`is_all_free()`で判定可能).
/// 空き領域が一つも無い場合には`[0]`となる.
///
/// # Examples
///
/// ```
/// use memmgr::codec::{Hole, HoleList};
///
/// let holes = HoleList::from_holes(&[Hole { offset: 0, size: 30 }, Hole { offset: 50, size: 50 }]).unwrap();
/// assert_eq!(holes.as_words(), &[2, 0, 30, 50, 50]);
/// assert_eq!(holes.to_bytes(), vec![2, 0, 0, 0, 30, 0, 50, 0, 50, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HoleList(Vec<u16>);
impl HoleList {
    /// ブロックテーブルの現在の空き領域から記述子を生成する.
    pub fn encode(table: &BlockTable) -> Self {
        if table.is_all_free() {
            return HoleList(Vec::new());
        }
        let word_size = table.word_size();
        let mut words = vec![0];
        for block in table.free_blocks() {
            words.push(block.offset as u16);
            words.push(block.size_in_words(word_size) as u16);
        }
        words[0] = ((words.len() - 1) / 2) as u16;
        HoleList(words)
    }

    /// ホール群から記述子を生成する.
    ///
    /// # Errors
    ///
    /// 以下の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される:
    ///
    /// - ホールの数が`u16`で表現可能な範囲を超えている
    /// - ホールの長さが`0`、あるいはホール同士が昇順に並んでいない(重なっている)
    pub fn from_holes(holes: &[Hole]) -> Result<Self> {
        track_assert!(
            holes.len() <= usize::from(u16::MAX),
            ErrorKind::InvalidInput,
            "Too many holes: {}",
            holes.len()
        );
        let mut words = Vec::with_capacity(1 + holes.len() * 2);
        words.push(holes.len() as u16);
        for hole in holes {
            words.push(hole.offset);
            words.push(hole.size);
        }
        let holes = HoleList(words);
        track!(holes.check_holes())?;
        Ok(holes)
    }

    /// 空き領域が一つも無いことを示す記述子(i.e., `[0]`)を返す.
    pub fn no_holes() -> Self {
        HoleList(vec![0])
    }

    /// アドレス空間全体が空いていることを示す(空の)記述子を返す.
    pub fn all_free() -> Self {
        HoleList(Vec::new())
    }

    /// アドレス空間全体が空いていることを示す記述子かどうかを判定する.
    pub fn is_all_free(&self) -> bool {
        self.0.is_empty()
    }

    /// ホールの数を返す.
    ///
    /// 全体が空いていることを示す記述子の場合には`0`が返される.
    pub fn hole_count(&self) -> usize {
        self.0.first().map_or(0, |&n| usize::from(n))
    }

    /// ホール群を開始位置の昇順で返す.
    pub fn holes(&self) -> impl Iterator<Item = Hole> + '_ {
        self.0
            .get(1..)
            .unwrap_or(&[])
            .chunks_exact(2)
            .map(|pair| Hole {
                offset: pair[0],
                size: pair[1],
            })
    }

    /// 記述子を`u16`列として返す.
    pub fn as_words(&self) -> &[u16] {
        &self.0
    }

    /// 記述子のバイト列表現を返す.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.0.len() * 2);
        for &word in &self.0 {
            buf.write_u16::<LittleEndian>(word).expect("Never fails");
        }
        buf
    }

    /// 記述子を`writer`に書き込む.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for &word in &self.0 {
            track_io!(writer.write_u16::<LittleEndian>(word))?;
        }
        Ok(())
    }

    /// `reader`から(終端まで)記述子を読み込む.
    ///
    /// # Errors
    ///
    /// 以下の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される:
    ///
    /// - バイト数が奇数
    /// - ホール数と後続の要素数が一致しない
    /// - ホールの長さが`0`、あるいはホール同士が昇順に並んでいない(重なっている)
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = Vec::new();
        track_io!(reader.read_to_end(&mut buf))?;
        track_assert_eq!(buf.len() % 2, 0, ErrorKind::InvalidInput);

        let mut words = vec![0; buf.len() / 2];
        LittleEndian::read_u16_into(&buf, &mut words);
        let holes = HoleList(words);
        if holes.is_all_free() {
            return Ok(holes);
        }

        track_assert_eq!(
            holes.0.len(),
            1 + holes.hole_count() * 2,
            ErrorKind::InvalidInput,
            "hole_count:{}",
            holes.hole_count()
        );
        track!(holes.check_holes())?;
        Ok(holes)
    }

    fn check_holes(&self) -> Result<()> {
        let mut tail = 0;
        for hole in self.holes() {
            track_assert!(hole.size != 0, ErrorKind::InvalidInput, "{:?}", hole);
            track_assert!(
                tail <= u32::from(hole.offset),
                ErrorKind::InvalidInput,
                "Holes must be sorted and disjoint: {:?}",
                hole
            );
            tail = hole.end();
        }
        Ok(())
    }
}
