//! 空き領域の一覧をテキストとして書き出すための構成要素.
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::codec::HoleList;
use crate::Result;

/// 空き領域記述子をテキストとして表示するための構造体.
///
/// 形式は`"[o0, s0] - [o1, s1] - ... - [oN, sN]"`で、位置・長さ共にワード単位.
///
/// アドレス空間に空き領域が無い場合、およびアドレス空間全体が空いている場合には、
/// 共に空文字列となる.
/// この層では二つの状態は区別できないので、必要であれば[`HoleList`]の方を参照すること.
///
/// [`HoleList`]: ../codec/struct.HoleList.html
///
/// # Examples
///
/// ```
/// use memmgr::codec::{Hole, HoleList};
/// use memmgr::dump::MapDump;
///
/// let holes = HoleList::from_holes(&[Hole { offset: 0, size: 30 }, Hole { offset: 50, size: 50 }]).unwrap();
/// assert_eq!(MapDump::new(&holes).to_string(), "[0, 30] - [50, 50]");
///
/// assert_eq!(MapDump::new(&HoleList::no_holes()).to_string(), "");
/// assert_eq!(MapDump::new(&HoleList::all_free()).to_string(), "");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MapDump<'a> {
    holes: &'a HoleList,
}
impl<'a> MapDump<'a> {
    /// 新しい`MapDump`インスタンスを生成する.
    pub fn new(holes: &'a HoleList) -> Self {
        MapDump { holes }
    }

    /// テキストを`writer`に書き込む.
    ///
    /// テキストは全体を生成した後に、一度にまとめて書き込まれる.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let text = self.to_string();
        track_io!(writer.write_all(text.as_bytes()))?;
        track_io!(writer.flush())?;
        Ok(())
    }

    /// テキストを`path`のファイルに書き込む.
    ///
    /// ファイルが存在しない場合には作成され、存在する場合には内容が置き換えられる.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = track_io!(open_options().open(path))?;
        track!(self.write_to(file))
    }
}
impl<'a> fmt::Display for MapDump<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, hole) in self.holes.holes().enumerate() {
            if i > 0 {
                write!(f, " - ")?;
            }
            write!(f, "[{}, {}]", hole.offset, hole.size)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn open_options() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true).mode(0o666);
    options
}
#[cfg(not(unix))]
fn open_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    options
}
