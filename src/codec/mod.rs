//! ブロックテーブルの状態を外部に公開するためのエンコーディング群.
//!
//! - [HoleList]: 空き領域記述子. 配置戦略への入力としても使われる
//! - [Bitmap]: ワード毎の割当状況を詰め込んだビット列
//!
//! どちらのバイト列表現も、16bit幅の値はリトルエンディアンで格納される.
//!
//! [HoleList]: ./struct.HoleList.html
//! [Bitmap]: ./struct.Bitmap.html
pub use self::bitmap::Bitmap;
pub use self::hole_list::{Hole, HoleList};

mod bitmap;
mod hole_list;
