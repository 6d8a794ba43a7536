//! Contiguous Memory Manager.
//!
//! `memmgr`は、一つの連続したアドレス空間を、可変長のブロック群に分割して管理するメモリマネージャ.
//!
//! # 特徴
//!
//! - 割当単位は固定長の"ワード"で、要求サイズはワードサイズの倍数である必要がある
//! - 割当位置は差し替え可能な[配置戦略][strategy]によって決定される
//!   - BestFit / WorstFit / 任意の戦略(e.g., FirstFit, NextFit)
//! - 解放時には、隣接する空き領域が即座に併合される
//!   - 二つの空き領域が隣接することは無い
//! - 割当状況を、以下の二種類のバイナリ形式として取得可能:
//!   - [空き領域記述子][HoleList]: 空き領域の位置と長さの一覧
//!   - [ビットマップ][Bitmap]: ワード毎の割当済みフラグ
//! - 空き領域の一覧をテキストとして[ダンプ][dump]可能
//! - アドレス空間の最大サイズは`0xFFFF`ワード
//!
//! # モジュールの依存関係
//!
//! ```text
//! manager => table => codec
//!         |        `-> strategy
//!         `-> space
//! ```
//!
//! - [manager]モジュール:
//!   - 主に[MemoryManager]構造体を提供
//!   - `memmgr`の利用者が直接触るのはこの構造体
//! - [table]モジュール:
//!   - ブロックの分割・併合を担当する[BlockTable]を提供
//! - [codec]モジュール:
//!   - [BlockTable]の状態をバイナリ形式に変換する
//! - [space]モジュール:
//!   - 実際のバイト列を保持する[AddressSpace]と、[Handle]を提供
//!
//! [strategy]: ./strategy/index.html
//! [HoleList]: ./codec/struct.HoleList.html
//! [Bitmap]: ./codec/struct.Bitmap.html
//! [dump]: ./dump/index.html
//! [manager]: ./manager/index.html
//! [MemoryManager]: ./manager/struct.MemoryManager.html
//! [table]: ./table/index.html
//! [BlockTable]: ./table/struct.BlockTable.html
//! [codec]: ./codec/index.html
//! [space]: ./space/index.html
//! [AddressSpace]: ./space/struct.AddressSpace.html
//! [Handle]: ./space/struct.Handle.html
#![warn(missing_docs)]
extern crate byteorder;
extern crate prometrics;
#[cfg(test)]
extern crate tempdir;
#[macro_use]
extern crate trackable;
#[macro_use]
extern crate slog;

pub use crate::error::{Error, ErrorKind};

macro_rules! track_io {
    ($expr:expr) => {
        $expr.map_err(|e: ::std::io::Error| track!(crate::Error::from(e)))
    };
}

pub mod codec;
pub mod dump;
pub mod manager;
pub mod metrics;
pub mod space;
pub mod strategy;
pub mod table;
pub mod word;

mod error;

/// crate固有の`Result`型.
pub type Result<T> = std::result::Result<T, Error>;
