//! 割当位置を決定する配置戦略.
//!
//! 配置戦略は「要求サイズ(ワード単位)」と「空き領域記述子」を受け取り、
//! 割当に使用する空き領域の開始位置を返す.
//! 要求を満たす空き領域が無い場合には`None`を返す.
//!
//! 返す位置は、記述子に含まれるいずれかのホールの開始位置で、
//! かつそのホールの長さが要求サイズ以上である必要がある.
//! この契約に違反した場合、割当は`ErrorKind::InconsistentState`で失敗する.
use std::fmt;

use crate::codec::HoleList;

/// 配置戦略を表すトレイト.
///
/// `FnMut(u16, &HoleList) -> Option<u16>`を満たすクロージャや関数も、このトレイトを実装している.
pub trait Placement {
    /// `size_in_words`ワード分の割当に使用するホールの開始位置を返す.
    fn choose(&mut self, size_in_words: u16, holes: &HoleList) -> Option<u16>;
}
impl<F> Placement for F
where
    F: FnMut(u16, &HoleList) -> Option<u16>,
{
    fn choose(&mut self, size_in_words: u16, holes: &HoleList) -> Option<u16> {
        self(size_in_words, holes)
    }
}

/// `MemoryManager`に設定される配置戦略.
///
/// 戦略は`MemoryManager::set_strategy`によって、実行時に差し替えることが可能.
pub enum PlacementStrategy {
    /// 要求を満たすホールの内、余剰が最小のものを選択する.
    ///
    /// 同じ余剰を持つホールが複数ある場合には、開始位置が最も小さいものが選ばれる.
    BestFit,

    /// 要求を満たすホールの内、余剰が最大のものを選択する.
    ///
    /// 同じ余剰を持つホールが複数ある場合には、開始位置が最も小さいものが選ばれる.
    WorstFit,

    /// 利用者が指定した任意の戦略.
    Custom(Box<dyn Placement + Send>),
}
impl PlacementStrategy {
    /// 任意の戦略から`PlacementStrategy::Custom`を生成する.
    pub fn custom<P>(placement: P) -> Self
    where
        P: Placement + Send + 'static,
    {
        PlacementStrategy::Custom(Box::new(placement))
    }
}
impl Placement for PlacementStrategy {
    fn choose(&mut self, size_in_words: u16, holes: &HoleList) -> Option<u16> {
        match self {
            PlacementStrategy::BestFit => best_fit(size_in_words, holes),
            PlacementStrategy::WorstFit => worst_fit(size_in_words, holes),
            PlacementStrategy::Custom(placement) => placement.choose(size_in_words, holes),
        }
    }
}
impl Default for PlacementStrategy {
    fn default() -> Self {
        PlacementStrategy::BestFit
    }
}
impl fmt::Debug for PlacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlacementStrategy::BestFit => write!(f, "BestFit"),
            PlacementStrategy::WorstFit => write!(f, "WorstFit"),
            PlacementStrategy::Custom(_) => write!(f, "Custom(_)"),
        }
    }
}

/// BestFit戦略.
///
/// # Examples
///
/// ```
/// use memmgr::codec::{Hole, HoleList};
/// use memmgr::strategy::best_fit;
///
/// let holes = HoleList::from_holes(&[
///     Hole { offset: 0, size: 8 },
///     Hole { offset: 10, size: 4 },
///     Hole { offset: 20, size: 16 },
/// ])
/// .unwrap();
/// assert_eq!(best_fit(3, &holes), Some(10));
/// assert_eq!(best_fit(5, &holes), Some(0));
/// assert_eq!(best_fit(17, &holes), None);
/// ```
pub fn best_fit(size_in_words: u16, holes: &HoleList) -> Option<u16> {
    let mut chosen: Option<(u16, u16)> = None;
    for hole in holes.holes().filter(|h| h.size >= size_in_words) {
        let slack = hole.size - size_in_words;
        if chosen.map_or(true, |(min, _)| slack < min) {
            chosen = Some((slack, hole.offset));
        }
    }
    chosen.map(|(_, offset)| offset)
}

/// WorstFit戦略.
///
/// # Examples
///
/// ```
/// use memmgr::codec::{Hole, HoleList};
/// use memmgr::strategy::worst_fit;
///
/// let holes = HoleList::from_holes(&[
///     Hole { offset: 0, size: 8 },
///     Hole { offset: 10, size: 4 },
///     Hole { offset: 20, size: 16 },
/// ])
/// .unwrap();
/// assert_eq!(worst_fit(3, &holes), Some(20));
/// assert_eq!(worst_fit(17, &holes), None);
/// ```
pub fn worst_fit(size_in_words: u16, holes: &HoleList) -> Option<u16> {
    let mut chosen: Option<(u16, u16)> = None;
    for hole in holes.holes().filter(|h| h.size >= size_in_words) {
        let slack = hole.size - size_in_words;
        if chosen.map_or(true, |(max, _)| slack > max) {
            chosen = Some((slack, hole.offset));
        }
    }
    chosen.map(|(_, offset)| offset)
}

/// FirstFit戦略.
///
/// 要求を満たすホールの内、開始位置が最も小さいものを選択する.
/// `PlacementStrategy::custom(first_fit)`として使用する.
pub fn first_fit(size_in_words: u16, holes: &HoleList) -> Option<u16> {
    holes
        .holes()
        .find(|h| h.size >= size_in_words)
        .map(|h| h.offset)
}

/// NextFit戦略.
///
/// 前回選択した位置の直後から探索を再開し、要求を満たす最初のホールを選択する.
/// 末尾まで見つからなかった場合には、先頭に戻って探索する.
#[derive(Debug, Default, Clone)]
pub struct NextFit {
    cursor: u32,
}
impl NextFit {
    /// 新しい`NextFit`インスタンスを生成する.
    pub fn new() -> Self {
        NextFit::default()
    }
}
impl Placement for NextFit {
    fn choose(&mut self, size_in_words: u16, holes: &HoleList) -> Option<u16> {
        let cursor = self.cursor;
        let hole = holes
            .holes()
            .filter(|h| h.size >= size_in_words)
            .find(|h| u32::from(h.offset) >= cursor)
            .or_else(|| holes.holes().find(|h| h.size >= size_in_words))?;
        self.cursor = u32::from(hole.offset) + u32::from(size_in_words);
        Some(hole.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Hole;

    fn holes(pairs: &[(u16, u16)]) -> HoleList {
        let holes = pairs
            .iter()
            .map(|&(offset, size)| Hole { offset, size })
            .collect::<Vec<_>>();
        HoleList::from_holes(&holes).unwrap()
    }

    #[test]
    fn best_fit_minimizes_slack() {
        let list = holes(&[(0, 10), (20, 5), (40, 7), (60, 5)]);
        assert_eq!(best_fit(5, &list), Some(20));
        assert_eq!(best_fit(6, &list), Some(40));
        assert_eq!(best_fit(8, &list), Some(0));
        assert_eq!(best_fit(11, &list), None);
    }

    #[test]
    fn worst_fit_maximizes_slack() {
        let list = holes(&[(0, 5), (20, 10), (40, 10), (60, 3)]);
        assert_eq!(worst_fit(1, &list), Some(20));
        assert_eq!(worst_fit(10, &list), Some(20));
        assert_eq!(worst_fit(4, &list), Some(20));
        assert_eq!(worst_fit(11, &list), None);
    }

    #[test]
    fn strategies_agree_on_a_single_fitting_hole() {
        let list = holes(&[(0, 2), (10, 9), (30, 3)]);
        assert_eq!(best_fit(4, &list), Some(10));
        assert_eq!(worst_fit(4, &list), Some(10));
        assert_eq!(first_fit(4, &list), Some(10));
    }

    #[test]
    fn empty_descriptors_never_fit() {
        assert_eq!(best_fit(1, &HoleList::no_holes()), None);
        assert_eq!(worst_fit(1, &HoleList::no_holes()), None);
        assert_eq!(first_fit(1, &HoleList::all_free()), None);
    }

    #[test]
    fn next_fit_resumes_after_previous_choice() {
        let list = holes(&[(0, 4), (10, 4), (20, 4)]);
        let mut next_fit = NextFit::new();
        assert_eq!(next_fit.choose(2, &list), Some(0));
        assert_eq!(next_fit.choose(2, &list), Some(10));
        assert_eq!(next_fit.choose(2, &list), Some(20));
        assert_eq!(next_fit.choose(2, &list), Some(0));
        assert_eq!(next_fit.choose(5, &list), None);
    }

    #[test]
    fn custom_strategies_work() {
        let list = holes(&[(0, 4), (10, 8)]);
        let mut last_fit = PlacementStrategy::custom(|size: u16, holes: &HoleList| {
            holes
                .holes()
                .filter(|h| h.size >= size)
                .last()
                .map(|h| h.offset)
        });
        assert_eq!(last_fit.choose(2, &list), Some(10));
        assert_eq!(format!("{:?}", last_fit), "Custom(_)");

        let mut best = PlacementStrategy::default();
        assert_eq!(best.choose(2, &list), Some(0));
        assert_eq!(format!("{:?}", best), "BestFit");
    }
}
