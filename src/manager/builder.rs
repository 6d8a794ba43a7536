use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};

use super::MemoryManager;
use crate::metrics::AllocatorMetrics;
use crate::strategy::PlacementStrategy;
use crate::word::WordSize;

/// `MemoryManager`のビルダ.
#[derive(Debug, Clone)]
pub struct MemoryManagerBuilder {
    pub(crate) word_size: WordSize,
    pub(crate) logger: Logger,
    pub(crate) metrics: MetricBuilder,
}
impl MemoryManagerBuilder {
    /// デフォルト設定で`MemoryManagerBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        MemoryManagerBuilder {
            word_size: WordSize::default(),
            logger: Logger::root(Discard, o!()),
            metrics: MetricBuilder::new(),
        }
    }

    /// ワードサイズを設定する.
    ///
    /// 割当要求のサイズは、この値の倍数である必要がある.
    ///
    /// デフォルト値は`WordSize::min()`.
    pub fn word_size(&mut self, word_size: WordSize) -> &mut Self {
        self.word_size = word_size;
        self
    }

    /// ロガーを設定する.
    ///
    /// デフォルトでは、ログは出力されずに捨てられる.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// 指定の配置戦略を用いる`MemoryManager`を生成する.
    ///
    /// 生成直後のインスタンスは未初期化状態であり、
    /// 割当を行う前に`MemoryManager::initialize`を呼び出す必要がある.
    pub fn finish(&self, strategy: PlacementStrategy) -> MemoryManager {
        let metrics = AllocatorMetrics::new(&self.metrics);
        MemoryManager::new_with_builder(self, strategy, metrics)
    }
}
impl Default for MemoryManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
