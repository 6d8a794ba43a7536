//! [Prometheus][prometheus]用のメトリクス.
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, Gauge, MetricBuilder};

/// [`MemoryManager`]のアロケータ部分のメトリクス.
///
/// カウンタ群は`initialize`や`shutdown`を跨いで累積される.
///
/// [`MemoryManager`]: ../manager/struct.MemoryManager.html
#[derive(Debug, Clone)]
pub struct AllocatorMetrics {
    pub(crate) capacity_bytes: Gauge,
    pub(crate) usage_bytes: Gauge,
    pub(crate) allocated_blocks: Counter,
    pub(crate) allocated_bytes: Counter,
    pub(crate) released_blocks: Counter,
    pub(crate) released_bytes: Counter,
    pub(crate) coalesced_blocks: Counter,
    pub(crate) nospace_failures: Counter,
    pub(crate) invalid_requests: Counter,
}
impl AllocatorMetrics {
    /// 現在のアドレス空間の容量.
    ///
    /// 未初期化の場合は`0`となる.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_capacity_bytes <GAUGE>
    /// ```
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes.value() as u64
    }

    /// 現在割当済みのバイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_usage_bytes <GAUGE>
    /// ```
    pub fn usage_bytes(&self) -> u64 {
        self.usage_bytes.value() as u64
    }

    /// ブロックの割当回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_allocated_blocks_total <COUNTER>
    /// ```
    pub fn allocated_blocks(&self) -> u64 {
        self.allocated_blocks.value() as u64
    }

    /// これまでに割り当てたバイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_allocated_bytes_total <COUNTER>
    /// ```
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.value() as u64
    }

    /// ブロックの解放回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_released_blocks_total <COUNTER>
    /// ```
    pub fn released_blocks(&self) -> u64 {
        self.released_blocks.value() as u64
    }

    /// これまでに解放されたバイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_released_bytes_total <COUNTER>
    /// ```
    pub fn released_bytes(&self) -> u64 {
        self.released_bytes.value() as u64
    }

    /// 解放時に隣接する空き領域と併合された(i.e., テーブルから消えた)ブロックの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_coalesced_blocks_total <COUNTER>
    /// ```
    pub fn coalesced_blocks(&self) -> u64 {
        self.coalesced_blocks.value() as u64
    }

    /// 空き領域不足による割当失敗回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_nospace_failures_total <COUNTER>
    /// ```
    pub fn nospace_failures(&self) -> u64 {
        self.nospace_failures.value() as u64
    }

    /// 不正なサイズの割当要求や、不正なアドレスの解放要求の数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// memmgr_allocator_invalid_requests_total <COUNTER>
    /// ```
    pub fn invalid_requests(&self) -> u64 {
        self.invalid_requests.value() as u64
    }

    pub(crate) fn new(builder: &MetricBuilder) -> Self {
        let mut builder = builder.clone();
        builder.namespace("memmgr").subsystem("allocator");
        AllocatorMetrics {
            capacity_bytes: builder
                .gauge("capacity_bytes")
                .help("Capacity of the address space")
                .finish()
                .expect("Never fails"),
            usage_bytes: builder
                .gauge("usage_bytes")
                .help("Number of bytes currently allocated")
                .finish()
                .expect("Never fails"),
            allocated_blocks: builder
                .counter("allocated_blocks_total")
                .help("Number of allocated blocks")
                .finish()
                .expect("Never fails"),
            allocated_bytes: builder
                .counter("allocated_bytes_total")
                .help("Number of allocated bytes")
                .finish()
                .expect("Never fails"),
            released_blocks: builder
                .counter("released_blocks_total")
                .help("Number of released blocks")
                .finish()
                .expect("Never fails"),
            released_bytes: builder
                .counter("released_bytes_total")
                .help("Number of released bytes")
                .finish()
                .expect("Never fails"),
            coalesced_blocks: builder
                .counter("coalesced_blocks_total")
                .help("Number of free blocks merged into a neighbour on release")
                .finish()
                .expect("Never fails"),
            nospace_failures: builder
                .counter("nospace_failures_total")
                .help("Number of allocation failures caused by no available space")
                .finish()
                .expect("Never fails"),
            invalid_requests: builder
                .counter("invalid_requests_total")
                .help("Number of rejected allocation or release requests")
                .finish()
                .expect("Never fails"),
        }
    }

    pub(crate) fn count_allocation(&self, size: u32) {
        self.allocated_blocks.increment();
        self.allocated_bytes.add_u64(u64::from(size));
    }

    pub(crate) fn count_releasion(&self, size: u32, coalesced: usize) {
        self.released_blocks.increment();
        self.released_bytes.add_u64(u64::from(size));
        self.coalesced_blocks.add_u64(coalesced as u64);
    }
}
