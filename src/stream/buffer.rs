//! 流缓冲区模块
//!
//! 累积一个流的应用层载荷，供分类引擎反复匹配。

/// 默认缓冲区容量（8 个以太网帧）
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1500;

/// 缓冲区统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// 总接收字节数（含 NUL 和被截断部分）
    pub total_bytes_received: usize,
    /// 被剔除的 NUL 字节数
    pub nul_bytes_stripped: usize,
    /// 超出容量被丢弃的字节数
    pub bytes_truncated: usize,
}

/// 载荷缓冲区
///
/// 追加时剔除 NUL 字节并受容量上限约束。流进入终态后调用
/// [`release`](Self::release) 提前释放内存，之后的追加都被忽略。
#[derive(Debug)]
pub struct PayloadBuffer {
    /// 数据内容，释放后为 `None`
    data: Option<Vec<u8>>,
    /// 容量上限
    capacity: usize,
    /// 统计信息
    stats: BufferStats,
}

impl PayloadBuffer {
    /// 创建指定容量上限的缓冲区
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Some(Vec::new()),
            capacity,
            stats: BufferStats::default(),
        }
    }

    /// 追加载荷，返回实际写入的字节数
    pub fn append(&mut self, payload: &[u8]) -> usize {
        let data = match self.data.as_mut() {
            Some(data) => data,
            None => return 0,
        };

        self.stats.total_bytes_received += payload.len();

        let mut written = 0;
        for &byte in payload {
            if byte == 0 {
                self.stats.nul_bytes_stripped += 1;
                continue;
            }
            if data.len() >= self.capacity {
                self.stats.bytes_truncated += 1;
                continue;
            }
            data.push(byte);
            written += 1;
        }

        tracing::trace!(
            appended = written,
            length = data.len(),
            "appended payload to buffer"
        );

        written
    }

    /// 释放缓冲区，返回是否为第一次释放
    pub fn release(&mut self) -> bool {
        self.data.take().is_some()
    }

    /// 是否已释放
    pub fn is_released(&self) -> bool {
        self.data.is_none()
    }

    /// 当前内容，释放后为空切片
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// 已累积的字节数
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// 是否没有数据
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 容量上限
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 是否已写满
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// 获取统计信息
    pub fn stats(&self) -> BufferStats {
        self.stats
    }
}

impl Default for PayloadBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}
