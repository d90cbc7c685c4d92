/// 速率限制器模块
///
/// 按块计算平均速率：每传输一块数据后，根据实际耗时补足睡眠，
/// 使该块的平均吞吐量不超过配置的字节/秒上限。
/// 这不是令牌桶，块内的突发不会被平滑，块大小决定了突发上限。
use std::num::NonZeroU32;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// 计算在给定吞吐量下，传输 `transmitted` 字节还需要额外等待的时间
///
/// 实际耗时已经达到或超过期望耗时时返回 `Duration::ZERO`，
/// 不会返回负数时长。
pub fn required_delay(throughput: NonZeroU32, transmitted: usize, elapsed: Duration) -> Duration {
    if transmitted == 0 {
        return Duration::ZERO;
    }

    let nanos = transmitted as u128 * NANOS_PER_SEC / throughput.get() as u128;
    let expected = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));

    expected.saturating_sub(elapsed)
}

/// 按需睡眠以模拟吞吐量
///
/// 需要本次传输的字节数以及传输实际花费的时间来计算暂停时长。
pub async fn delay(throughput: NonZeroU32, transmitted: usize, elapsed: Duration) {
    let pause = required_delay(throughput, transmitted, elapsed);
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}

/// 绑定了吞吐量的速率限制器
///
/// 每个泵各持有一份，不共享任何计数状态。
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    throughput: NonZeroU32,
}

impl RateLimiter {
    /// 创建新的速率限制器
    pub fn new(throughput: NonZeroU32) -> Self {
        Self { throughput }
    }

    /// 每秒允许的字节数
    pub fn throughput(&self) -> NonZeroU32 {
        self.throughput
    }

    /// 计算需要额外等待的时间（不睡眠）
    pub fn required_delay(&self, transmitted: usize, elapsed: Duration) -> Duration {
        required_delay(self.throughput, transmitted, elapsed)
    }

    /// 异步等待直到本块数据满足速率上限
    pub async fn delay(&self, transmitted: usize, elapsed: Duration) {
        delay(self.throughput, transmitted, elapsed).await
    }
}
