use std::time::Instant;

/// 单个受试者处理耗时的秒表。
#[derive(Clone)]
pub struct SubjectTimer {
    since: Instant,
}

impl SubjectTimer {
    /// 启动秒表。
    #[inline]
    pub fn start() -> Self {
        Self {
            since: Instant::now(),
        }
    }

    /// 重置起点，复用同一个秒表计量下一个受试者。
    #[inline]
    pub fn restart(&mut self) {
        self.since = Instant::now();
    }

    /// 自启动以来经过的秒数。
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.since.elapsed().as_secs_f64()
    }
}

impl Default for SubjectTimer {
    fn default() -> Self {
        Self::start()
    }
}
