//! 交易日基准价存储
//!
//! 每个品种每个交易日只采用一次基准价，之后的轮询不再覆盖，
//! 这样"较开盘涨跌"在一天之内保持稳定，不随上游噪声漂移。
//! 最高/最低价在交易日内单调扩展，每日重置时整体清空。
//!
//! 内部用一把互斥锁保护，"检查是否已有基准价"和"写入"在同一临界区内完成。

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// 基准价候选值，按 昨收 → 开盘 → 最新价 的优先级选取
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineCandidates {
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub price: f64,
}

impl BaselineCandidates {
    /// 第一个存在且严格为正的候选值
    pub fn select(&self) -> Option<f64> {
        [self.previous_close, self.open, Some(self.price)]
            .into_iter()
            .flatten()
            .find(|v| v.is_finite() && *v > 0.0)
    }
}

/// 交易日内价格区间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub high: f64,
    pub low: f64,
}

/// 单个品种的交易日状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionBaseline {
    pub baseline_price: f64,
    pub high: f64,
    pub low: f64,
    pub session_date: NaiveDate,
}

#[derive(Debug)]
struct SessionState {
    session_date: NaiveDate,
    baselines: HashMap<String, f64>,
    ranges: HashMap<String, PriceRange>,
}

/// 交易日基准价存储
pub struct SessionStore {
    state: Mutex<SessionState>,
}

impl SessionStore {
    /// 以 `session_date` 为当前交易日创建空存储
    pub fn new(session_date: NaiveDate) -> Self {
        Self {
            state: Mutex::new(SessionState {
                session_date,
                baselines: HashMap::new(),
                ranges: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // 持锁期间不会 panic，中毒状态下数据依然一致
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 当前交易日
    pub fn session_date(&self) -> NaiveDate {
        self.lock().session_date
    }

    /// 若该品种本交易日尚无基准价，则按优先级选取并固定；已有则不做任何修改
    ///
    /// 返回当前生效的基准价；候选值全部无效时返回 `None`
    pub fn set_baseline_if_absent(
        &self,
        symbol: &str,
        candidates: &BaselineCandidates,
    ) -> Option<f64> {
        let mut state = self.lock();
        if let Some(existing) = state.baselines.get(symbol) {
            log::debug!("{} 沿用已有基准价 {:.2}", symbol, existing);
            return Some(*existing);
        }

        let baseline = candidates.select()?;
        state.baselines.insert(symbol.to_string(), baseline);
        log::info!(
            "📌 {} 基准价已设定: {:.2}（昨收 {:?} / 开盘 {:?} / 最新 {:.2}）",
            symbol,
            baseline,
            candidates.previous_close,
            candidates.open,
            candidates.price
        );
        Some(baseline)
    }

    /// 单调扩展最高/最低价，不存在时以 `price` 创建
    pub fn update_range(&self, symbol: &str, price: f64) -> PriceRange {
        let mut state = self.lock();
        let range = state
            .ranges
            .entry(symbol.to_string())
            .or_insert(PriceRange { high: price, low: price });
        if price > range.high {
            range.high = price;
        }
        if price < range.low {
            range.low = price;
        }
        *range
    }

    /// 相对基准价的涨跌额和涨跌幅；尚无基准价时以 `price` 自身为基准
    pub fn compute_change(&self, symbol: &str, price: f64) -> (f64, f64) {
        let baseline = self.baseline(symbol).unwrap_or(price);
        change_from(baseline, price)
    }

    pub fn baseline(&self, symbol: &str) -> Option<f64> {
        self.lock().baselines.get(symbol).copied()
    }

    /// 品种的交易日状态快照，需要基准价和区间都已存在
    pub fn get(&self, symbol: &str) -> Option<SessionBaseline> {
        let state = self.lock();
        let baseline_price = *state.baselines.get(symbol)?;
        let range = state.ranges.get(symbol)?;
        Some(SessionBaseline {
            baseline_price,
            high: range.high,
            low: range.low,
            session_date: state.session_date,
        })
    }

    /// 已建立基准价的品种数
    pub fn len(&self) -> usize {
        self.lock().baselines.len()
    }

    /// 清空所有品种的交易日状态，并切换到新交易日 `session_date`
    pub fn reset(&self, session_date: NaiveDate) {
        let mut state = self.lock();
        let cleared = state.baselines.len();
        state.baselines.clear();
        state.ranges.clear();
        state.session_date = session_date;
        log::info!("🔄 交易日状态已重置，清除 {} 个基准价，新交易日 {}", cleared, session_date);
    }
}

/// 涨跌额与涨跌幅（百分比），基准价为 0 时涨跌幅记为 0
pub fn change_from(baseline: f64, price: f64) -> (f64, f64) {
    let absolute = price - baseline;
    let percent = if baseline == 0.0 {
        0.0
    } else {
        absolute / baseline * 100.0
    };
    (absolute, percent)
}
