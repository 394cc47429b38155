//! 轮询调度
//!
//! 每轮按关注列表顺序逐个获取行情，单个品种失败不影响其他品种。
//! 后台任务只在交易时段内轮询，并在每个交易日的固定时间触发一次重置。
//! 轮询、单品种获取和重置共用一把锁，重置不会和获取交错。

use chrono::NaiveTime;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{CycleReport, MarketStatus, PricePoint, Quote, QuoteSummary};
use crate::services::market::{DailyReset, MarketCalendar, QuoteFetcher};

/// 后台检查间隔上限
const TICK_SECS: u64 = 60;

/// 每个品种保留的日内价格点数（10 分钟一次约 24 小时）
pub const HISTORY_CAP: usize = 144;

pub struct Poller {
    fetcher: Arc<QuoteFetcher>,
    calendar: MarketCalendar,
    reset: Mutex<DailyReset>,
    latest: RwLock<HashMap<String, Quote>>,
    history: RwLock<HashMap<String, VecDeque<PricePoint>>>,
    poll_interval: Duration,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl Poller {
    pub fn new(
        fetcher: Arc<QuoteFetcher>,
        calendar: MarketCalendar,
        reset_at: NaiveTime,
        poll_interval: Duration,
    ) -> Self {
        let reset = DailyReset::new(reset_at, &fetcher.clock().now());
        Self {
            fetcher,
            calendar,
            reset: Mutex::new(reset),
            latest: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            poll_interval,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// 当前是否在交易时段内
    pub fn is_open(&self) -> bool {
        self.calendar.is_open(&self.fetcher.clock().now())
    }

    /// 到了每日重置时间则清空基准价、最新行情和日内价格
    ///
    /// 新交易日取重置时刻所属的交易日，收盘后重置归到下一个交易日
    pub async fn check_reset(&self) -> bool {
        let _guard = self.cycle_lock.lock().await;
        let now = self.fetcher.clock().now();
        let due = self
            .reset
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .poll(&self.calendar, &now);
        if due {
            self.fetcher.store().reset(self.calendar.session_date(&now));
            self.latest.write().unwrap_or_else(|e| e.into_inner()).clear();
            self.history.write().unwrap_or_else(|e| e.into_inner()).clear();
        }
        due
    }

    /// 是否为关注品种
    pub fn is_tracked(&self, symbol: &str) -> bool {
        self.fetcher.registry().get(symbol).is_some()
    }

    /// 获取单个品种并记录为最新行情
    pub async fn fetch_one(&self, symbol: &str) -> Option<Quote> {
        let _guard = self.cycle_lock.lock().await;
        self.fetch_and_record(symbol).await
    }

    async fn fetch_and_record(&self, symbol: &str) -> Option<Quote> {
        let quote = self.fetcher.fetch_quote(symbol).await?;

        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        let points = history.entry(quote.symbol.clone()).or_default();
        if points.len() >= HISTORY_CAP {
            points.pop_front();
        }
        points.push_back(PricePoint {
            timestamp: quote.timestamp.clone(),
            price: quote.price,
        });
        drop(history);

        self.latest
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(quote.symbol.clone(), quote.clone());
        Some(quote)
    }

    /// 执行一轮轮询，同一时间只有一轮在运行
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;
        log::info!("⏰ 开始轮询 {} 个品种", self.fetcher.registry().len());

        let symbols: Vec<String> = self
            .fetcher
            .registry()
            .iter()
            .map(|s| s.symbol.clone())
            .collect();

        let mut report = CycleReport::default();
        for symbol in symbols {
            match self.fetch_and_record(&symbol).await {
                Some(quote) => {
                    log::info!(
                        "  ✅ {}: {:.2} ({:+.2}%, {})",
                        symbol,
                        quote.price,
                        quote.change_percent,
                        quote.source
                    );
                    report.fetched.push(symbol);
                }
                None => {
                    log::warn!("  ⚠️ {} 本轮无数据，跳过", symbol);
                    report.skipped.push(symbol);
                }
            }
        }

        log::info!(
            "📊 轮询完成: 成功 {}，跳过 {}",
            report.fetched.len(),
            report.skipped.len()
        );
        report
    }

    /// 品种当日价格点，按时间先后；未配置的品种返回 `None`
    pub fn history(&self, symbol: &str) -> Option<Vec<PricePoint>> {
        let config = self.fetcher.registry().get(symbol)?;
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        Some(
            history
                .get(&config.symbol)
                .map(|points| points.iter().cloned().collect())
                .unwrap_or_default(),
        )
    }

    /// 关注品种的当日汇总，按配置顺序，只包含已有行情的品种
    ///
    /// 基准价和高低价取自交易日状态
    pub fn summary(&self) -> Vec<QuoteSummary> {
        let latest = self.latest.read().unwrap_or_else(|e| e.into_inner());
        let store = self.fetcher.store();

        self.fetcher
            .registry()
            .iter()
            .filter_map(|config| {
                let quote = latest.get(&config.symbol)?;
                let session = store.get(&config.symbol);
                Some(QuoteSummary {
                    symbol: config.symbol.clone(),
                    name: config.name.clone(),
                    category: config.category.clone(),
                    price: quote.price,
                    baseline: session.map(|s| s.baseline_price),
                    change: quote.change,
                    change_percent: quote.change_percent,
                    high: session.map_or(quote.high, |s| s.high),
                    low: session.map_or(quote.low, |s| s.low),
                    source: quote.source.clone(),
                    timestamp: quote.timestamp.clone(),
                })
            })
            .collect()
    }

    /// 交易时段状态
    pub fn status(&self) -> MarketStatus {
        let now = self.fetcher.clock().now();
        let store = self.fetcher.store();
        MarketStatus {
            is_open: self.calendar.is_open(&now),
            session_date: store.session_date().to_string(),
            tracked_symbols: store.len(),
            now: now.to_rfc3339(),
        }
    }

    /// 后台轮询循环
    pub async fn run(self: Arc<Self>) {
        let tick = Duration::from_secs(TICK_SECS.min(self.poll_interval.as_secs().max(1)));
        let mut interval = tokio::time::interval(tick);
        let mut last_cycle: Option<Instant> = None;

        log::info!(
            "🚀 轮询任务启动，间隔 {} 秒，检查周期 {} 秒",
            self.poll_interval.as_secs(),
            tick.as_secs()
        );

        loop {
            interval.tick().await;
            self.check_reset().await;

            if !self.is_open() {
                continue;
            }
            let due = last_cycle.map_or(true, |t| t.elapsed() >= self.poll_interval);
            if due {
                last_cycle = Some(Instant::now());
                self.run_cycle().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, SymbolConfig};
    use crate::services::market::calendar::FixedClock;
    use crate::services::market::chain::fakes::{failure, success, ScriptedProvider};
    use crate::services::market::providers::{ProviderOutcome, QuoteProvider};
    use crate::services::market::{Clock, ProviderChain, SessionStore, SymbolRegistry};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use chrono_tz::{Africa::Cairo, Tz};

    /// 按品种返回固定价格的数据源
    struct BySymbol(HashMap<&'static str, f64>);

    #[async_trait]
    impl QuoteProvider for BySymbol {
        fn name(&self) -> &str {
            "by-symbol"
        }

        async fn fetch(&self, symbol: &SymbolConfig) -> ProviderOutcome {
            match self.0.get(symbol.symbol.as_str()) {
                Some(price) => success(*price),
                None => failure(),
            }
        }
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn cairo(d: u32, h: u32, m: u32) -> DateTime<Tz> {
        Cairo.with_ymd_and_hms(2026, 10, d, h, m, 0).unwrap()
    }

    fn poller_at(
        provider: Box<dyn QuoteProvider>,
        start: DateTime<Tz>,
        reset_at: NaiveTime,
    ) -> (Arc<FixedClock>, Poller) {
        let clock = Arc::new(FixedClock::at(Cairo, 2026, 10, 1, 0, 0));
        clock.set(start);
        let calendar = MarketCalendar::new(hm(9, 0), hm(18, 0));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let fetcher = QuoteFetcher::new(
            ProviderChain::new(vec![provider]),
            Arc::new(SessionStore::new(calendar.session_date(&start))),
            dyn_clock,
            SymbolRegistry::new(AppConfig::default().watchlist),
        );
        let poller = Poller::new(Arc::new(fetcher), calendar, reset_at, Duration::from_secs(600));
        (clock, poller)
    }

    /// 2026-10-20 周二 09:10 启动，01:00 重置
    fn poller(provider: Box<dyn QuoteProvider>) -> (Arc<FixedClock>, Poller) {
        poller_at(provider, cairo(20, 9, 10), hm(1, 0))
    }

    fn price_of(poller: &Poller, symbol: &str) -> Option<f64> {
        poller
            .summary()
            .into_iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.price)
    }

    #[tokio::test]
    async fn test_cycle_skips_failed_symbols() {
        let prices = HashMap::from([("RC=F", 4521.0), ("CC=F", 8100.0), ("PO=F", 4200.0)]);
        let (_, poller) = poller(Box::new(BySymbol(prices)));

        let report = poller.run_cycle().await;
        assert_eq!(report.fetched, vec!["RC=F", "CC=F", "PO=F"]);
        assert_eq!(report.skipped, vec!["KC=F", "SB=F", "ZW=F", "ZL=F"]);

        let summary = poller.summary();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].name, "Robusta Coffee");
        assert_eq!(summary[0].baseline, Some(4521.0));
        assert_eq!(price_of(&poller, "CC=F"), Some(8100.0));
        assert_eq!(price_of(&poller, "KC=F"), None);
        assert!(poller.is_tracked("kc=f"));
        assert!(!poller.is_tracked("GC=F"));
    }

    #[tokio::test]
    async fn test_summary_uses_session_state() {
        let outcomes = vec![success(100.0), success(104.0), success(97.0), success(101.0)];
        let (provider, _) = ScriptedProvider::new("p", outcomes);
        let (_, poller) = poller(Box::new(provider));

        for _ in 0..4 {
            poller.fetch_one("SB=F").await.unwrap();
        }
        let summary = poller.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].price, 101.0);
        assert_eq!(summary[0].baseline, Some(100.0));
        assert_eq!(summary[0].high, 104.0);
        assert_eq!(summary[0].low, 97.0);
        assert!((summary[0].change - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let outcomes = (0..HISTORY_CAP + 6).map(|i| success(100.0 + i as f64)).collect();
        let (provider, _) = ScriptedProvider::new("p", outcomes);
        let (_, poller) = poller(Box::new(provider));

        for _ in 0..HISTORY_CAP + 6 {
            poller.fetch_one("CC=F").await.unwrap();
        }
        let points = poller.history("cc=f").unwrap();
        assert_eq!(points.len(), HISTORY_CAP);
        assert_eq!(points[0].price, 106.0);
        assert_eq!(points[HISTORY_CAP - 1].price, 100.0 + (HISTORY_CAP + 5) as f64);

        assert_eq!(poller.history("ZW=F"), Some(Vec::new()));
        assert_eq!(poller.history("GC=F"), None);
    }

    #[tokio::test]
    async fn test_daily_reset_clears_state() {
        let (provider, _) = ScriptedProvider::new("p", vec![success(100.0), success(110.0)]);
        let (clock, poller) = poller(Box::new(provider));

        poller.fetch_one("ZW=F").await.unwrap();
        assert!(poller.is_open());
        assert!(!poller.check_reset().await);
        assert_eq!(poller.status().tracked_symbols, 1);
        assert_eq!(poller.history("ZW=F").map(|h| h.len()), Some(1));

        // 次日 01:00 触发重置
        clock.set(cairo(21, 1, 0));
        assert!(!poller.is_open());
        assert!(poller.check_reset().await);
        assert!(poller.summary().is_empty());
        assert_eq!(poller.history("ZW=F"), Some(Vec::new()));

        let status = poller.status();
        assert_eq!(status.tracked_symbols, 0);
        assert_eq!(status.session_date, "2026-10-21");
        assert!(!status.is_open);

        clock.set(cairo(21, 9, 0));
        let quote = poller.fetch_one("ZW=F").await.unwrap();
        assert_eq!(quote.price, 110.0);
        assert_eq!(quote.change, 0.0);
    }

    #[tokio::test]
    async fn test_evening_reset_starts_next_session() {
        let (provider, _) = ScriptedProvider::new("p", vec![success(50.0), success(52.0)]);
        // 周一 10:00 启动，每天 20:00 重置
        let (clock, poller) = poller_at(Box::new(provider), cairo(19, 10, 0), hm(20, 0));

        poller.fetch_one("ZL=F").await.unwrap();
        assert_eq!(poller.status().session_date, "2026-10-19");

        clock.set(cairo(19, 20, 0));
        assert!(poller.check_reset().await);
        assert_eq!(poller.status().session_date, "2026-10-20");

        clock.set(cairo(20, 10, 0));
        poller.fetch_one("ZL=F").await.unwrap();
        assert_eq!(poller.status().session_date, "2026-10-20");
        assert_eq!(poller.summary()[0].baseline, Some(52.0));
    }

    #[tokio::test]
    async fn test_reset_waits_for_running_fetch() {
        let (clock, poller) = poller(Box::new(BySymbol(HashMap::new())));
        clock.set(cairo(21, 1, 0));

        // 获取进行中时重置必须等待
        let guard = poller.cycle_lock.lock().await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), poller.check_reset()).await;
        assert!(blocked.is_err());
        drop(guard);

        let done = tokio::time::timeout(Duration::from_secs(1), poller.check_reset()).await;
        assert_eq!(done.ok(), Some(true));
    }
}
