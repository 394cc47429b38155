//! 行情获取与标准化
//!
//! 调用数据源瀑布链，把部分行情和交易日基准价合并成标准 [`Quote`]

use std::sync::Arc;

use crate::models::{PartialQuote, Quote};

use super::calendar::Clock;
use super::chain::ProviderChain;
use super::common::positive;
use super::registry::SymbolRegistry;
use super::session::{BaselineCandidates, SessionStore};

/// 行情获取服务
pub struct QuoteFetcher {
    chain: ProviderChain,
    store: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    registry: SymbolRegistry,
}

impl QuoteFetcher {
    pub fn new(
        chain: ProviderChain,
        store: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        registry: SymbolRegistry,
    ) -> Self {
        Self {
            chain,
            store,
            clock,
            registry,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 获取单个品种的标准行情
    ///
    /// 未知品种或所有数据源都失败时返回 `None`，调用方应跳过该品种
    pub async fn fetch_quote(&self, symbol: &str) -> Option<Quote> {
        let Some(config) = self.registry.get(symbol) else {
            log::warn!("⚠️ 未配置的品种 {}，跳过", symbol);
            return None;
        };

        let partial = self.chain.fetch_quote_partial(config).await?;
        Some(self.normalize(&config.symbol, partial))
    }

    /// 合并部分行情与交易日状态
    pub fn normalize(&self, symbol: &str, partial: PartialQuote) -> Quote {
        let price = partial.price;
        let open = partial.open.and_then(positive);
        let previous_close = partial.previous_close.and_then(positive);

        let reported_high = partial.high.and_then(positive).unwrap_or(price);
        let reported_low = partial.low.and_then(positive).unwrap_or(price);

        self.store.set_baseline_if_absent(
            symbol,
            &BaselineCandidates {
                previous_close,
                open,
                price,
            },
        );

        self.store.update_range(symbol, price);
        self.store.update_range(symbol, reported_high);
        let range = self.store.update_range(symbol, reported_low);

        let (change, change_percent) = self.store.compute_change(symbol, price);

        Quote {
            symbol: symbol.to_string(),
            price,
            open: open.unwrap_or(price),
            previous_close: previous_close.unwrap_or(price),
            high: range.high,
            low: range.low,
            volume: partial.volume.unwrap_or(0),
            change,
            change_percent,
            source: partial.source,
            timestamp: self.clock.now().to_rfc3339(),
        }
    }
}
