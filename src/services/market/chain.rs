//! 数据源瀑布链
//!
//! 按顺序调用数据源，第一个成功（正价格）即返回，后面的数据源不再调用。
//! 全部失败是正常情况，表示"本轮无数据"。

use crate::config::SymbolConfig;
use crate::models::PartialQuote;

use super::error::FetchError;
use super::providers::{ProviderOutcome, QuoteProvider};

/// 有序数据源列表
pub struct ProviderChain {
    providers: Vec<Box<dyn QuoteProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn QuoteProvider>>) -> Self {
        Self { providers }
    }

    /// 数据源名称（按调用顺序）
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// 依次尝试数据源，返回第一个成功结果；全部失败时返回 `AllProvidersExhausted`
    pub async fn fetch_partial(&self, symbol: &SymbolConfig) -> Result<PartialQuote, FetchError> {
        log::info!("🌊 瀑布获取 {} ({})", symbol.name, symbol.symbol);

        for provider in &self.providers {
            match provider.fetch(symbol).await {
                ProviderOutcome::Success(quote) if quote.price > 0.0 => {
                    log::info!("  ✅ [{}] {} = {:.2}", provider.name(), symbol.symbol, quote.price);
                    return Ok(quote);
                }
                ProviderOutcome::Success(quote) => {
                    log::warn!("  ❌ [{}] 返回非正价格 {}", provider.name(), quote.price);
                }
                ProviderOutcome::SoftFailure(FetchError::NotConfigured(reason)) => {
                    log::debug!("  ⏭️ [{}] 跳过: {}", provider.name(), reason);
                }
                ProviderOutcome::SoftFailure(e) => {
                    log::warn!("  ❌ [{}] {}", provider.name(), e);
                }
            }
        }

        Err(FetchError::AllProvidersExhausted {
            symbol: symbol.symbol.clone(),
            attempts: self.providers.len(),
        })
    }

    /// 依次尝试数据源，全部失败时返回 `None`
    pub async fn fetch_quote_partial(&self, symbol: &SymbolConfig) -> Option<PartialQuote> {
        match self.fetch_partial(symbol).await {
            Ok(quote) => Some(quote),
            Err(e) => {
                log::warn!("⚠️ {}，本轮跳过", e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// 按脚本返回结果并记录调用次数的数据源
    pub struct ScriptedProvider {
        pub name: &'static str,
        pub outcomes: Mutex<Vec<ProviderOutcome>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        /// 每次调用依次弹出一个结果，用完后重复最后一个
        pub fn new(name: &'static str, outcomes: Vec<ProviderOutcome>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = Self {
                name,
                outcomes: Mutex::new(outcomes),
                calls: calls.clone(),
            };
            (provider, calls)
        }
    }

    pub fn success(price: f64) -> ProviderOutcome {
        ProviderOutcome::Success(PartialQuote::price_only(price, "fake"))
    }

    pub fn failure() -> ProviderOutcome {
        ProviderOutcome::SoftFailure(FetchError::Transport("HTTP 403".to_string()))
    }

    #[async_trait]
    impl QuoteProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _symbol: &SymbolConfig) -> ProviderOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.remove(0)
            } else {
                outcomes.first().cloned().unwrap_or_else(failure)
            }
        }
    }

    pub fn symbol_config(symbol: &str) -> SymbolConfig {
        SymbolConfig {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            category: "Softs".to_string(),
            exchange: "ICE".to_string(),
            barchart: None,
            investing: None,
        }
    }
}
