//! 行情数据源
//!
//! 每个数据源封装一个上游：构造请求、按优先级运行提取器、返回部分行情或软失败。
//! 数据源不修改任何共享状态，所有错误都在这里转换为 [`ProviderOutcome::SoftFailure`]。
//!
//! ## 数据源
//! - Barchart 内部行情 API（结构化 JSON，最便宜）
//! - Barchart 行情页面，浏览器请求头
//! - Barchart 行情页面，轮换 UA + 随机延迟 + 重试
//! - Investing.com 商品页面

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{Client, RequestBuilder};
use std::future::Future;
use std::time::Duration;

use crate::config::{ApiConfig, SymbolConfig};
use crate::models::PartialQuote;

use super::common::{
    browser_headers, BARCHART_API_FIELDS, BARCHART_API_URL, BARCHART_QUOTE_URL,
    DEFAULT_USER_AGENT, INVESTING_COMMODITY_URL, ROTATING_USER_AGENTS,
};
use super::error::FetchError;
use super::extractors::{self, extract_price, first_positive};

/// 单次数据源调用的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Success(PartialQuote),
    SoftFailure(FetchError),
}

impl From<Result<PartialQuote, FetchError>> for ProviderOutcome {
    fn from(result: Result<PartialQuote, FetchError>) -> Self {
        match result {
            Ok(quote) => ProviderOutcome::Success(quote),
            Err(e) => ProviderOutcome::SoftFailure(e),
        }
    }
}

/// 行情数据源
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// 数据源名称
    fn name(&self) -> &str;

    /// 获取单个品种的部分行情，永不返回错误，失败统一为软失败
    async fn fetch(&self, symbol: &SymbolConfig) -> ProviderOutcome;
}

// ==================== HTTP 辅助 ====================

/// 请求类型，决定使用哪个超时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// 结构化接口
    Api,
    /// 整页 HTML
    Page,
}

impl FetchKind {
    pub fn timeout_secs(self, api: &ApiConfig) -> u64 {
        match self {
            FetchKind::Api => api.timeout_secs,
            FetchKind::Page => api.page_timeout_secs,
        }
    }
}

/// 构建带超时的 HTTP 客户端
pub fn build_client(timeout_secs: u64, connect_timeout_secs: u64) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .gzip(true)
        .cookie_store(true)
        .build()
        .map_err(FetchError::from)
}

/// 发送请求并读取文本，非 2xx 视为传输失败
async fn send_text(request: RequestBuilder) -> Result<String, FetchError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Transport(format!("HTTP {}", status)));
    }
    Ok(response.text().await?)
}

/// 在 `[min, max]` 毫秒内取随机延迟
fn jitter(range_ms: (u64, u64)) -> Duration {
    let (min, max) = range_ms;
    if max <= min {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// 只对传输失败重试；提取失败对同一响应体重试没有意义，直接返回
pub async fn retry_transport<F, Fut, T>(
    attempts: usize,
    pause_ms: (u64, u64),
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transport() && attempt < attempts => {
                log::warn!("  ⚠️ 第 {} 次请求失败，准备重试: {}", attempt, e);
                tokio::time::sleep(jitter(pause_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// 取数据源的品种代码，缺失时软失败
fn require<'a>(code: &'a Option<String>, provider: &str, symbol: &str) -> Result<&'a str, FetchError> {
    code.as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| FetchError::NotConfigured(format!("{} 没有 {} 的代码映射", provider, symbol)))
}

/// 页面类数据源共用的字段组装
fn page_quote(
    body: &str,
    price_rules: &[extractors::Extractor],
    source: &str,
) -> Result<PartialQuote, FetchError> {
    let (price, rule) = extract_price(price_rules, body)?;
    log::debug!("{} 命中规则 {}: {}", source, rule, price);
    Ok(PartialQuote {
        price,
        open: first_positive(extractors::PAGE_OPEN, body),
        previous_close: first_positive(extractors::PAGE_PREVIOUS, body),
        high: first_positive(extractors::PAGE_HIGH, body),
        low: first_positive(extractors::PAGE_LOW, body),
        volume: None,
        source: source.to_string(),
    })
}

// ==================== Barchart API ====================

/// Barchart 内部行情 API
pub struct BarchartApiProvider {
    client: Client,
}

impl BarchartApiProvider {
    pub const SOURCE: &'static str = "Barchart API";
    pub const KIND: FetchKind = FetchKind::Api;

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 解析 API 响应
    pub fn parse(body: &str) -> Result<PartialQuote, FetchError> {
        let (price, _) = extract_price(extractors::API_PRICE, body)?;
        Ok(PartialQuote {
            price,
            open: first_positive(extractors::API_OPEN, body),
            previous_close: first_positive(extractors::API_PREVIOUS, body),
            high: first_positive(extractors::API_HIGH, body),
            low: first_positive(extractors::API_LOW, body),
            volume: extractors::api_volume(body),
            source: Self::SOURCE.to_string(),
        })
    }

    async fn try_fetch(&self, symbol: &SymbolConfig) -> Result<PartialQuote, FetchError> {
        let code = require(&symbol.barchart, Self::SOURCE, &symbol.symbol)?;
        log::info!("  📡 [{}] 请求 {} ({})", Self::SOURCE, symbol.symbol, code);

        let request = self
            .client
            .get(BARCHART_API_URL)
            .query(&[("fields", BARCHART_API_FIELDS), ("list", code)])
            .header("User-Agent", DEFAULT_USER_AGENT)
            .header("Accept", "application/json")
            .header("Referer", format!("{}/{}", BARCHART_QUOTE_URL, code))
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Origin", "https://www.barchart.com");

        let body = send_text(request).await?;
        Self::parse(&body)
    }
}

#[async_trait]
impl QuoteProvider for BarchartApiProvider {
    fn name(&self) -> &str {
        Self::SOURCE
    }

    async fn fetch(&self, symbol: &SymbolConfig) -> ProviderOutcome {
        self.try_fetch(symbol).await.into()
    }
}

// ==================== Barchart 页面（浏览器请求头） ====================

/// 以浏览器请求头抓取 Barchart 行情页面
pub struct BarchartPageProvider {
    client: Client,
    headers: Vec<(String, String)>,
}

impl BarchartPageProvider {
    pub const SOURCE: &'static str = "Barchart (Browser)";
    pub const KIND: FetchKind = FetchKind::Page;

    pub fn new(client: Client, headers: Vec<(String, String)>) -> Self {
        Self { client, headers }
    }

    pub fn parse(html: &str) -> Result<PartialQuote, FetchError> {
        page_quote(html, extractors::PAGE_PRICE, Self::SOURCE)
    }

    async fn try_fetch(&self, symbol: &SymbolConfig) -> Result<PartialQuote, FetchError> {
        let code = require(&symbol.barchart, Self::SOURCE, &symbol.symbol)?;
        let url = format!("{}/{}", BARCHART_QUOTE_URL, code);
        log::info!("  📡 [{}] 请求 {}", Self::SOURCE, url);

        let mut request = self.client.get(&url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let body = send_text(request).await?;
        Self::parse(&body)
    }
}

#[async_trait]
impl QuoteProvider for BarchartPageProvider {
    fn name(&self) -> &str {
        Self::SOURCE
    }

    async fn fetch(&self, symbol: &SymbolConfig) -> ProviderOutcome {
        self.try_fetch(symbol).await.into()
    }
}

// ==================== Barchart 页面（轮换 UA + 重试） ====================

/// 重试与延迟策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub attempts: usize,
    /// 首次请求前的随机延迟（毫秒）
    pub initial_delay_ms: (u64, u64),
    /// 两次尝试之间的随机间隔（毫秒）
    pub retry_delay_ms: (u64, u64),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            initial_delay_ms: (500, 1500),
            retry_delay_ms: (1000, 2000),
        }
    }
}

/// 轮换 User-Agent 抓取 Barchart 行情页面，最后的兜底数据源之一
pub struct BarchartRetryProvider {
    client: Client,
    policy: RetryPolicy,
}

impl BarchartRetryProvider {
    pub const SOURCE: &'static str = "Barchart (Anti-Bot Headers)";
    pub const KIND: FetchKind = FetchKind::Page;

    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn parse(html: &str) -> Result<PartialQuote, FetchError> {
        page_quote(html, extractors::FALLBACK_PAGE_PRICE, Self::SOURCE)
    }

    fn pick_user_agent() -> &'static str {
        ROTATING_USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    async fn try_fetch(&self, symbol: &SymbolConfig) -> Result<PartialQuote, FetchError> {
        let code = require(&symbol.barchart, Self::SOURCE, &symbol.symbol)?;
        let url = format!("{}/{}", BARCHART_QUOTE_URL, code);
        let user_agent = Self::pick_user_agent();
        log::info!("  📡 [{}] 请求 {}", Self::SOURCE, url);

        tokio::time::sleep(jitter(self.policy.initial_delay_ms)).await;

        let body = retry_transport(self.policy.attempts, self.policy.retry_delay_ms, |_| {
            let mut request = self.client.get(&url);
            for (name, value) in browser_headers() {
                if name != "User-Agent" {
                    request = request.header(name, value);
                }
            }
            let request = request
                .header("User-Agent", user_agent)
                .header("Sec-Fetch-User", "?1")
                .header("Cache-Control", "max-age=0")
                .header("Referer", "https://www.google.com/");
            send_text(request)
        })
        .await?;

        Self::parse(&body)
    }
}

#[async_trait]
impl QuoteProvider for BarchartRetryProvider {
    fn name(&self) -> &str {
        Self::SOURCE
    }

    async fn fetch(&self, symbol: &SymbolConfig) -> ProviderOutcome {
        self.try_fetch(symbol).await.into()
    }
}

// ==================== Investing.com ====================

/// Investing.com 商品页面
pub struct InvestingProvider {
    client: Client,
}

impl InvestingProvider {
    pub const SOURCE: &'static str = "Investing.com";
    pub const KIND: FetchKind = FetchKind::Page;

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn parse(html: &str) -> Result<PartialQuote, FetchError> {
        let (price, rule) = extract_price(extractors::INVESTING_PRICE_RULES, html)?;
        log::debug!("{} 命中规则 {}: {}", Self::SOURCE, rule, price);
        Ok(PartialQuote {
            open: first_positive(extractors::INVESTING_OPEN, html),
            previous_close: first_positive(extractors::INVESTING_PREVIOUS, html),
            ..PartialQuote::price_only(price, Self::SOURCE)
        })
    }

    async fn try_fetch(&self, symbol: &SymbolConfig) -> Result<PartialQuote, FetchError> {
        let slug = require(&symbol.investing, Self::SOURCE, &symbol.symbol)?;
        let url = format!("{}/{}", INVESTING_COMMODITY_URL, slug);
        log::info!("  📡 [{}] 请求 {}", Self::SOURCE, url);

        let request = self
            .client
            .get(&url)
            .header("User-Agent", DEFAULT_USER_AGENT)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.5")
            .header("DNT", "1")
            .header("Upgrade-Insecure-Requests", "1");

        let body = send_text(request).await?;
        Self::parse(&body)
    }
}

#[async_trait]
impl QuoteProvider for InvestingProvider {
    fn name(&self) -> &str {
        Self::SOURCE
    }

    async fn fetch(&self, symbol: &SymbolConfig) -> ProviderOutcome {
        self.try_fetch(symbol).await.into()
    }
}

/// 按配置构建默认数据源列表（便宜的结构化接口在前，重型页面抓取在后）
pub fn default_providers(api: &ApiConfig) -> Result<Vec<Box<dyn QuoteProvider>>, FetchError> {
    let client = |kind: FetchKind| build_client(kind.timeout_secs(api), api.connect_timeout_secs);

    Ok(vec![
        Box::new(BarchartApiProvider::new(client(BarchartApiProvider::KIND)?)),
        Box::new(BarchartPageProvider::new(
            client(BarchartPageProvider::KIND)?,
            browser_headers(),
        )),
        Box::new(BarchartRetryProvider::new(
            client(BarchartRetryProvider::KIND)?,
            RetryPolicy::default(),
        )),
        Box::new(InvestingProvider::new(client(InvestingProvider::KIND)?)),
    ])
}
