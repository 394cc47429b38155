//! 价格提取器
//!
//! 每个提取器是一条独立的启发式规则：从原始响应体中取出一个数值。
//! 提取器之间互不依赖，找不到目标或解析失败时返回 `None`，
//! 由调用方按优先级依次尝试，第一个得到严格正数的提取器胜出。
//!
//! 上游页面结构经常变化，新增或替换规则只需要修改对应的列表。

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use super::common::{capture_number, parse_number, positive, script_var_snippet};
use super::error::FetchError;

/// 单个提取器
#[derive(Clone, Copy)]
pub struct Extractor {
    /// 规则名称（用于日志）
    pub name: &'static str,
    /// 提取函数
    pub extract: fn(&str) -> Option<f64>,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Extractor").field(&self.name).finish()
    }
}

lazy_static! {
    static ref JSON_LAST_PRICE: Regex = Regex::new(r#""lastPrice":"?([\d,.]+)"#).unwrap();
    static ref SCRIPT_LAST_PRICE: Regex = Regex::new(r#""lastPrice":\s*"?([\d,.]+)"#).unwrap();
    static ref DATA_LAST_PRICE: Regex = Regex::new(r#"data-last-price="([\d,.]+)""#).unwrap();
    static ref LAST_CHANGE_SPAN: Regex =
        Regex::new(r#"<span[^>]*class="[^"]*last-change[^"]*"[^>]*>([\d,.]+)</span>"#).unwrap();
    static ref INVESTING_PRICE: Regex =
        Regex::new(r#"data-test="instrument-price-last"[^>]*>([0-9,]+\.?[0-9]*)"#).unwrap();

    static ref JSON_OPEN: Regex = Regex::new(r#""open(?:Price)?":"?([\d,.]+)"#).unwrap();
    static ref SCRIPT_OPEN: Regex = Regex::new(r#""open(?:Price)?":\s*"?([\d,.]+)"#).unwrap();
    static ref DATA_OPEN: Regex = Regex::new(r#"data-open="([\d,.]+)""#).unwrap();

    static ref JSON_PREVIOUS: Regex =
        Regex::new(r#""previous(?:Price|Close)":"?([\d,.]+)"#).unwrap();
    static ref DATA_PREVIOUS: Regex = Regex::new(r#"data-previous-price="([\d,.]+)""#).unwrap();

    static ref JSON_HIGH: Regex = Regex::new(r#""highPrice":"?([\d,.]+)"#).unwrap();
    static ref JSON_LOW: Regex = Regex::new(r#""lowPrice":"?([\d,.]+)"#).unwrap();
}

// ==================== 结构化接口字段 ====================

/// 把 JSON 值转成数值，兼容数字和带格式的字符串（"4,521s"、"+0.78%"）
fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(
            s.trim()
                .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%'),
        ),
        _ => None,
    }
}

/// 取 Barchart API 响应 `data[0]` 中的字段，优先使用 `raw` 里的原始数值
pub fn api_field(body: &str, field: &str) -> Option<f64> {
    let json: Value = serde_json::from_str(body).ok()?;
    let item = json.get("data")?.as_array()?.first()?;
    item.get("raw")
        .and_then(|raw| raw.get(field))
        .and_then(json_number)
        .or_else(|| item.get(field).and_then(json_number))
}

/// Barchart API 成交量
pub fn api_volume(body: &str) -> Option<u64> {
    api_field(body, "volume")
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
}

fn api_last_price(body: &str) -> Option<f64> {
    api_field(body, "lastPrice")
}

fn api_open(body: &str) -> Option<f64> {
    api_field(body, "openPrice").or_else(|| api_field(body, "open"))
}

fn api_previous(body: &str) -> Option<f64> {
    api_field(body, "previousPrice").or_else(|| api_field(body, "previousClose"))
}

fn api_high(body: &str) -> Option<f64> {
    api_field(body, "highPrice")
}

fn api_low(body: &str) -> Option<f64> {
    api_field(body, "lowPrice")
}

// ==================== 页面内嵌规则 ====================

fn embedded_json_last_price(html: &str) -> Option<f64> {
    capture_number(&JSON_LAST_PRICE, html)
}

fn data_last_price_attr(html: &str) -> Option<f64> {
    capture_number(&DATA_LAST_PRICE, html)
}

fn bc_quote_app_last_price(html: &str) -> Option<f64> {
    script_var_snippet(html, "bcQuoteApp").and_then(|s| capture_number(&SCRIPT_LAST_PRICE, s))
}

fn last_change_span(html: &str) -> Option<f64> {
    capture_number(&LAST_CHANGE_SPAN, html)
}

fn embedded_json_open(html: &str) -> Option<f64> {
    capture_number(&JSON_OPEN, html)
}

fn data_open_attr(html: &str) -> Option<f64> {
    capture_number(&DATA_OPEN, html)
}

fn bc_quote_app_open(html: &str) -> Option<f64> {
    script_var_snippet(html, "bcQuoteApp").and_then(|s| capture_number(&SCRIPT_OPEN, s))
}

fn embedded_json_previous(html: &str) -> Option<f64> {
    capture_number(&JSON_PREVIOUS, html)
}

fn data_previous_price_attr(html: &str) -> Option<f64> {
    capture_number(&DATA_PREVIOUS, html)
}

fn embedded_json_high(html: &str) -> Option<f64> {
    capture_number(&JSON_HIGH, html)
}

fn embedded_json_low(html: &str) -> Option<f64> {
    capture_number(&JSON_LOW, html)
}

// ==================== Investing.com ====================

/// 用 CSS 选择器取元素文本并解析为数值
fn select_number(html: &str, selector: &str) -> Option<f64> {
    let selector = Selector::parse(selector).ok()?;
    let document = Html::parse_document(html);
    let element = document.select(&selector).next()?;
    let text = element.text().collect::<Vec<_>>().join("");
    parse_number(text.trim())
}

fn investing_price_element(html: &str) -> Option<f64> {
    select_number(html, r#"[data-test="instrument-price-last"]"#)
}

fn investing_price_pattern(html: &str) -> Option<f64> {
    capture_number(&INVESTING_PRICE, html)
}

fn investing_open(html: &str) -> Option<f64> {
    select_number(html, r#"[data-test="open-value"]"#)
}

fn investing_prev_close(html: &str) -> Option<f64> {
    select_number(html, r#"[data-test="prevClose-value"]"#)
}

// ==================== 规则列表（按优先级排列） ====================

pub const API_PRICE: &[Extractor] = &[Extractor { name: "api.lastPrice", extract: api_last_price }];
pub const API_OPEN: &[Extractor] = &[Extractor { name: "api.openPrice", extract: api_open }];
pub const API_PREVIOUS: &[Extractor] =
    &[Extractor { name: "api.previousPrice", extract: api_previous }];
pub const API_HIGH: &[Extractor] = &[Extractor { name: "api.highPrice", extract: api_high }];
pub const API_LOW: &[Extractor] = &[Extractor { name: "api.lowPrice", extract: api_low }];

/// 浏览器请求头抓取页面时的价格规则
pub const PAGE_PRICE: &[Extractor] = &[
    Extractor { name: "json.lastPrice", extract: embedded_json_last_price },
    Extractor { name: "attr.data-last-price", extract: data_last_price_attr },
    Extractor { name: "script.bcQuoteApp", extract: bc_quote_app_last_price },
];

/// 轮换 UA 抓取页面时的价格规则
pub const FALLBACK_PAGE_PRICE: &[Extractor] = &[
    Extractor { name: "attr.data-last-price", extract: data_last_price_attr },
    Extractor { name: "json.lastPrice", extract: embedded_json_last_price },
    Extractor { name: "span.last-change", extract: last_change_span },
];

pub const PAGE_OPEN: &[Extractor] = &[
    Extractor { name: "json.open", extract: embedded_json_open },
    Extractor { name: "attr.data-open", extract: data_open_attr },
    Extractor { name: "script.bcQuoteApp.open", extract: bc_quote_app_open },
];

pub const PAGE_PREVIOUS: &[Extractor] = &[
    Extractor { name: "json.previousPrice", extract: embedded_json_previous },
    Extractor { name: "attr.data-previous-price", extract: data_previous_price_attr },
];

pub const PAGE_HIGH: &[Extractor] = &[Extractor { name: "json.highPrice", extract: embedded_json_high }];
pub const PAGE_LOW: &[Extractor] = &[Extractor { name: "json.lowPrice", extract: embedded_json_low }];

pub const INVESTING_PRICE_RULES: &[Extractor] = &[
    Extractor { name: "investing.instrument-price-last", extract: investing_price_element },
    Extractor { name: "investing.pattern", extract: investing_price_pattern },
];

pub const INVESTING_OPEN: &[Extractor] = &[Extractor { name: "investing.open-value", extract: investing_open }];
pub const INVESTING_PREVIOUS: &[Extractor] =
    &[Extractor { name: "investing.prevClose-value", extract: investing_prev_close }];

// ==================== 执行 ====================

/// 按顺序执行价格规则，返回第一个严格正数及命中的规则名称
///
/// 有规则取到了值但全部非正时返回 `InvalidValue`，否则返回 `Extraction`
pub fn extract_price(
    extractors: &[Extractor],
    body: &str,
) -> Result<(f64, &'static str), FetchError> {
    let mut rejected = None;

    for extractor in extractors {
        match (extractor.extract)(body) {
            Some(value) => match positive(value) {
                Some(price) => return Ok((price, extractor.name)),
                None => {
                    log::debug!("规则 {} 取到非正数 {}", extractor.name, value);
                    rejected.get_or_insert((extractor.name, value));
                }
            },
            None => log::debug!("规则 {} 未命中", extractor.name),
        }
    }

    match rejected {
        Some((name, value)) => Err(FetchError::InvalidValue(format!("{} = {}", name, value))),
        None => Err(FetchError::Extraction(format!(
            "{} 条规则均未命中",
            extractors.len()
        ))),
    }
}

/// 辅助字段（开盘价、昨收等）：取第一个严格正数，没有则为 `None`
pub fn first_positive(extractors: &[Extractor], body: &str) -> Option<f64> {
    extractors
        .iter()
        .find_map(|e| (e.extract)(body).and_then(positive))
}
