//! 行情数据模型
//!
//! 定义对外输出的标准行情记录以及数据源返回的部分行情

use serde::{Deserialize, Serialize};

/// 数据源返回的部分行情
///
/// 只有 `price` 一定存在且为正数，其余字段因数据源而异
#[derive(Debug, Clone, PartialEq)]
pub struct PartialQuote {
    /// 最新价
    pub price: f64,
    /// 开盘价
    pub open: Option<f64>,
    /// 昨收价
    pub previous_close: Option<f64>,
    /// 最高价
    pub high: Option<f64>,
    /// 最低价
    pub low: Option<f64>,
    /// 成交量
    pub volume: Option<u64>,
    /// 数据源名称
    pub source: String,
}

impl PartialQuote {
    /// 只有价格的部分行情
    pub fn price_only(price: f64, source: &str) -> Self {
        Self {
            price,
            open: None,
            previous_close: None,
            high: None,
            low: None,
            volume: None,
            source: source.to_string(),
        }
    }
}

/// 标准行情记录
///
/// 每次成功获取时重新构造，交给报表、图表、通知等下游只读使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// 品种代码
    pub symbol: String,
    /// 最新价
    pub price: f64,
    /// 开盘价（缺失时等于最新价）
    pub open: f64,
    /// 昨收价（缺失时等于最新价）
    pub previous_close: f64,
    /// 本交易日最高价
    pub high: f64,
    /// 本交易日最低价
    pub low: f64,
    /// 成交量（缺失时为 0）
    pub volume: u64,
    /// 相对本交易日基准价的涨跌额
    pub change: f64,
    /// 相对本交易日基准价的涨跌幅（百分比）
    pub change_percent: f64,
    /// 数据源名称
    pub source: String,
    /// 获取时间（ISO 8601 格式，交易所本地时区）
    pub timestamp: String,
}

/// 关注品种行情汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub symbol: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    /// 本交易日基准价
    pub baseline: Option<f64>,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub source: String,
    pub timestamp: String,
}

/// 日内价格记录点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: String,
    pub price: f64,
}

/// 交易时段状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatus {
    /// 当前是否在交易时段内
    pub is_open: bool,
    /// 当前交易日
    pub session_date: String,
    /// 已建立基准价的品种数
    pub tracked_symbols: usize,
    /// 当前本地时间
    pub now: String,
}

/// 单轮轮询结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    /// 成功获取的品种
    pub fetched: Vec<String>,
    /// 本轮无数据的品种
    pub skipped: Vec<String>,
}
