//! 商品期货行情获取与交易日基准价
//!
//! ## 组成
//! - 提取器：从原始响应中取出价格的独立规则
//! - 数据源：封装单个上游，返回部分行情或软失败
//! - 瀑布链：按顺序尝试数据源，第一个成功即返回
//! - 交易日历：交易时段判断和每日重置触发
//! - 基准价存储：每个品种每个交易日的基准价、最高价、最低价
//! - 行情获取：合并链路结果和基准价，输出标准行情

pub mod calendar;
pub mod chain;
pub mod common;
pub mod error;
pub mod extractors;
pub mod fetcher;
pub mod providers;
pub mod registry;
pub mod session;

pub use calendar::{Clock, DailyReset, MarketCalendar, SystemClock};
pub use chain::ProviderChain;
pub use fetcher::QuoteFetcher;
pub use providers::default_providers;
pub use registry::SymbolRegistry;
pub use session::SessionStore;
