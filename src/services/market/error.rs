//! 行情获取错误分类
//!
//! 这些错误都在 Provider / ProviderChain 内部被消化为软失败，
//! 只用于日志和链路推进，不会向上传播到调用方

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// 网络错误、超时或非 2xx 状态
    #[error("传输失败: {0}")]
    Transport(String),
    /// 响应成功但没有任何提取器命中
    #[error("提取失败: {0}")]
    Extraction(String),
    /// 提取到了值但未通过数值校验（非正数）
    #[error("无效数值: {0}")]
    InvalidValue(String),
    /// 该数据源没有此品种的代码映射
    #[error("未配置: {0}")]
    NotConfigured(String),
    /// 链上所有数据源都失败
    #[error("所有数据源均失败: {symbol}（尝试 {attempts} 个）")]
    AllProvidersExhausted { symbol: String, attempts: usize },
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Transport(format!("请求超时: {}", e))
        } else if let Some(status) = e.status() {
            FetchError::Transport(format!("HTTP {}", status))
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
