//! 配置模块
//!
//! 支持从 JSON 文件加载系统配置，包括行情源超时、交易时段和关注品种列表

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 工作线程数（0 表示使用 CPU 核心数）
    #[serde(default)]
    pub workers: usize,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API Key（为空则不启用认证）
    #[serde(default)]
    pub api_key: String,
    /// 接口请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// 页面抓取超时时间（秒），页面比接口慢
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
    /// 连接超时时间（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// 交易时段配置
///
/// 时间均为 `timezone` 下的本地时间，格式 `HH:MM`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// IANA 时区名称
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// 开盘时间
    #[serde(default = "default_open_time")]
    pub open_time: String,
    /// 收盘时间
    #[serde(default = "default_close_time")]
    pub close_time: String,
    /// 每日重置时间，必须落在休市时段内
    #[serde(default = "default_reset_time")]
    pub reset_time: String,
    /// 轮询间隔（秒）
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// 关注品种配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// 品种代码（如 RC=F）
    pub symbol: String,
    /// 显示名称
    pub name: String,
    /// 分类（Softs / Grains / Oils）
    #[serde(default)]
    pub category: String,
    /// 交易所
    #[serde(default)]
    pub exchange: String,
    /// Barchart 合约代码（如 RMF26）
    #[serde(default)]
    pub barchart: Option<String>,
    /// Investing.com 页面路径（如 london-coffee）
    #[serde(default)]
    pub investing: Option<String>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// API 配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
    /// 交易时段配置
    #[serde(default)]
    pub market: MarketConfig,
    /// 关注品种列表
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<SymbolConfig>,
}

// 默认值函数
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_timeout() -> u64 { 10 }
fn default_page_timeout() -> u64 { 15 }
fn default_connect_timeout() -> u64 { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_timezone() -> String { "Africa/Cairo".to_string() }
fn default_open_time() -> String { "09:00".to_string() }
fn default_close_time() -> String { "18:00".to_string() }
fn default_reset_time() -> String { "01:00".to_string() }
fn default_poll_interval() -> u64 { 600 }

fn symbol(
    symbol: &str,
    name: &str,
    category: &str,
    exchange: &str,
    barchart: Option<&str>,
    investing: Option<&str>,
) -> SymbolConfig {
    SymbolConfig {
        symbol: symbol.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        exchange: exchange.to_string(),
        barchart: barchart.map(str::to_string),
        investing: investing.map(str::to_string),
    }
}

fn default_watchlist() -> Vec<SymbolConfig> {
    vec![
        symbol("RC=F", "Robusta Coffee", "Softs", "ICE", Some("RMF26"), Some("london-coffee")),
        symbol("KC=F", "Arabica Coffee", "Softs", "ICE", None, Some("us-coffee-c")),
        symbol("SB=F", "Sugar No.11", "Softs", "ICE", None, Some("us-sugar-no11")),
        symbol("CC=F", "Cocoa", "Softs", "ICE", None, Some("us-cocoa")),
        symbol("ZW=F", "Wheat", "Grains", "CBOT", None, Some("us-wheat")),
        symbol("ZL=F", "Soybean Oil", "Oils", "CBOT", None, Some("us-soybean-oil")),
        symbol("PO=F", "Palm Oil", "Oils", "BMD", None, Some("palm-oil")),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            timeout_secs: default_timeout(),
            page_timeout_secs: default_page_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            open_time: default_open_time(),
            close_time: default_close_time(),
            reset_time: default_reset_time(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            log: LogConfig::default(),
            market: MarketConfig::default(),
            watchlist: default_watchlist(),
        }
    }
}

impl LogConfig {
    /// 配置的日志级别，无法识别时使用 info
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or_else(|_| {
            log::warn!("无效的日志级别 {}，使用 info", self.level);
            log::LevelFilter::Info
        })
    }
}

impl MarketConfig {
    /// 解析时区
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("无效的时区 {}: {}", self.timezone, e))
    }

    /// 解析开盘、收盘、重置三个时间点
    pub fn times(&self) -> anyhow::Result<(NaiveTime, NaiveTime, NaiveTime)> {
        let parse = |s: &str| {
            NaiveTime::parse_from_str(s, "%H:%M")
                .map_err(|e| anyhow::anyhow!("无效的时间格式 {}: {}", s, e))
        };
        let open = parse(&self.open_time)?;
        let close = parse(&self.close_time)?;
        let reset = parse(&self.reset_time)?;

        if open >= close {
            anyhow::bail!("开盘时间 {} 必须早于收盘时间 {}", self.open_time, self.close_time);
        }
        // 开盘和收盘时刻都算交易时段
        if reset >= open && reset <= close {
            anyhow::bail!("重置时间 {} 不能落在交易时段内", self.reset_time);
        }
        Ok((open, close, reset))
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 加载配置，优先从文件，失败则使用默认值
    pub fn load() -> Self {
        let config_paths = ["config.json", "config/config.json"];

        let mut config = None;
        for path in config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(c) => {
                        log::info!("从 {} 加载配置成功", path);
                        config = Some(c);
                        break;
                    }
                    Err(e) => {
                        log::warn!("加载配置文件 {} 失败: {}", path, e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            log::info!("使用默认配置");
            Self::default()
        });

        if let Ok(key) = std::env::var("API_KEY") {
            config.api.api_key = key;
        }
        config
    }

    /// 获取服务器绑定地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
