//! 公共常量和辅助函数

use regex::Regex;

// ==================== Barchart 常量 ====================

/// Barchart 内部行情 API（网页 AJAX 调用的接口）
pub const BARCHART_API_URL: &str = "https://www.barchart.com/proxies/core-api/v1/quotes/get";
/// Barchart 期货行情页面
pub const BARCHART_QUOTE_URL: &str = "https://www.barchart.com/futures/quotes";
/// Barchart API 请求字段
pub const BARCHART_API_FIELDS: &str = "symbol,lastPrice,priceChange,percentChange,highPrice,lowPrice,openPrice,previousPrice,tradeTime,volume";

// ==================== Investing.com 常量 ====================

/// Investing.com 商品行情页面
pub const INVESTING_COMMODITY_URL: &str = "https://www.investing.com/commodities";

// ==================== 请求头 ====================

/// 默认浏览器 User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 轮换使用的 User-Agent 列表
pub const ROTATING_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// 模拟 Chrome 导航请求的请求头
pub fn browser_headers() -> Vec<(String, String)> {
    [
        ("User-Agent", DEFAULT_USER_AGENT),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("DNT", "1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ==================== 数值处理 ====================

/// 解析价格字符串，去除千分位逗号、空白和不间断空格
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && *c != '\u{a0}' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 严格正数校验
pub fn positive(value: f64) -> Option<f64> {
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

/// 用正则取第一个捕获组并解析为数值
pub fn capture_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_number(m.as_str()))
}

/// 截取 `var <name>` 到其后第一个 `};` 之间的脚本片段
pub fn script_var_snippet<'a>(html: &'a str, var_name: &str) -> Option<&'a str> {
    let marker = format!("var {}", var_name);
    let start = html.find(&marker)?;
    let rest = &html[start..];
    let end = rest.find("};").map(|i| i + 2).unwrap_or(rest.len());
    Some(&rest[..end])
}
