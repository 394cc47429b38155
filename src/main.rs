//! 商品期货行情监控服务
//!
//! 在交易时段内定时轮询关注品种的行情，按交易日固定基准价计算涨跌，
//! 并通过 RESTful API 提供最新行情和当日汇总。
//! 数据来源：Barchart 接口、Barchart 页面、Investing.com

mod config;     // 配置加载
mod handlers;   // HTTP 请求处理器
mod middleware; // 中间件
mod models;     // 数据模型定义
mod services;   // 业务逻辑服务

use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::middleware::ApiKeyMiddleware;
use crate::services::market::{
    default_providers, Clock, MarketCalendar, ProviderChain, QuoteFetcher, SessionStore,
    SymbolRegistry, SystemClock,
};
use crate::services::poller::Poller;

/// 应用程序入口
///
/// 启动后台轮询任务和 HTTP 服务器
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 先初始化日志，加载配置时的告警才能输出；未设置 RUST_LOG 时再按配置调整级别
    let rust_log_set = env::var_os("RUST_LOG").is_some();
    env_logger::init_from_env(Env::default().default_filter_or("trace"));
    if !rust_log_set {
        log::set_max_level(log::LevelFilter::Info);
    }

    let config = AppConfig::load();
    if !rust_log_set {
        log::set_max_level(config.log.level_filter());
    }

    let tz = config.market.tz()?;
    let (open, close, reset_at) = config.market.times()?;

    if config.api.api_key.is_empty() {
        log::warn!("未设置 API Key，接口不做认证");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(tz));
    let calendar = MarketCalendar::new(open, close);
    let store = Arc::new(SessionStore::new(calendar.session_date(&clock.now())));
    let chain = ProviderChain::new(default_providers(&config.api)?);
    log::info!("数据源顺序: {}", chain.provider_names().join(" → "));

    let registry = SymbolRegistry::new(config.watchlist.clone());
    log::info!(
        "关注 {} 个品种，交易时段 {} {}-{}，每日 {} 重置",
        registry.len(),
        tz,
        open.format("%H:%M"),
        close.format("%H:%M"),
        reset_at.format("%H:%M")
    );

    let fetcher = Arc::new(QuoteFetcher::new(chain, store, clock, registry));
    let poller = Arc::new(Poller::new(
        fetcher,
        calendar,
        reset_at,
        Duration::from_secs(config.market.poll_interval_secs),
    ));

    tokio::spawn(poller.clone().run());

    let bind_addr = config.bind_addr();
    let api_key = config.api.api_key.clone();
    log::info!("启动商品行情监控服务，监听 {}", bind_addr);

    // 创建并启动 HTTP 服务器
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(poller.clone()))
            .wrap(Logger::default())  // 请求日志
            .wrap(ApiKeyMiddleware::new(api_key.clone()))  // API Key 认证
            .configure(handlers::config)  // 配置路由
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    server.bind(bind_addr)?.run().await?;
    Ok(())
}
