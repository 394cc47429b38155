//! 行情接口处理器
//!
//! ## API 列表
//! - GET /quotes - 关注品种当日汇总
//! - GET /quotes/{symbol} - 实时获取单个品种
//! - GET /quotes/{symbol}/history - 单个品种当日价格点
//! - POST /check - 后台执行一轮轮询
//! - GET /market/status - 交易时段状态

use actix_web::{web, HttpResponse, Result};
use std::sync::Arc;

use crate::models::{ApiResponse, CycleReport, MarketStatus, PricePoint, Quote, QuoteSummary};
use crate::services::poller::Poller;

/// 关注品种当日汇总
///
/// GET /api/v1/quotes
pub async fn list_quotes(poller: web::Data<Arc<Poller>>) -> Result<HttpResponse> {
    let summary: Vec<QuoteSummary> = poller.summary();
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

/// 实时获取单个品种
///
/// GET /api/v1/quotes/{symbol}
///
/// # 参数
/// - symbol: 品种代码（如 RC=F）
pub async fn get_quote(
    poller: web::Data<Arc<Poller>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let symbol = path.into_inner();

    if !poller.is_tracked(&symbol) {
        let response = ApiResponse::<Quote>::error(format!("未配置的品种: {}", symbol));
        return Ok(HttpResponse::NotFound().json(response));
    }

    match poller.fetch_one(&symbol).await {
        Some(quote) => Ok(HttpResponse::Ok().json(ApiResponse::success(quote))),
        None => {
            let response = ApiResponse::<Quote>::error(format!("{} 暂无数据，所有数据源均失败", symbol));
            Ok(HttpResponse::ServiceUnavailable().json(response))
        }
    }
}

/// 单个品种当日价格点
///
/// GET /api/v1/quotes/{symbol}/history
pub async fn get_history(
    poller: web::Data<Arc<Poller>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let symbol = path.into_inner();
    match poller.history(&symbol) {
        Some(points) => Ok(HttpResponse::Ok().json(ApiResponse::success(points))),
        None => {
            let response = ApiResponse::<Vec<PricePoint>>::error(format!("未配置的品种: {}", symbol));
            Ok(HttpResponse::NotFound().json(response))
        }
    }
}

/// 后台执行一轮轮询，立即返回
///
/// POST /api/v1/check
pub async fn trigger_check(poller: web::Data<Arc<Poller>>) -> Result<HttpResponse> {
    let poller = poller.get_ref().clone();
    tokio::spawn(async move {
        let report: CycleReport = poller.run_cycle().await;
        log::info!("🖐️ 手动检查完成: {:?}", report);
    });
    Ok(HttpResponse::Accepted().json(ApiResponse::success("Check started")))
}

/// 交易时段状态
///
/// GET /api/v1/market/status
pub async fn market_status(poller: web::Data<Arc<Poller>>) -> Result<HttpResponse> {
    let status: MarketStatus = poller.status();
    Ok(HttpResponse::Ok().json(ApiResponse::success(status)))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/quotes", web::get().to(list_quotes))
        .route("/quotes/{symbol}", web::get().to(get_quote))
        .route("/quotes/{symbol}/history", web::get().to(get_history))
        .route("/check", web::post().to(trigger_check))
        .route("/market/status", web::get().to(market_status));
}
