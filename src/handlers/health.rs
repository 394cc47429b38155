//! 健康检查
//!
//! GET /health 不需要认证

use actix_web::{web, HttpResponse, Result};
use serde_json::json;
use std::sync::Arc;

use crate::models::ApiResponse;
use crate::services::poller::Poller;

pub async fn health_check(poller: web::Data<Arc<Poller>>) -> Result<HttpResponse> {
    let status = poller.status();
    let response = ApiResponse::success(json!({
        "status": "ok",
        "market_open": status.is_open,
        "session_date": status.session_date,
    }));
    Ok(HttpResponse::Ok().json(response))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
