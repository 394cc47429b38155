//! 业务逻辑服务模块
//!
//! 封装数据获取和处理逻辑

pub mod market;  // 行情获取与基准价
pub mod poller;  // 轮询调度
