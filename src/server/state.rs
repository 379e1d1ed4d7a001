use std::sync::Arc;

use crate::cli::server::ServerCommand;
use crate::config::StorageOptions;
use crate::vdb::VisionDB;

/// 应用状态
pub struct AppState {
    /// 教学/识别管线
    pub db: Arc<VisionDB>,
    /// 存储配置选项
    pub storage: StorageOptions,
    /// 管理接口的鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(db: Arc<VisionDB>, opts: ServerCommand) -> Arc<Self> {
        Arc::new(AppState { db, storage: opts.storage, token: opts.token })
    }
}
