use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use utoipa::ToSchema;

/// 教学请求参数
#[derive(TryFromMultipart)]
pub struct TeachRequestForm {
    pub model_name: String,
    pub class_name: String,
    pub num_images: Option<usize>,
    pub source_dir: Option<String>,
    pub background: Option<bool>,
}

/// 教学表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct TeachForm {
    /// 模型名称，不存在时自动注册
    pub model_name: String,
    /// 类别名称，(模型, 类别) 重复时直接失败
    pub class_name: String,
    /// 要获取的图片数量
    pub num_images: Option<usize>,
    /// 使用服务器上的本地目录作为图片来源，跳过网络获取
    pub source_dir: Option<String>,
    /// 是否后台执行：获取完成后立即返回，登记在独立任务中继续
    pub background: Option<bool>,
}

/// 识别请求参数
#[derive(TryFromMultipart)]
pub struct ClassifyRequest {
    pub file: FieldData<Bytes>,
    pub model: Option<String>,
}

/// 识别表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct ClassifyForm {
    /// 上传的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 限定候选类别的模型名称
    pub model: Option<String>,
}

/// 识别响应
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct ClassifyResponse {
    /// 识别耗时，单位为毫秒
    pub time: u32,
    /// 候选类别，格式为 `(得分, 类别名称)`，按得分降序
    pub result: Vec<(f32, String)>,
}
