use std::path::PathBuf;

use thiserror::Error;

/// 教学流程的错误分类
#[derive(Debug, Error)]
pub enum TeachError {
    /// 图片获取服务一张图片都没有产出，在任何上传发生之前失败
    #[error("图片获取失败：'{query}' 没有下载到任何图片")]
    Acquisition { query: String },
    /// (模型, 类别) 已经注册过，在获取和上传之前失败
    #[error("类别重复：模型 '{model}' 已经训练过类别 '{class}'")]
    DuplicateClass { model: String, class: String },
    /// 上传到存储失败，不会写入任何元数据
    #[error("上传到存储失败: {0}")]
    Upload(#[source] std::io::Error),
    /// 所有行都写入失败才算致命，单行降级写入不在此列
    #[error("{total} 个上传文件的元数据一行都没有写入成功")]
    MetadataInsert { total: usize },
    /// 类别名称的文本向量生成失败
    #[error("文本向量生成失败: {0}")]
    Embed(anyhow::Error),
    #[error("数据库错误: {0}")]
    Store(#[from] sqlx::Error),
}

/// 识别流程的错误分类
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("待识别的图片不存在: {}", .0.display())]
    MissingImage(PathBuf),
    #[error("上传到存储失败: {0}")]
    Upload(#[source] std::io::Error),
    /// 嵌入服务本身不可达；和"没有图像嵌入函数"不同，后者会进入精确匹配阶梯
    #[error("嵌入服务调用失败: {0}")]
    Service(anyhow::Error),
    /// 向量路径执行了但没有返回任何候选行，带行数方便诊断
    #[error("嵌入表中有 {total} 行，但过滤后的查询没有返回任何候选")]
    EmptyRanking { total: i64 },
    /// 精确匹配阶梯全部落空
    #[error("没有图像嵌入函数，{image_rows} 行图片元数据中也没有精确匹配")]
    NoMatch { image_rows: i64 },
    #[error("数据库错误: {0}")]
    Store(#[from] sqlx::Error),
}
