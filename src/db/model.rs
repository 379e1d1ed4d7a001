use serde::Serialize;
use sqlx::FromRow;

/// 模型概要
#[derive(Debug, FromRow, Serialize)]
pub struct ModelSummary {
    /// 模型名称
    pub name: String,
    /// 类别数量
    pub class_count: i64,
}

/// 类别概要
#[derive(Debug, FromRow, Serialize)]
pub struct ClassSummary {
    /// 类别名称
    pub name: String,
    /// 图片数量
    pub image_count: i64,
}

/// 图片元数据记录
#[derive(Debug, Clone, FromRow)]
pub struct ImageMetaRecord {
    /// 图片 ID，即去掉扩展名的文件名
    pub image_id: String,
    /// stage 内的远程路径
    pub file_path: String,
    /// 标注，默认为类别名称
    pub caption: String,
    /// 内容 blake3 哈希，旧表结构中可能缺失
    pub file_hash: Option<Vec<u8>>,
}

/// 类别嵌入记录
#[derive(Debug, FromRow)]
pub struct ClassEmbeddingRecord {
    /// `c<N>` 形式的类别 ID
    pub class_id: String,
    /// 类别名称
    pub class_name: String,
    /// 类别名称的文本向量，f32 的 BLOB 编码
    pub text_vector: Vec<u8>,
}

/// 各表行数统计
#[derive(Debug, Default, FromRow, Serialize)]
pub struct TableCounts {
    pub models: i64,
    pub model_classes: i64,
    pub image_metadata: i64,
    pub class_embeddings: i64,
}
