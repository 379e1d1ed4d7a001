use std::cmp::Ordering;
use std::io;
use std::path::Path;

use log::{debug, info, warn};
use serde::Serialize;

use crate::db::crud;
use crate::embed::{ImageEmbeddingCapability, probe_image_capability};
use crate::error::ClassifyError;
use crate::utils::{blob_to_vector, class_id_number, cosine_similarity, hash_file};
use crate::vdb::VisionDB;

/// 单个候选类别与其得分
#[derive(Debug, Clone, Serialize)]
pub struct ClassMatch {
    pub class_name: String,
    pub score: f32,
}

/// 相似度排序最多返回的候选数量
pub const MAX_RESULTS: usize = 5;

// 精确匹配阶梯的固定置信度，按置信度降序逐级尝试
const CONFIDENCE_PATH: f32 = 1.0;
const CONFIDENCE_HASH: f32 = 0.98;
const CONFIDENCE_BASENAME: f32 = 0.95;

impl VisionDB {
    /// 识别一张图片，返回按得分降序的候选类别
    ///
    /// 有图像嵌入函数时走向量排序；没有时走精确匹配阶梯。
    /// 能力每次调用现场探测，不跨请求缓存。
    pub async fn classify(
        &self,
        image: &Path,
        prefix: &str,
        model: Option<&str>,
    ) -> Result<Vec<ClassMatch>, ClassifyError> {
        if !image.is_file() {
            return Err(ClassifyError::MissingImage(image.to_path_buf()));
        }

        let upload = self.storage.put(image, prefix).map_err(ClassifyError::Upload)?;
        let remote = upload.uploaded_files.into_iter().next().ok_or_else(|| {
            ClassifyError::Upload(io::Error::new(io::ErrorKind::Other, "上传结果为空"))
        })?;

        let capability =
            probe_image_capability(&*self.embedder).await.map_err(ClassifyError::Service)?;

        match capability {
            ImageEmbeddingCapability::Available(function) => {
                self.classify_by_vector(&remote, &function, model).await
            }
            ImageEmbeddingCapability::Unavailable => {
                debug!("没有图像嵌入函数，进入精确匹配阶梯");
                self.classify_by_ladder(image, &remote).await
            }
        }
    }

    /// 向量路径：嵌入上传的图片，与存储的类别嵌入逐一做余弦相似度
    async fn classify_by_vector(
        &self,
        remote: &str,
        function: &str,
        model: Option<&str>,
    ) -> Result<Vec<ClassMatch>, ClassifyError> {
        let query = self
            .embedder
            .embed_image(&self.embed_model, function, remote)
            .await
            .map_err(ClassifyError::Service)?;

        let rows = crud::class_embeddings(&self.db, model).await?;
        if rows.is_empty() {
            // 表里有行但过滤后为空是一种独立的错误状态，带行数方便诊断
            let total = crud::count_class_embeddings(&self.db).await?;
            return Err(ClassifyError::EmptyRanking { total });
        }

        let mut scored: Vec<(String, ClassMatch)> = rows
            .into_iter()
            .map(|row| {
                let score = cosine_similarity(&query, &blob_to_vector(&row.text_vector));
                (row.class_id, ClassMatch { class_name: row.class_name, score })
            })
            .collect();

        // 得分降序；得分相同时按类别 ID 的数字部分升序，保证结果确定
        scored.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| class_id_number(&a.0).cmp(&class_id_number(&b.0)))
        });
        scored.truncate(MAX_RESULTS);

        Ok(scored.into_iter().map(|(_, m)| m).collect())
    }

    /// 精确匹配阶梯：远程路径 → 内容哈希 → 文件名，首个命中即返回
    async fn classify_by_ladder(
        &self,
        local: &Path,
        remote: &str,
    ) -> Result<Vec<ClassMatch>, ClassifyError> {
        // 第一级：刚上传文件的远程路径精确命中
        if let Some(caption) = crud::caption_by_path(&self.db, remote).await? {
            info!("路径精确命中: {remote}");
            return Ok(vec![ClassMatch { class_name: caption, score: CONFIDENCE_PATH }]);
        }

        // 第二级：内容哈希命中。哈希列可能不存在，查询失败按本级不可用处理
        match hash_file(local) {
            Ok(hash) => match crud::caption_by_hash(&self.db, hash.as_bytes()).await {
                Ok(Some(caption)) => {
                    info!("内容哈希命中: {remote}");
                    return Ok(vec![ClassMatch { class_name: caption, score: CONFIDENCE_HASH }]);
                }
                Ok(None) => {}
                Err(e) => warn!("哈希匹配不可用，跳过: {e}"),
            },
            Err(e) => warn!("读取图片内容失败，跳过哈希匹配: {e}"),
        }

        // 第三级：任意前缀下的同名文件命中
        let basename = remote.rsplit('/').next().unwrap_or(remote);
        if let Some(caption) = crud::caption_by_basename(&self.db, basename).await? {
            info!("文件名命中: {basename}");
            return Ok(vec![ClassMatch { class_name: caption, score: CONFIDENCE_BASENAME }]);
        }

        let image_rows = crud::count_image_metadata(&self.db).await?;
        Err(ClassifyError::NoMatch { image_rows })
    }
}
