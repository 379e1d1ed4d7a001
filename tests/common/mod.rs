use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use imteach::config::ConfDir;
use imteach::embed::Embedder;
use imteach::scrape::ImageSource;
use imteach::vdb::{TeachRequest, VisionDB, VisionDBBuilder};
use tempfile::TempDir;

/// 固定向量的嵌入服务桩
pub struct StubEmbedder {
    image_capability: bool,
    text_vectors: HashMap<String, Vec<f32>>,
    query_vector: Vec<f32>,
}

impl StubEmbedder {
    /// 没有图像嵌入函数的部署，识别走精确匹配阶梯
    pub fn no_image_capability() -> Self {
        Self { image_capability: false, text_vectors: HashMap::new(), query_vector: vec![] }
    }

    /// 有图像嵌入函数的部署，embed_image 固定返回 query_vector
    pub fn with_capability(query_vector: Vec<f32>) -> Self {
        Self { image_capability: true, text_vectors: HashMap::new(), query_vector }
    }

    pub fn text_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.text_vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed_text(&self, _model: &str, text: &str) -> Result<Vec<f32>> {
        Ok(self.text_vectors.get(text).cloned().unwrap_or_else(|| vec![1., 0., 0.]))
    }

    async fn functions(&self) -> Result<Vec<String>> {
        let mut functions = vec!["embed_text_768".to_string()];
        if self.image_capability {
            functions.push("embed_image_768".to_string());
        }
        Ok(functions)
    }

    async fn embed_image(
        &self,
        _model: &str,
        _function: &str,
        _image_ref: &str,
    ) -> Result<Vec<f32>> {
        Ok(self.query_vector.clone())
    }
}

/// 在目标目录生成固定数量假图片的获取服务桩
pub struct StubSource {
    produce: usize,
    pub calls: AtomicUsize,
}

impl StubSource {
    pub fn new(produce: usize) -> Arc<Self> {
        Arc::new(Self { produce, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl ImageSource for StubSource {
    async fn acquire(&self, query: &str, count: usize, dest: &Path) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(dest)?;
        let produced = self.produce.min(count);
        for i in 0..produced {
            std::fs::write(
                dest.join(format!("{}_{i}.jpg", query.to_lowercase())),
                format!("image-bytes-{query}-{i}"),
            )?;
        }
        Ok(produced)
    }
}

pub async fn open_vdb(
    dir: &TempDir,
    embedder: Arc<dyn Embedder>,
    source: Arc<dyn ImageSource>,
) -> Arc<VisionDB> {
    let conf_dir: ConfDir = dir.path().to_str().unwrap().parse().unwrap();
    let db = VisionDBBuilder::new(conf_dir)
        .embedder(embedder)
        .source(source)
        .open()
        .await
        .unwrap();
    Arc::new(db)
}

pub fn teach_request(model: &str, class: &str, num_images: usize) -> TeachRequest {
    TeachRequest {
        model_name: model.to_string(),
        class_name: class.to_string(),
        num_images,
        source_dir: None,
        prefix: "stage".to_string(),
    }
}
