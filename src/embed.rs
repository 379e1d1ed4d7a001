use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

/// 图像嵌入能力
///
/// 每次识别调用现场探测一次，不跨请求缓存：服务端账号的权限随时可能变化
#[derive(Debug, Clone, PartialEq)]
pub enum ImageEmbeddingCapability {
    /// 服务端存在图像嵌入函数，记录函数名
    Available(String),
    /// 服务端没有图像嵌入函数，识别时进入精确匹配阶梯
    Unavailable,
}

/// 嵌入服务的调用契约
#[async_trait]
pub trait Embedder: Send + Sync {
    /// 文本 → 定长向量
    async fn embed_text(&self, model: &str, text: &str) -> Result<Vec<f32>>;
    /// 服务端当前可用的函数名列表
    async fn functions(&self) -> Result<Vec<String>>;
    /// 图像引用 → 定长向量，function 为探测到的函数名
    async fn embed_image(&self, model: &str, function: &str, image_ref: &str) -> Result<Vec<f32>>;
}

/// 在函数列表中查找图像嵌入函数
pub async fn probe_image_capability(embedder: &dyn Embedder) -> Result<ImageEmbeddingCapability> {
    let functions = embedder.functions().await?;
    let capability = functions
        .into_iter()
        .find(|name| name.to_ascii_lowercase().contains("embed_image"))
        .map(ImageEmbeddingCapability::Available)
        .unwrap_or(ImageEmbeddingCapability::Unavailable);
    debug!("图像嵌入能力: {:?}", capability);
    Ok(capability)
}

#[derive(Serialize)]
struct EmbedTextRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct EmbedImageRequest<'a> {
    model: &'a str,
    function: &'a str,
    image: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    vector: Vec<f32>,
}

#[derive(Deserialize)]
struct FunctionsResponse {
    functions: Vec<String>,
}

/// HTTP 嵌入服务客户端
///
/// 所有外部调用共用客户端级别的统一超时，没有按调用的覆盖
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_text(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let response: EmbedResponse = self
            .client
            .post(format!("{}/embed_text", self.base_url))
            .json(&EmbedTextRequest { model, text })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("嵌入服务返回的不是合法 JSON")?;
        Ok(response.vector)
    }

    async fn functions(&self) -> Result<Vec<String>> {
        let response: FunctionsResponse = self
            .client
            .get(format!("{}/functions", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("嵌入服务返回的不是合法 JSON")?;
        Ok(response.functions)
    }

    async fn embed_image(&self, model: &str, function: &str, image_ref: &str) -> Result<Vec<f32>> {
        let response: EmbedResponse = self
            .client
            .post(format!("{}/embed_image", self.base_url))
            .json(&EmbedImageRequest { model, function, image: image_ref })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("嵌入服务返回的不是合法 JSON")?;
        Ok(response.vector)
    }
}
