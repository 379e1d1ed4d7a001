use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{info, warn};
use regex::Regex;
use serde::Deserialize;

use crate::utils::safe_token;

static RE_URL_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpe?g|png|webp|gif)(?:\?|$)").unwrap());

/// 图片获取服务：给定搜索词和数量，把图片下载到目标目录
///
/// 允许部分成功，返回实际下载的数量，0 表示完全失败
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn acquire(&self, query: &str, count: usize, dest: &Path) -> Result<usize>;
}

/// 图片搜索接口返回的条目
#[derive(Debug, Deserialize)]
struct ImageHit {
    url: String,
}

/// 基于 HTTP 图片搜索接口的获取服务
///
/// 接口契约：`GET <endpoint>?q=<query>&count=<n>` 返回 `[{"url": ...}, ...]`
pub struct WebImageSource {
    client: reqwest::Client,
    endpoint: String,
}

impl WebImageSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("imteach/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    async fn download(&self, url: &str, token: &str, index: usize, dest: &Path) -> Result<()> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        // 扩展名优先从 content-type 推断，其次从 URL，最后落到 jpg
        let ext = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ctype| ctype.strip_prefix("image/"))
            .map(|sub| sub.split(';').next().unwrap_or(sub).to_string())
            .or_else(|| RE_URL_EXT.captures(url).map(|c| c[1].to_lowercase()))
            .unwrap_or_else(|| "jpg".to_string());
        let ext = if ext == "jpeg" { "jpg".to_string() } else { ext };

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            bail!("空响应");
        }

        std::fs::write(dest.join(format!("{token}_{index}.{ext}")), &bytes)?;
        Ok(())
    }
}

#[async_trait]
impl ImageSource for WebImageSource {
    async fn acquire(&self, query: &str, count: usize, dest: &Path) -> Result<usize> {
        std::fs::create_dir_all(dest)?;

        let hits: Vec<ImageHit> = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("图片搜索接口返回的不是合法 JSON")?;
        info!("搜索 '{}' 返回 {} 个候选", query, hits.len());

        let token = safe_token(query);
        let mut downloaded = 0;
        for hit in &hits {
            if downloaded >= count {
                break;
            }
            match self.download(&hit.url, &token, downloaded, dest).await {
                Ok(()) => downloaded += 1,
                Err(e) => warn!("下载 {} 失败: {e}", hit.url),
            }
        }

        info!("'{}' 下载完成: {}/{}", query, downloaded, count);
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_extension() {
        let captures = RE_URL_EXT.captures("https://example.com/a/b.PNG?x=1").unwrap();
        assert_eq!(captures[1].to_lowercase(), "png");
        assert!(RE_URL_EXT.captures("https://example.com/a/b").is_none());
    }
}
