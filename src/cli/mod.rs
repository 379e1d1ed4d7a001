mod admin;
mod classify;
pub mod server;
mod teach;

pub use admin::*;
pub use classify::*;
pub use server::*;
pub use teach::*;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbedOptions, Opts, ScrapeOptions};
use crate::embed::HttpEmbedder;
use crate::scrape::WebImageSource;
use crate::vdb::{VisionDB, VisionDBBuilder};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 按配置组装教学/识别管线
pub(crate) async fn open_vdb(
    opts: &Opts,
    embed: &EmbedOptions,
    scrape: &ScrapeOptions,
) -> anyhow::Result<Arc<VisionDB>> {
    let timeout = Duration::from_secs(embed.timeout);
    let embedder = Arc::new(HttpEmbedder::new(&embed.embed_url, timeout)?);
    let source = Arc::new(WebImageSource::new(&scrape.scrape_endpoint, timeout)?);

    let db = VisionDBBuilder::new(opts.conf_dir.clone())
        .embed_model(&embed.embed_model)
        .embedder(embedder)
        .source(source)
        .open()
        .await?;

    Ok(Arc::new(db))
}
