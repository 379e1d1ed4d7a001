use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use indicatif::ProgressBar;

use crate::cli::{SubCommandExtend, open_vdb};
use crate::config::{EmbedOptions, Opts, ScrapeOptions, StorageOptions};
use crate::utils::pb_style;
use crate::vdb::TeachRequest;

#[derive(Parser, Debug, Clone)]
pub struct TeachCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub scrape: ScrapeOptions,
    #[command(flatten)]
    pub storage: StorageOptions,
    /// 模型名称，不存在时自动注册
    pub model: String,
    /// 类别名称
    pub class: String,
    /// 要获取的图片数量
    #[arg(short, long, value_name = "N", default_value_t = 8)]
    pub num_images: usize,
    /// 直接使用本地目录中的图片，跳过网络获取
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,
}

impl SubCommandExtend for TeachCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = open_vdb(opts, &self.embed, &self.scrape).await?;

        let pb = ProgressBar::new_spinner()
            .with_style(pb_style())
            .with_message(format!("正在教学 '{}'", self.class));
        pb.enable_steady_tick(Duration::from_millis(100));

        let outcome = db
            .teach(&TeachRequest {
                model_name: self.model.clone(),
                class_name: self.class.clone(),
                num_images: self.num_images,
                source_dir: self.source_dir.clone(),
                prefix: self.storage.prefix.clone(),
            })
            .await?;

        pb.finish_and_clear();
        println!(
            "教学完成: model='{}' class='{}' (id={})，上传 {} 个文件，写入 {} 行元数据",
            self.model, self.class, outcome.class_id, outcome.uploaded, outcome.inserted
        );
        if outcome.degraded > 0 {
            println!("其中 {} 行降级为不带哈希的写入", outcome.degraded);
        }
        Ok(())
    }
}
