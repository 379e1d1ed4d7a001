use clap::{Parser, Subcommand};

use crate::cli::{SubCommandExtend, open_vdb};
use crate::config::{EmbedOptions, Opts, ScrapeOptions, StorageOptions};

#[derive(Parser, Debug, Clone)]
pub struct AdminCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub scrape: ScrapeOptions,
    #[command(flatten)]
    pub storage: StorageOptions,
    #[command(subcommand)]
    pub action: AdminAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AdminAction {
    /// 列出所有模型
    Models,
    /// 列出模型下的类别
    Classes {
        /// 模型名称
        model: String,
    },
    /// 删除模型及其所有类别
    DeleteModel {
        /// 模型名称
        model: String,
    },
    /// 删除单个类别
    DeleteClass {
        /// 模型名称
        model: String,
        /// 类别名称
        class: String,
    },
    /// 清理没有对应类别的孤儿文件
    Cleanup,
    /// 查看系统统计信息
    Stats,
}

impl SubCommandExtend for AdminCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = open_vdb(opts, &self.embed, &self.scrape).await?;
        let prefix = &self.storage.prefix;

        match &self.action {
            AdminAction::Models => {
                for model in db.list_models().await? {
                    println!("{}\t{} 个类别", model.name, model.class_count);
                }
            }
            AdminAction::Classes { model } => {
                for class in db.list_classes(model).await? {
                    println!("{}\t{} 张图片", class.name, class.image_count);
                }
            }
            AdminAction::DeleteModel { model } => {
                db.delete_model(model, prefix).await?;
                println!("已删除模型 '{}'", model);
            }
            AdminAction::DeleteClass { model, class } => {
                db.delete_class(model, class, prefix).await?;
                println!("已删除类别 '{}' (model='{}')", class, model);
            }
            AdminAction::Cleanup => {
                let (files, dirs) = db.cleanup_images(prefix).await?;
                println!("清理完成：删除 {} 个文件，{} 个目录", files, dirs);
            }
            AdminAction::Stats => {
                let stats = db.stats().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
        }
        Ok(())
    }
}
