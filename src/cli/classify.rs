use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::classify::ClassMatch;
use crate::cli::{SubCommandExtend, open_vdb};
use crate::config::{EmbedOptions, Opts, ScrapeOptions, StorageOptions};

#[derive(Parser, Debug, Clone)]
pub struct ClassifyCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub scrape: ScrapeOptions,
    #[command(flatten)]
    pub storage: StorageOptions,
    /// 被识别的图片路径
    pub image: PathBuf,
    /// 限定候选类别的模型名称
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ClassifyCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = open_vdb(opts, &self.embed, &self.scrape).await?;

        let result =
            db.classify(&self.image, &self.storage.prefix, self.model.as_deref()).await?;

        print_result(&result, self)
    }
}

fn print_result(result: &[ClassMatch], opts: &ClassifyCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for m in result {
                println!("{:.2}\t{}", m.score, m.class_name);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}

impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            _ => unreachable!(),
        }
    }
}
