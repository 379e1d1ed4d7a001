use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "imteach").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap()
}

/// 嵌入服务选项
#[derive(Parser, Debug, Clone)]
pub struct EmbedOptions {
    /// 嵌入服务地址
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:8100")]
    pub embed_url: String,
    /// 文本/图像嵌入使用的模型名
    #[arg(long, value_name = "NAME", default_value = "arctic-embed-m")]
    pub embed_model: String,
    /// 外部调用的统一超时，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub timeout: u64,
}

/// 图片获取选项
#[derive(Parser, Debug, Clone)]
pub struct ScrapeOptions {
    /// 图片搜索接口地址
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:8200/search")]
    pub scrape_endpoint: String,
}

/// 存储选项
#[derive(Parser, Debug, Clone)]
pub struct StorageOptions {
    /// stage 内的上传前缀
    #[arg(long, value_name = "PREFIX", default_value = "stage")]
    pub prefix: String,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imteach", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imteach 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 教学：为模型注册一个新类别
    Teach(TeachCommand),
    /// 识别：对一张图片做类别相似度排序
    Classify(ClassifyCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
    /// 管理模型、类别与存储
    Admin(AdminCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("imteach.db")
    }

    /// 返回存储 stage 的根目录
    pub fn stage(&self) -> PathBuf {
        self.path.join("stage")
    }

    /// 返回下载图片的本地目录
    pub fn images(&self) -> PathBuf {
        self.path.join("images")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
