use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use tokio::task::block_in_place;

use crate::config::ConfDir;
use crate::db::{self, ClassSummary, Database, ImageMetaRecord, ModelSummary, TableCounts, crud};
use crate::embed::Embedder;
use crate::error::TeachError;
use crate::scrape::ImageSource;
use crate::storage::Storage;
use crate::utils::{format_size, hash_file, safe_token, vector_to_blob};

/// 教学请求
#[derive(Debug, Clone)]
pub struct TeachRequest {
    pub model_name: String,
    pub class_name: String,
    /// 要获取的图片数量
    pub num_images: usize,
    /// 指定时直接使用本地目录中的图片，不调用图片获取服务
    pub source_dir: Option<PathBuf>,
    /// stage 内的上传前缀
    pub prefix: String,
}

/// 教学结果
#[derive(Debug, Serialize)]
pub struct TeachOutcome {
    /// 分配的类别 ID
    pub class_id: String,
    /// 上传的文件数量
    pub uploaded: usize,
    /// 写入的元数据行数
    pub inserted: usize,
    /// 降级为三列写入的行数
    pub degraded: usize,
}

/// 系统统计信息
#[derive(Debug, Serialize)]
pub struct SystemStats {
    /// stage 占用空间，人类可读
    pub storage_used: String,
    pub total_models: i64,
    pub total_classes: i64,
    /// 各表行数
    pub counts: TableCounts,
    /// 嵌入服务当前可用的函数列表，服务不可达时为空
    pub functions: Vec<String>,
}

pub struct VisionDB {
    pub(crate) db: Database,
    pub(crate) storage: Storage,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) source: Arc<dyn ImageSource>,
    pub(crate) embed_model: String,
    images_dir: PathBuf,
}

pub struct VisionDBBuilder {
    conf_dir: ConfDir,
    embed_model: String,
    embedder: Option<Arc<dyn Embedder>>,
    source: Option<Arc<dyn ImageSource>>,
}

impl VisionDBBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self {
            conf_dir,
            embed_model: "arctic-embed-m".to_string(),
            embedder: None,
            source: None,
        }
    }

    pub fn embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub async fn open(self) -> Result<VisionDB> {
        std::fs::create_dir_all(self.conf_dir.path())?;
        let db = db::init_db(self.conf_dir.database()).await?;
        let storage = Storage::open(self.conf_dir.stage())?;

        Ok(VisionDB {
            db,
            storage,
            embedder: self.embedder.context("未配置嵌入服务")?,
            source: self.source.context("未配置图片获取服务")?,
            embed_model: self.embed_model,
            images_dir: self.conf_dir.images(),
        })
    }
}

impl VisionDB {
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// 教学：为模型注册一个新类别，同步走完全部流程
    pub async fn teach(&self, req: &TeachRequest) -> Result<TeachOutcome, TeachError> {
        let src_dir = self.prepare(req).await?;
        self.register(req, &src_dir).await
    }

    /// 后台教学
    ///
    /// 重复检查和图片获取同步完成——重复检查只有在任务启动之前做才可靠；
    /// 其余步骤交给独立任务，父请求返回后任务继续运行，
    /// 失败只会体现在日志和"类别始终没有出现"上。
    pub async fn teach_detached(self: Arc<Self>, req: TeachRequest) -> Result<(), TeachError> {
        let src_dir = self.prepare(&req).await?;

        tokio::spawn(async move {
            match self.register(&req, &src_dir).await {
                Ok(outcome) => {
                    info!("后台教学完成: class='{}' (id={})", req.class_name, outcome.class_id)
                }
                Err(e) => warn!("后台教学失败: class='{}': {e}", req.class_name),
            }
        });

        Ok(())
    }

    /// 教学准备：重复检查 + 解析图片来源（步骤 1-3）
    ///
    /// 重复检查必须在任何获取/上传之前完成，避免白下载和孤儿文件
    async fn prepare(&self, req: &TeachRequest) -> Result<PathBuf, TeachError> {
        if crud::model_class_exists(&self.db, &req.model_name, &req.class_name).await? {
            return Err(TeachError::DuplicateClass {
                model: req.model_name.clone(),
                class: req.class_name.clone(),
            });
        }

        if let Some(dir) = &req.source_dir {
            return Ok(dir.clone());
        }

        let dest =
            self.images_dir.join(safe_token(&req.model_name)).join(safe_token(&req.class_name));
        let downloaded = self
            .source
            .acquire(&req.class_name, req.num_images, &dest)
            .await
            .map_err(|e| {
                warn!("图片获取服务出错: {e:#}");
                TeachError::Acquisition { query: req.class_name.clone() }
            })?;
        if downloaded == 0 {
            return Err(TeachError::Acquisition { query: req.class_name.clone() });
        }

        info!("'{}' 获取到 {} 张图片", req.class_name, downloaded);
        Ok(dest)
    }

    /// 教学登记：模型、类别 ID、上传、元数据、嵌入、映射（步骤 4-10）
    ///
    /// 关系写入包在一个事务里；上传发生在事务之外的文件系统上，
    /// 出错回滚时已上传的文件不会被删除（已知限制，打日志说明）
    async fn register(&self, req: &TeachRequest, src_dir: &Path) -> Result<TeachOutcome, TeachError> {
        let model_token = safe_token(&req.model_name);
        let class_token = safe_token(&req.class_name);
        let stage_prefix = format!("{}/{}/{}", req.prefix.trim_matches('/'), model_token, class_token);

        // 类别名称的文本向量；此时还没有产生任何写入
        let vector = self
            .embedder
            .embed_text(&self.embed_model, &req.class_name)
            .await
            .map_err(TeachError::Embed)?;

        let mut tx = self.db.begin().await?;

        crud::add_model(&mut *tx, &req.model_name).await?;
        let class_id = crud::next_class_id(&mut *tx).await?;

        let upload = match self.storage.put(src_dir, &stage_prefix) {
            Ok(upload) => upload,
            Err(e) => {
                warn!("上传失败，回滚关系写入: {e}");
                return Err(TeachError::Upload(e));
            }
        };

        // 重试教学时先清掉同名 caption 的旧行再重写，保证重试收敛
        crud::delete_image_metadata_by_caption(&mut *tx, &req.class_name).await?;

        let local_files: Vec<PathBuf> =
            upload.uploaded_files.iter().map(|remote| self.storage.resolve(remote)).collect();
        let hashes: Vec<Option<blake3::Hash>> =
            block_in_place(|| local_files.par_iter().map(|file| hash_file(file).ok()).collect());

        // 逐行尽力写入：带哈希的写入失败时降级为三列，只有全部失败才致命
        let mut inserted = 0;
        let mut degraded = 0;
        for (remote, hash) in upload.uploaded_files.iter().zip(&hashes) {
            let basename = remote.rsplit('/').next().unwrap_or(remote);
            let image_id =
                basename.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(basename).to_string();
            let record = ImageMetaRecord {
                image_id,
                file_path: remote.clone(),
                caption: req.class_name.clone(),
                file_hash: hash.as_ref().map(|h| h.as_bytes().to_vec()),
            };

            match crud::add_image_metadata(&mut *tx, &record).await {
                Ok(()) => inserted += 1,
                Err(e) => {
                    warn!("带哈希写入 {} 失败，降级为三列: {e}", record.file_path);
                    match crud::add_image_metadata_reduced(
                        &mut *tx,
                        &record.image_id,
                        &record.file_path,
                        &record.caption,
                    )
                    .await
                    {
                        Ok(()) => {
                            inserted += 1;
                            degraded += 1;
                        }
                        Err(e) => warn!("降级写入 {} 仍然失败: {e}", record.file_path),
                    }
                }
            }
        }
        if inserted == 0 {
            warn!("元数据全部写入失败，回滚；{} 个已上传文件保留在 stage 里", upload.rowcount);
            return Err(TeachError::MetadataInsert { total: upload.rowcount });
        }

        if !crud::add_class_embedding(&mut *tx, &class_id, &req.class_name, &vector_to_blob(&vector))
            .await?
        {
            warn!("类别 '{}' 已有嵌入，保留旧行", req.class_name);
        }
        crud::add_model_class(&mut *tx, &req.model_name, &req.class_name).await?;

        tx.commit().await?;

        info!(
            "教学完成: model='{}' class='{}' (id={})，上传 {} 个文件，写入 {} 行元数据",
            req.model_name, req.class_name, class_id, upload.rowcount, inserted
        );
        Ok(TeachOutcome { class_id, uploaded: upload.rowcount, inserted, degraded })
    }

    /// 模型列表及类别数量
    pub async fn list_models(&self) -> sqlx::Result<Vec<ModelSummary>> {
        crud::list_models(&self.db).await
    }

    /// 某模型下的类别及图片数量
    pub async fn list_classes(&self, model: &str) -> sqlx::Result<Vec<ClassSummary>> {
        crud::list_classes(&self.db, model).await
    }

    /// 删除模型：级联删除类别映射、嵌入、图片元数据和 stage 文件
    pub async fn delete_model(&self, name: &str, prefix: &str) -> Result<()> {
        let classes = crud::list_classes(&self.db, name).await?;

        let mut tx = self.db.begin().await?;
        for class in &classes {
            crud::delete_class_embedding(&mut *tx, &class.name).await?;
            crud::delete_image_metadata_by_caption(&mut *tx, &class.name).await?;
        }
        crud::delete_model(&mut *tx, name).await?;
        tx.commit().await?;

        // 文件删除放在提交之后，失败不影响关系状态
        let dir = format!("{}/{}", prefix.trim_matches('/'), safe_token(name));
        self.storage.remove_prefix(&dir)?;

        info!("删除模型 '{}' 及其 {} 个类别", name, classes.len());
        Ok(())
    }

    /// 删除单个类别：嵌入、映射和它自己的图片元数据，不影响其他类别
    pub async fn delete_class(&self, model: &str, class: &str, prefix: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;
        crud::delete_class_embedding(&mut *tx, class).await?;
        crud::delete_model_class(&mut *tx, model, class).await?;
        crud::delete_image_metadata_by_caption(&mut *tx, class).await?;
        tx.commit().await?;

        let dir = format!("{}/{}/{}", prefix.trim_matches('/'), safe_token(model), safe_token(class));
        self.storage.remove_prefix(&dir)?;

        info!("删除类别 '{}' (model='{}')", class, model);
        Ok(())
    }

    /// 清理 stage 中没有对应注册类别的孤儿目录，返回删除的 (文件数, 目录数)
    pub async fn cleanup_images(&self, prefix: &str) -> Result<(usize, usize)> {
        let valid: HashSet<String> = crud::all_class_names(&self.db)
            .await?
            .iter()
            .map(|class| safe_token(class))
            .collect();
        Ok(self.storage.cleanup(prefix, &valid)?)
    }

    /// 系统统计：空间占用、行数和嵌入服务的函数列表
    pub async fn stats(&self) -> Result<SystemStats> {
        let counts = crud::table_counts(&self.db).await?;
        // 诊断视图容忍嵌入服务不可达
        let functions = match self.embedder.functions().await {
            Ok(functions) => functions,
            Err(e) => {
                warn!("获取嵌入服务函数列表失败: {e:#}");
                vec![]
            }
        };

        Ok(SystemStats {
            storage_used: format_size(self.storage.usage()),
            total_models: counts.models,
            total_classes: counts.model_classes,
            counts,
            functions,
        })
    }
}
