use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use walkdir::WalkDir;

use crate::utils::top_level_files;

/// 一次上传操作的结果
#[derive(Debug)]
pub struct UploadResult {
    /// 成功上传的文件，stage 内的远程路径，统一使用 `/` 分隔
    pub uploaded_files: Vec<String>,
    /// 上传的文件数量
    pub rowcount: usize,
}

/// 本地文件系统实现的存储 stage
///
/// 远程路径形如 `<prefix>/<model_token>/<class_token>/<basename>`，
/// 与元数据表中的 file_path 一一对应。
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 上传单个文件，或目录中的全部顶层文件（不递归），返回上传清单
    ///
    /// 目标目录不存在时自动创建；同名文件直接覆盖
    pub fn put(&self, local: &Path, prefix: &str) -> io::Result<UploadResult> {
        let files = if local.is_dir() {
            let files = top_level_files(local)?;
            if files.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("目录下没有可上传的文件: {}", local.display()),
                ));
            }
            files
        } else if local.is_file() {
            vec![local.to_path_buf()]
        } else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("路径不存在: {}", local.display()),
            ));
        };

        let prefix = prefix.trim_matches('/');
        let dest_dir = self.root.join(prefix);
        fs::create_dir_all(&dest_dir)?;

        let mut uploaded_files = Vec::with_capacity(files.len());
        for file in &files {
            let basename = file
                .file_name()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "文件名不能为空"))?
                .to_string_lossy()
                .into_owned();
            fs::copy(file, dest_dir.join(&basename))?;
            uploaded_files.push(format!("{prefix}/{basename}"));
        }

        info!("PUT {} 个文件到 {}", uploaded_files.len(), prefix);
        Ok(UploadResult { rowcount: uploaded_files.len(), uploaded_files })
    }

    /// 远程路径对应的本地文件
    pub fn resolve(&self, remote: &str) -> PathBuf {
        self.root.join(remote)
    }

    /// 删除一个前缀下的所有文件
    pub fn remove_prefix(&self, prefix: &str) -> io::Result<()> {
        let dir = self.root.join(prefix.trim_matches('/'));
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!("删除前缀 {}", prefix);
        }
        Ok(())
    }

    /// 递归统计 stage 占用的字节数
    pub fn usage(&self) -> u64 {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }

    /// 清理孤儿文件：删除 `<prefix>/<model>/<class>` 布局中
    /// token 不在 valid 集合里的类别目录，再清掉空出来的模型目录。
    /// 返回删除的 (文件数, 目录数)。
    pub fn cleanup(&self, prefix: &str, valid: &HashSet<String>) -> io::Result<(usize, usize)> {
        let base = self.root.join(prefix.trim_matches('/'));
        if !base.is_dir() {
            return Ok((0, 0));
        }

        let mut files_removed = 0;
        let mut dirs_removed = 0;

        for model_entry in fs::read_dir(&base)? {
            let model_dir = model_entry?.path();
            if !model_dir.is_dir() {
                continue;
            }
            for class_entry in fs::read_dir(&model_dir)? {
                let class_dir = class_entry?.path();
                if !class_dir.is_dir() {
                    continue;
                }
                let token = class_dir.file_name().unwrap_or_default().to_string_lossy().into_owned();
                if valid.contains(&token) {
                    continue;
                }
                files_removed += WalkDir::new(&class_dir)
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_file())
                    .count();
                fs::remove_dir_all(&class_dir)?;
                dirs_removed += 1;
            }
            // 模型目录空了就一并清掉
            if fs::read_dir(&model_dir)?.next().is_none() {
                fs::remove_dir(&model_dir)?;
                dirs_removed += 1;
            }
        }

        info!("清理完成：删除 {} 个文件，{} 个目录", files_removed, dirs_removed);
        Ok((files_removed, dirs_removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_put_dir_top_level_only() {
        let src = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        write_file(&src.path().join("a.jpg"), "a");
        write_file(&src.path().join("b.jpg"), "b");
        // 子目录里的文件不会被上传
        write_file(&src.path().join("nested/c.jpg"), "c");

        let storage = Storage::open(root.path()).unwrap();
        let result = storage.put(src.path(), "stage/Animals/Cat").unwrap();

        assert_eq!(result.rowcount, 2);
        assert_eq!(
            result.uploaded_files,
            vec!["stage/Animals/Cat/a.jpg", "stage/Animals/Cat/b.jpg"]
        );
        assert!(storage.resolve("stage/Animals/Cat/a.jpg").is_file());
        assert!(!storage.resolve("stage/Animals/Cat/c.jpg").exists());
    }

    #[test]
    fn test_put_missing_path() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::open(root.path()).unwrap();
        assert!(storage.put(Path::new("/no/such/file.jpg"), "stage").is_err());
    }

    #[test]
    fn test_cleanup_orphans() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::open(root.path()).unwrap();
        write_file(&root.path().join("stage/Animals/Cat/cat_0.jpg"), "x");
        write_file(&root.path().join("stage/Animals/Gone/gone_0.jpg"), "y");
        write_file(&root.path().join("stage/Empty/Gone2/gone_1.jpg"), "z");

        let valid = HashSet::from(["Cat".to_string()]);
        let (files, dirs) = storage.cleanup("stage", &valid).unwrap();

        assert_eq!(files, 2);
        // Gone、Gone2 两个类别目录加上空掉的 Empty 模型目录
        assert_eq!(dirs, 3);
        assert!(storage.resolve("stage/Animals/Cat/cat_0.jpg").is_file());
        assert!(!storage.resolve("stage/Animals/Gone").exists());
        assert!(!storage.resolve("stage/Empty").exists());
    }
}
