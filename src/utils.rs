use std::io;
use std::path::{Path, PathBuf};

use indicatif::ProgressStyle;

/// 把用户输入的名称转换为文件系统安全的 token
///
/// 只保留字母数字、空格、连字符和下划线，去掉首尾空白后把空格换成下划线。
/// token 决定 stage 里的物理子路径，数据库中保存的仍然是原始名称。
pub fn safe_token(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// 计算文件内容的 blake3 哈希
pub fn hash_file(path: impl AsRef<Path>) -> io::Result<blake3::Hash> {
    Ok(blake3::hash(&std::fs::read(path)?))
}

/// 两个向量的余弦相似度，取值范围 [-1, 1]
///
/// 任一向量为零向量时返回 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0. || norm_b == 0. {
        return 0.;
    }
    dot / (norm_a * norm_b)
}

/// f32 向量编码为 BLOB
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(vector).to_vec()
}

/// BLOB 解码为 f32 向量
///
/// BLOB 一定是本进程写入的，长度不是 4 的倍数说明数据损坏
pub fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    bytemuck::pod_collect_to_vec(blob)
}

/// 解析 `c<N>` 形式的类别 ID 中的数字部分
pub fn class_id_number(class_id: &str) -> Option<i64> {
    class_id.strip_prefix('c')?.parse().ok()
}

/// 列出目录下的顶层文件（不递归），按文件名排序
pub fn top_level_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

/// 字节数转换为人类可读的形式
pub fn format_size(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024. {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.;
    }
    format!("{:.1} TB", size)
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}").unwrap()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Orange Water Bottle", "Orange_Water_Bottle")]
    #[case("  Cat  ", "Cat")]
    #[case("foo/bar:baz", "foobarbaz")]
    #[case("a-b_c", "a-b_c")]
    #[case("山 水", "山_水")]
    fn test_safe_token(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(safe_token(name), expected);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1., 0.], &[1., 0.]) - 1.).abs() < 1e-6);
        assert!((cosine_similarity(&[1., 0.], &[0., 1.])).abs() < 1e-6);
        assert!((cosine_similarity(&[1., 0.], &[-1., 0.]) + 1.).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0., 0.], &[1., 0.]), 0.);
    }

    #[test]
    fn test_vector_blob_codec() {
        let vector = vec![0.5f32, -1.25, 3.0];
        assert_eq!(blob_to_vector(&vector_to_blob(&vector)), vector);
    }

    #[rstest]
    #[case("c1", Some(1))]
    #[case("c42", Some(42))]
    #[case("x1", None)]
    #[case("c", None)]
    fn test_class_id_number(#[case] id: &str, #[case] expected: Option<i64>) {
        assert_eq!(class_id_number(id), expected);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
