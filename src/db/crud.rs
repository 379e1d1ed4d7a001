use sqlx::{Executor, Result, Row, Sqlite, SqlitePool};

use super::{ClassEmbeddingRecord, ClassSummary, ImageMetaRecord, ModelSummary, TableCounts};

/// 注册模型，已存在则忽略
pub async fn add_model<'c, E>(executor: E, name: &str) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("INSERT OR IGNORE INTO model (name) VALUES (?)")
        .bind(name)
        .execute(executor)
        .await?;
    Ok(())
}

/// 检查 (模型, 类别) 映射是否已存在
pub async fn model_class_exists(executor: &SqlitePool, model: &str, class: &str) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM model_class WHERE model_name = ? AND class_name = ?",
    )
    .bind(model)
    .bind(class)
    .fetch_one(executor)
    .await?;

    Ok(row.get::<i64, _>("count") > 0)
}

/// 注册 (模型, 类别) 映射，已存在则忽略
pub async fn add_model_class<'c, E>(executor: E, model: &str, class: &str) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("INSERT OR IGNORE INTO model_class (model_name, class_name) VALUES (?, ?)")
        .bind(model)
        .bind(class)
        .execute(executor)
        .await?;
    Ok(())
}

/// 分配下一个类别 ID
///
/// 取当前所有 `c<N>` 中数字部分的最大值加一，表为空时从 c1 开始。
/// 删除造成的空洞不会被回填。
pub async fn next_class_id<'c, E>(executor: E) -> Result<String>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT COALESCE(MAX(CAST(substr(class_id, 2) AS INTEGER)), 0) AS max_id
        FROM class_embedding WHERE class_id LIKE 'c%'
        "#,
    )
    .fetch_one(executor)
    .await?;

    Ok(format!("c{}", row.get::<i64, _>("max_id") + 1))
}

/// 写入一行带内容哈希的图片元数据
pub async fn add_image_metadata<'c, E>(executor: E, record: &ImageMetaRecord) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO image_metadata (image_id, file_path, caption, file_hash)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&record.image_id)
    .bind(&record.file_path)
    .bind(&record.caption)
    .bind(&record.file_hash)
    .execute(executor)
    .await?;
    Ok(())
}

/// 旧表结构的降级写入，不带哈希列
pub async fn add_image_metadata_reduced<'c, E>(
    executor: E,
    image_id: &str,
    file_path: &str,
    caption: &str,
) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("INSERT INTO image_metadata (image_id, file_path, caption) VALUES (?, ?, ?)")
        .bind(image_id)
        .bind(file_path)
        .bind(caption)
        .execute(executor)
        .await?;
    Ok(())
}

/// 删除某个 caption 的所有图片元数据
///
/// 重试教学时先清掉旧行再重写，保证重试收敛到同一个终态
pub async fn delete_image_metadata_by_caption<'c, E>(executor: E, caption: &str) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM image_metadata WHERE caption = ?")
        .bind(caption)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// 检查后写入类别嵌入，已存在时保留旧行并返回 false
pub async fn add_class_embedding<'c, E>(
    executor: E,
    class_id: &str,
    class_name: &str,
    text_vector: &[u8],
) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO class_embedding (class_id, class_name, text_vector)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(class_id)
    .bind(class_name)
    .bind(text_vector)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 删除类别嵌入
pub async fn delete_class_embedding<'c, E>(executor: E, class_name: &str) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("DELETE FROM class_embedding WHERE class_name = ?")
        .bind(class_name)
        .execute(executor)
        .await?;
    Ok(())
}

/// 删除 (模型, 类别) 映射
pub async fn delete_model_class<'c, E>(executor: E, model: &str, class: &str) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("DELETE FROM model_class WHERE model_name = ? AND class_name = ?")
        .bind(model)
        .bind(class)
        .execute(executor)
        .await?;
    Ok(())
}

/// 删除模型本身及其所有映射
pub async fn delete_model(conn: &mut sqlx::SqliteConnection, name: &str) -> Result<()> {
    sqlx::query("DELETE FROM model_class WHERE model_name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM model WHERE name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// 读取参与相似度排序的类别嵌入，可按模型过滤
pub async fn class_embeddings(
    executor: &SqlitePool,
    model: Option<&str>,
) -> Result<Vec<ClassEmbeddingRecord>> {
    let rows = match model {
        Some(model) => {
            sqlx::query_as::<_, ClassEmbeddingRecord>(
                r#"
                SELECT ce.class_id, ce.class_name, ce.text_vector
                FROM class_embedding ce
                JOIN model_class mc ON mc.class_name = ce.class_name
                WHERE mc.model_name = ?
                ORDER BY ce.class_id
                "#,
            )
            .bind(model)
            .fetch_all(executor)
            .await?
        }
        None => {
            sqlx::query_as::<_, ClassEmbeddingRecord>(
                "SELECT class_id, class_name, text_vector FROM class_embedding ORDER BY class_id",
            )
            .fetch_all(executor)
            .await?
        }
    };

    Ok(rows)
}

pub async fn count_class_embeddings(executor: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM class_embedding")
        .fetch_one(executor)
        .await?;
    Ok(row.get("count"))
}

pub async fn count_image_metadata(executor: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM image_metadata")
        .fetch_one(executor)
        .await?;
    Ok(row.get("count"))
}

/// 远程路径精确命中
pub async fn caption_by_path(executor: &SqlitePool, path: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT caption FROM image_metadata WHERE file_path = ? LIMIT 1")
        .bind(path)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|row| row.get("caption")))
}

/// 内容哈希命中
pub async fn caption_by_hash(executor: &SqlitePool, hash: &[u8]) -> Result<Option<String>> {
    let row = sqlx::query("SELECT caption FROM image_metadata WHERE file_hash = ? LIMIT 1")
        .bind(hash)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|row| row.get("caption")))
}

/// 文件名命中：任意前缀下的同名文件
pub async fn caption_by_basename(executor: &SqlitePool, basename: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT caption FROM image_metadata WHERE file_path LIKE ? LIMIT 1")
        .bind(format!("%/{basename}"))
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|row| row.get("caption")))
}

/// 模型列表及各自的类别数量
pub async fn list_models(executor: &SqlitePool) -> Result<Vec<ModelSummary>> {
    sqlx::query_as(
        r#"
        SELECT m.name AS name, COUNT(DISTINCT mc.class_name) AS class_count
        FROM model m
        LEFT JOIN model_class mc ON mc.model_name = m.name
        GROUP BY m.name
        ORDER BY m.name
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 某模型下的类别及各自的图片数量
pub async fn list_classes(executor: &SqlitePool, model: &str) -> Result<Vec<ClassSummary>> {
    sqlx::query_as(
        r#"
        SELECT mc.class_name AS name, COUNT(im.file_path) AS image_count
        FROM model_class mc
        LEFT JOIN image_metadata im ON im.caption = mc.class_name
        WHERE mc.model_name = ?
        GROUP BY mc.class_name
        ORDER BY mc.class_name
        "#,
    )
    .bind(model)
    .fetch_all(executor)
    .await
}

/// 注册过的全部类别名称
pub async fn all_class_names(executor: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT DISTINCT class_name FROM model_class ORDER BY class_name")
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(|row| row.get("class_name")).collect())
}

/// 各表行数，用于诊断
pub async fn table_counts(executor: &SqlitePool) -> Result<TableCounts> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM model) AS models,
            (SELECT COUNT(*) FROM model_class) AS model_classes,
            (SELECT COUNT(*) FROM image_metadata) AS image_metadata,
            (SELECT COUNT(*) FROM class_embedding) AS class_embeddings
        "#,
    )
    .fetch_one(executor)
    .await?;

    Ok(TableCounts {
        models: row.get("models"),
        model_classes: row.get("model_classes"),
        image_metadata: row.get("image_metadata"),
        class_embeddings: row.get("class_embeddings"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    // TempDir 必须活到测试结束，连接池可能随时打开新连接
    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db(dir.path().join("imteach.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_next_class_id_monotonic() {
        let (_dir, pool) = test_pool().await;

        assert_eq!(next_class_id(&pool).await.unwrap(), "c1");
        assert!(add_class_embedding(&pool, "c1", "Cat", &[0; 4]).await.unwrap());
        assert_eq!(next_class_id(&pool).await.unwrap(), "c2");
        assert!(add_class_embedding(&pool, "c2", "Dog", &[0; 4]).await.unwrap());

        // 删掉中间的类别后最大值不变，空洞不回填
        delete_class_embedding(&pool, "Cat").await.unwrap();
        assert_eq!(next_class_id(&pool).await.unwrap(), "c3");
    }

    #[tokio::test]
    async fn test_add_class_embedding_checked() {
        let (_dir, pool) = test_pool().await;

        assert!(add_class_embedding(&pool, "c1", "Cat", &[1; 4]).await.unwrap());
        // 同名写入被忽略，保留旧行
        assert!(!add_class_embedding(&pool, "c2", "Cat", &[2; 4]).await.unwrap());
        assert_eq!(count_class_embeddings(&pool).await.unwrap(), 1);

        let rows = class_embeddings(&pool, None).await.unwrap();
        assert_eq!(rows[0].class_id, "c1");
        assert_eq!(rows[0].text_vector, vec![1; 4]);
    }

    #[tokio::test]
    async fn test_model_class_mapping() {
        let (_dir, pool) = test_pool().await;

        add_model(&pool, "Animals").await.unwrap();
        add_model(&pool, "Animals").await.unwrap();
        add_model_class(&pool, "Animals", "Cat").await.unwrap();

        assert!(model_class_exists(&pool, "Animals", "Cat").await.unwrap());
        assert!(!model_class_exists(&pool, "Animals", "Dog").await.unwrap());

        let models = list_models(&pool).await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].class_count, 1);
    }

    #[tokio::test]
    async fn test_caption_lookups() {
        let (_dir, pool) = test_pool().await;

        let record = ImageMetaRecord {
            image_id: "cat_0".to_string(),
            file_path: "stage/Animals/Cat/cat_0.jpg".to_string(),
            caption: "Cat".to_string(),
            file_hash: Some(vec![7; 32]),
        };
        add_image_metadata(&pool, &record).await.unwrap();

        assert_eq!(
            caption_by_path(&pool, "stage/Animals/Cat/cat_0.jpg").await.unwrap().as_deref(),
            Some("Cat")
        );
        assert_eq!(caption_by_hash(&pool, &[7; 32]).await.unwrap().as_deref(), Some("Cat"));
        assert_eq!(caption_by_basename(&pool, "cat_0.jpg").await.unwrap().as_deref(), Some("Cat"));
        assert_eq!(caption_by_basename(&pool, "dog_0.jpg").await.unwrap(), None);
    }
}
