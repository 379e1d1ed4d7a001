mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::*;
use imteach::error::TeachError;

#[tokio::test(flavor = "multi_thread")]
async fn teach_animals_cat() {
    let dir = tempfile::tempdir().unwrap();
    let source = StubSource::new(5);
    let db = open_vdb(&dir, Arc::new(StubEmbedder::no_image_capability()), source.clone()).await;

    let outcome = db.teach(&teach_request("Animals", "Cat", 5)).await.unwrap();

    assert_eq!(outcome.class_id, "c1");
    assert_eq!(outcome.uploaded, 5);
    assert_eq!(outcome.inserted, 5);
    assert_eq!(outcome.degraded, 0);

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.counts.models, 1);
    assert_eq!(stats.counts.model_classes, 1);
    assert_eq!(stats.counts.image_metadata, 5);
    assert_eq!(stats.counts.class_embeddings, 1);

    // 上传的文件落在 <prefix>/<model_token>/<class_token>/ 下
    assert!(db.storage().resolve("stage/Animals/Cat/cat_0.jpg").is_file());
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_teach_fails_before_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let source = StubSource::new(3);
    let db = open_vdb(&dir, Arc::new(StubEmbedder::no_image_capability()), source.clone()).await;

    db.teach(&teach_request("Animals", "Cat", 3)).await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let err = db.teach(&teach_request("Animals", "Cat", 3)).await.unwrap_err();
    assert!(matches!(err, TeachError::DuplicateClass { .. }));
    // 第二次教学在获取之前就失败，不会再调用获取服务
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn class_ids_are_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let source = StubSource::new(1);
    let db = open_vdb(&dir, Arc::new(StubEmbedder::no_image_capability()), source).await;

    let cat = db.teach(&teach_request("Animals", "Cat", 1)).await.unwrap();
    let dog = db.teach(&teach_request("Animals", "Dog", 1)).await.unwrap();
    let bird = db.teach(&teach_request("Animals", "Bird", 1)).await.unwrap();
    assert_eq!((cat.class_id.as_str(), dog.class_id.as_str(), bird.class_id.as_str()), ("c1", "c2", "c3"));

    // 删除中间的类别之后分配仍然从最大值继续，空洞不回填
    db.delete_class("Animals", "Dog", "stage").await.unwrap();
    let fish = db.teach(&teach_request("Animals", "Fish", 1)).await.unwrap();
    assert_eq!(fish.class_id, "c4");
}

#[tokio::test(flavor = "multi_thread")]
async fn acquisition_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let source = StubSource::new(0);
    let db = open_vdb(&dir, Arc::new(StubEmbedder::no_image_capability()), source).await;

    let err = db.teach(&teach_request("Animals", "Cat", 5)).await.unwrap_err();
    assert!(matches!(err, TeachError::Acquisition { .. }));

    // 没有产生任何写入
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.counts.models, 0);
    assert_eq!(stats.counts.image_metadata, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn teach_from_local_dir_skips_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let source = StubSource::new(5);
    let db = open_vdb(&dir, Arc::new(StubEmbedder::no_image_capability()), source.clone()).await;

    let local = tempfile::tempdir().unwrap();
    for i in 0..3 {
        std::fs::write(local.path().join(format!("sample_{i}.jpg")), format!("local-{i}")).unwrap();
    }

    let mut req = teach_request("Things", "Chair", 8);
    req.source_dir = Some(local.path().to_path_buf());
    let outcome = db.teach(&req).await.unwrap();

    assert_eq!(outcome.uploaded, 3);
    assert_eq!(outcome.inserted, 3);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn detached_teach_reaches_same_end_state() {
    let dir = tempfile::tempdir().unwrap();
    let source = StubSource::new(3);
    let db = open_vdb(&dir, Arc::new(StubEmbedder::no_image_capability()), source.clone()).await;

    // 获取同步完成，登记在后台任务中继续
    Arc::clone(&db).teach_detached(teach_request("Animals", "Cat", 3)).await.unwrap();

    // 等待后台任务落库
    let mut registered = false;
    for _ in 0..100 {
        if db.stats().await.unwrap().counts.model_classes == 1 {
            registered = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(registered, "后台教学没有在预期时间内完成");

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.counts.image_metadata, 3);
    assert_eq!(stats.counts.class_embeddings, 1);

    // 落库之后重复教学同步失败，且不会再触发获取
    let err = Arc::clone(&db).teach_detached(teach_request("Animals", "Cat", 3)).await.unwrap_err();
    assert!(matches!(err, TeachError::DuplicateClass { .. }));
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn reteach_converges_after_partial_state() {
    let dir = tempfile::tempdir().unwrap();
    let source = StubSource::new(5);
    let db = open_vdb(&dir, Arc::new(StubEmbedder::no_image_capability()), source).await;

    // 残留状态：上一次教学写入了嵌入和部分元数据，但映射没有落库
    sqlx::query("INSERT INTO class_embedding (class_id, class_name, text_vector) VALUES (?, ?, ?)")
        .bind("c1")
        .bind("Cat")
        .bind(vec![0u8; 12])
        .execute(db.database())
        .await
        .unwrap();
    sqlx::query("INSERT INTO image_metadata (image_id, file_path, caption) VALUES (?, ?, ?)")
        .bind("cat_0")
        .bind("stage/Animals/Cat/cat_0.jpg")
        .bind("Cat")
        .execute(db.database())
        .await
        .unwrap();

    let outcome = db.teach(&teach_request("Animals", "Cat", 5)).await.unwrap();
    assert_eq!(outcome.inserted, 5);

    // 重试收敛：一行嵌入，5 行元数据，映射存在
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.counts.class_embeddings, 1);
    assert_eq!(stats.counts.image_metadata, 5);
    assert_eq!(stats.counts.model_classes, 1);
}
