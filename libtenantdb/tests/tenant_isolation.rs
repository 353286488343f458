use libtenantdb::meta::BlockMeta;
use libtenantdb::{Partition, TenantDb};

#[tokio::test]
async fn tenants_never_cross_read() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = TenantDb::open(dir.path(), "app:tenant-a").await?;
    let b = TenantDb::open(dir.path(), "app:tenant-b").await?;

    a.put(Partition::Raw, "state", &serde_json::json!({"owner": "a"}))
        .await?;
    BlockMeta::now("app:tenant-a").write_to(&a).await?;

    assert_eq!(b.get(Partition::Raw, "state").await?, None);
    assert_eq!(BlockMeta::read_timestamp(&b).await?, None);

    b.put(Partition::Raw, "state", &serde_json::json!({"owner": "b"}))
        .await?;
    assert_eq!(
        a.get(Partition::Raw, "state").await?,
        Some(serde_json::json!({"owner": "a"}))
    );
    Ok(())
}

#[tokio::test]
async fn partitions_are_independent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = TenantDb::open(dir.path(), "app:acme").await?;

    db.put(Partition::Raw, "timestamp", &serde_json::json!("not-meta"))
        .await?;
    assert_eq!(db.get(Partition::BlockMeta, "timestamp").await?, None);

    db.put(Partition::BlockMeta, "timestamp", &serde_json::json!(42))
        .await?;
    assert_eq!(
        db.get(Partition::Raw, "timestamp").await?,
        Some(serde_json::json!("not-meta"))
    );

    db.remove(Partition::Raw, "timestamp").await?;
    assert_eq!(db.get(Partition::Raw, "timestamp").await?, None);
    assert_eq!(
        db.get(Partition::BlockMeta, "timestamp").await?,
        Some(serde_json::json!(42))
    );
    Ok(())
}

#[tokio::test]
async fn reopen_sees_previous_writes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let db = TenantDb::open(dir.path(), "app:acme").await?;
        db.put(Partition::Raw, "state", &serde_json::json!({"n": 7}))
            .await?;
        db.close().await;
    }
    let db = TenantDb::open_for_peek(dir.path(), "app:acme").await?;
    assert_eq!(
        db.get(Partition::Raw, "state").await?,
        Some(serde_json::json!({"n": 7}))
    );
    Ok(())
}
