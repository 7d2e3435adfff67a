//! Entity locker behaviour on the local engine

use std::sync::Arc;
use std::time::Duration;

use entlock_core::{
    BatchRef, EntityLocker, EntityRef, LockOptions, LockerConfig, LockerState, PageParam,
};

fn entity(id: &str) -> EntityRef {
    EntityRef::new("default", "Order", id)
}

async fn local_locker() -> anyhow::Result<EntityLocker> {
    let locker = EntityLocker::new();
    locker
        .init(LockerConfig::local().with_default_ttl(Duration::from_millis(5000)))
        .await?;
    Ok(locker)
}

#[tokio::test]
async fn test_end_to_end_lock_cycle() -> anyhow::Result<()> {
    let locker = local_locker().await?;
    assert_eq!(locker.state(), LockerState::Active);

    let key = locker.lock_one(&entity("42"), None).await?;
    assert_eq!(key, "default:Order:42");

    let err = locker.lock_one(&entity("42"), None).await.unwrap_err();
    assert_eq!(err.name(), "CONFLICT");

    assert_eq!(locker.unlock_one("default:Order:42").await?, "default:Order:42");
    assert_eq!(locker.lock_one(&entity("42"), None).await?, "default:Order:42");
    Ok(())
}

#[tokio::test]
async fn test_reusability() -> anyhow::Result<()> {
    let locker = local_locker().await?;

    for _ in 0..3 {
        let key = locker.lock_one(&entity("7"), None).await?;
        locker.unlock_one(&key).await?;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutual_exclusion() -> anyhow::Result<()> {
    let locker = Arc::new(local_locker().await?);

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let locker = locker.clone();
            tokio::spawn(async move {
                let options = LockOptions::new().with_owner(format!("worker-{}", i));
                locker.lock_one(&entity("contended"), Some(options)).await
            })
        })
        .collect();

    let mut winners = 0;
    for result in futures::future::join_all(tasks).await {
        match result? {
            Ok(_) => winners += 1,
            Err(e) => assert!(e.is_conflict()),
        }
    }

    assert_eq!(winners, 1);
    Ok(())
}

#[tokio::test]
async fn test_lock_many_rolls_back_on_conflict() -> anyhow::Result<()> {
    let locker = local_locker().await?;
    let options = LockOptions::new().with_owner("other");
    locker.lock_one(&entity("B"), Some(options)).await?;

    let err = locker
        .lock_many(vec![entity("A"), entity("B"), entity("C")], None)
        .await
        .unwrap_err();

    assert_eq!(err.conflict_key(), Some("default:Order:B"));
    assert!(err.to_string().contains("default:Order:B"));
    locker.lock_one(&entity("A"), None).await?;
    locker.lock_one(&entity("C"), None).await?;
    Ok(())
}

#[tokio::test]
async fn test_lock_many_with_batch_descriptor() -> anyhow::Result<()> {
    let locker = local_locker().await?;

    let keys = locker
        .lock_many(BatchRef::new("default", "Invoice", [3, 1, 2]), None)
        .await?;

    assert_eq!(
        keys,
        vec!["default:Invoice:3", "default:Invoice:1", "default:Invoice:2"]
    );
    let err = locker
        .lock_one(&EntityRef::new("default", "Invoice", 1), None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    Ok(())
}

#[tokio::test]
async fn test_ttl_auto_release() -> anyhow::Result<()> {
    let locker = local_locker().await?;

    locker
        .lock_one(
            &entity("ttl"),
            Some(LockOptions::expiring(Duration::from_millis(50))),
        )
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    locker.lock_one(&entity("ttl"), None).await?;
    assert_eq!(locker.stats().await.expired_locks, 1);
    Ok(())
}

#[tokio::test]
async fn test_manual_lock_does_not_expire() -> anyhow::Result<()> {
    let locker = local_locker().await?;

    let options = LockOptions::new()
        .with_auto(false)
        .with_ttl(Duration::from_millis(20));
    locker.lock_one(&entity("manual"), Some(options)).await?;
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(locker.lock_one(&entity("manual"), None).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_lock_without_options_outlives_default_ttl() -> anyhow::Result<()> {
    let locker = EntityLocker::new();
    locker
        .init(LockerConfig::local().with_default_ttl(Duration::from_millis(50)))
        .await?;

    locker.lock_one(&entity("1"), None).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = locker.lock_one(&entity("1"), None).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(locker.list(None).await?, vec!["default:Order:1"]);
    assert_eq!(locker.stats().await.expired_locks, 0);
    Ok(())
}

#[test]
fn test_lock_without_options_needs_no_timer_runtime() {
    let locker = EntityLocker::new();
    futures::executor::block_on(async {
        locker.init(LockerConfig::local()).await.unwrap();
        assert_eq!(
            locker.lock_one(&entity("1"), None).await.unwrap(),
            "default:Order:1"
        );
        assert!(locker.lock_one(&entity("1"), None).await.unwrap_err().is_conflict());
    });
}

#[tokio::test]
async fn test_idempotent_unlock() -> anyhow::Result<()> {
    let locker = local_locker().await?;

    assert_eq!(locker.unlock_one("default:Order:never").await?, "default:Order:never");

    let keys = locker.lock_many(vec![entity("1"), entity("2")], None).await?;
    assert_eq!(locker.unlock_many(&keys).await?, keys);
    assert_eq!(locker.unlock_many(&keys).await?, keys);
    Ok(())
}

#[tokio::test]
async fn test_listing_accuracy() -> anyhow::Result<()> {
    let locker = local_locker().await?;

    locker.lock_one(&entity("x"), None).await?;
    locker.lock_one(&entity("y"), None).await?;
    locker.unlock_one("default:Order:x").await?;

    assert_eq!(locker.list(None).await?, vec!["default:Order:y"]);
    assert_eq!(
        locker.list(Some(PageParam::new(1, 10))).await?,
        vec!["default:Order:y"]
    );
    Ok(())
}

#[tokio::test]
async fn test_shutdown_releases_local_locks() -> anyhow::Result<()> {
    let locker = local_locker().await?;
    locker
        .lock_one(
            &entity("s"),
            Some(LockOptions::expiring(Duration::from_millis(30))),
        )
        .await?;

    locker.shutdown().await?;

    assert_eq!(locker.state(), LockerState::Closed);
    let err = locker.list(None).await.unwrap_err();
    assert_eq!(err.name(), "SERVICE_UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn test_entities_sharing_a_key_are_rejected() -> anyhow::Result<()> {
    let locker = local_locker().await?;

    let err = locker
        .lock_one(&EntityRef::new("a:b", "c", "d"), None)
        .await
        .unwrap_err();
    assert_eq!(err.name(), "PARAMETER_VALIDATE_ERROR");

    let err = locker
        .lock_one(&EntityRef::new("a", "b:c", "d"), None)
        .await
        .unwrap_err();
    assert_eq!(err.name(), "PARAMETER_VALIDATE_ERROR");

    assert_eq!(
        locker.lock_one(&EntityRef::new("a", "b", "c:d"), None).await?,
        "a:b:c:d"
    );
    Ok(())
}
