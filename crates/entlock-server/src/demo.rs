// Scripted lock scenario used by the `demo` subcommand
// Each step reports the key(s) it produced or the error code it failed with

use std::time::Duration;

use serde::Serialize;

use entlock_common::{BatchRef, EntityRef, LockError, LockOptions};
use entlock_core::EntityLocker;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoStep {
    pub operation: String,
    pub ok: bool,
    pub result: String,
}

impl DemoStep {
    fn from_result<T: std::fmt::Debug>(operation: &str, result: Result<T, LockError>) -> Self {
        match result {
            Ok(value) => Self {
                operation: operation.to_string(),
                ok: true,
                result: format!("{:?}", value),
            },
            Err(e) => Self {
                operation: operation.to_string(),
                ok: false,
                result: format!("{}: {}", e.name(), e),
            },
        }
    }
}

pub async fn run_demo(locker: &EntityLocker) -> Vec<DemoStep> {
    let order = EntityRef::new("default", "Order", "42");
    let key = order.key();
    let mut steps = Vec::new();

    steps.push(DemoStep::from_result(
        "lockOne default:Order:42",
        locker.lock_one(&order, None).await,
    ));
    steps.push(DemoStep::from_result(
        "lockOne default:Order:42 (again)",
        locker.lock_one(&order, None).await,
    ));
    steps.push(DemoStep::from_result(
        "unlockOne default:Order:42",
        locker.unlock_one(&key).await,
    ));
    steps.push(DemoStep::from_result(
        "lockOne default:Order:42 (after unlock)",
        locker.lock_one(&order, None).await,
    ));

    let batch = BatchRef::new("default", "Order", ["41", "42", "43"]);
    steps.push(DemoStep::from_result(
        "lockMany default:Order:[41,42,43]",
        locker.lock_many(batch, None).await,
    ));

    let ttl_entity = EntityRef::new("default", "Order", "ttl");
    steps.push(DemoStep::from_result(
        "lockOne default:Order:ttl (ttl 50ms)",
        locker
            .lock_one(&ttl_entity, Some(LockOptions::expiring(Duration::from_millis(50))))
            .await,
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;
    steps.push(DemoStep::from_result(
        "lockOne default:Order:ttl (after 100ms)",
        locker.lock_one(&ttl_entity, None).await,
    ));

    steps.push(DemoStep::from_result(
        "unlockMany",
        locker.unlock_many(&[key, ttl_entity.key()]).await,
    ));
    steps.push(DemoStep::from_result("list", locker.list(None).await));

    steps
}

#[cfg(test)]
mod tests {
    use entlock_common::LockerConfig;

    use super::*;

    #[tokio::test]
    async fn test_demo_outcomes_on_local_engine() {
        let locker = EntityLocker::new();
        locker.init(LockerConfig::local()).await.unwrap();

        let steps = run_demo(&locker).await;
        let outcomes: Vec<bool> = steps.iter().map(|s| s.ok).collect();

        assert_eq!(
            outcomes,
            vec![true, false, true, true, false, true, true, true, true]
        );
        assert!(steps[1].result.starts_with("CONFLICT"));
        assert!(steps[4].result.contains("default:Order:42"));
        assert_eq!(steps[8].result, "[]");
    }
}
