use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::group::Group;

static REGISTRY: OnceLock<Mutex<Vec<Weak<Group>>>> = OnceLock::new();

fn registry() -> &'static Mutex<Vec<Weak<Group>>> {
    REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

/// Wrap a [`Group`] in an `Arc` and track it so [`run_exit_hooks`] can find
/// it later. Use this instead of `Group::new()` for any group whose
/// lifetime should be tied to the process, so an abandoned group still
/// gets torn down if nobody calls `terminate()` explicitly.
pub fn new_tracked_group() -> Arc<Group> {
    let group = Arc::new(Group::new());
    registry().lock().push(Arc::downgrade(&group));
    group
}

/// Runs `terminate(timeout)` on every still-alive tracked [`Group`], then
/// drops the entries that didn't survive. Actually invoking this on process
/// shutdown is the embedding application's job — this function just gives
/// it something bounded and idempotent to call. A `Group` already torn
/// down, or dropped since it was tracked, is silently skipped, so calling
/// this more than once is harmless.
pub async fn run_exit_hooks(timeout: Duration) {
    let groups: Vec<Arc<Group>> = {
        let mut reg = registry().lock();
        reg.retain(|weak| weak.strong_count() > 0);
        reg.iter().filter_map(Weak::upgrade).collect()
    };
    for group in groups {
        group.terminate(timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_session::DialectOptions;
    use nexus_transport::MemTransport;
    use nexus_xspec::ExecSpec;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::any_gateway::Killable;

    struct FlagKillable(Arc<AtomicBool>);
    impl Killable for FlagKillable {
        fn terminate(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
        fn kill(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn run_exit_hooks_terminates_every_tracked_group() {
        let group = new_tracked_group();
        let (local, _peer) = MemTransport::pair();
        let killed = Arc::new(AtomicBool::new(false));
        group
            .make_gateway(
                local,
                DialectOptions::default(),
                &ExecSpec::default(),
                Some(Arc::new(FlagKillable(killed.clone()))),
            )
            .await
            .unwrap();

        run_exit_hooks(Duration::from_millis(20)).await;
        assert!(killed.load(Ordering::SeqCst));
        assert!(group.is_empty());
    }
}
