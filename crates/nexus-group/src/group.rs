use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nexus_session::{DialectOptions, Gateway, RemoteExecutor};
use nexus_transport::Transport;
use nexus_xspec::ExecSpec;
use parking_lot::Mutex;

use crate::any_gateway::{AnyGateway, GatewayEntry, Killable};
use crate::error::GroupError;
use crate::multichannel::MultiChannel;

/// Identifies one gateway within a [`Group`]. A string: either taken from
/// the `ExecSpec`'s `id` attribute, or auto-allocated as `"gw<n>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GatewayId(pub String);

impl std::fmt::Display for GatewayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns a set of gateways to distinct peers, and the bookkeeping to bring
/// them all down together. One [`Group`] is the unit of "everything this
/// process depends on to run remote work".
pub struct Group {
    gateways: Mutex<HashMap<GatewayId, GatewayEntry>>,
    next_auto_id: AtomicU32,
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Group {
    pub fn new() -> Self {
        Group {
            gateways: Mutex::new(HashMap::new()),
            next_auto_id: AtomicU32::new(1),
        }
    }

    fn allocate_id(&self, spec: &ExecSpec) -> Result<GatewayId, GroupError> {
        let id = match spec.id() {
            Some(id) => GatewayId(id.to_string()),
            None => GatewayId(format!("gw{}", self.next_auto_id.fetch_add(1, Ordering::AcqRel))),
        };
        if self.gateways.lock().contains_key(&id) {
            return Err(GroupError::DuplicateId(id.0));
        }
        Ok(id)
    }

    /// Register a gateway built over `transport` as the local (odd-id)
    /// side, running to a peer constructed however the caller likes
    /// (spawned subprocess, SSH tunnel, raw socket, in-process `DuplexStream`
    /// pair). `spec` supplies the gateway's id (or requests one be
    /// allocated) and, if it names `chdir`/`nice`, a short bootstrap source
    /// is run on the peer and awaited before this returns. `killable`, if
    /// given, is consulted by [`Group::terminate`] when the gateway doesn't
    /// shut down cleanly in time.
    pub async fn make_gateway<T: Transport>(
        &self,
        transport: T,
        dialect: DialectOptions,
        spec: &ExecSpec,
        killable: Option<Arc<dyn Killable>>,
    ) -> Result<(GatewayId, Arc<Gateway<T>>), GroupError> {
        let id = self.allocate_id(spec)?;
        let gateway = Gateway::connect(transport, dialect);
        self.gateways
            .lock()
            .insert(id.clone(), (gateway.clone() as Arc<dyn AnyGateway>, killable));

        if let Some(bootstrap) = bootstrap_source(spec) {
            let channel = gateway.remote_exec(bootstrap)?;
            channel.wait_close(None).await?;
        }

        Ok((id, gateway))
    }

    /// Same as [`Group::make_gateway`], but for the peer side: runs
    /// `executor` against whatever `CHANNEL_OPEN` requests arrive (this
    /// includes the bootstrap request a peer `Group::make_gateway` sends,
    /// if any). The caller is still responsible for driving `gateway.serve()`.
    pub fn make_peer_gateway<T: Transport>(
        &self,
        transport: T,
        dialect: DialectOptions,
        spec: &ExecSpec,
        executor: Arc<dyn RemoteExecutor>,
        killable: Option<Arc<dyn Killable>>,
    ) -> Result<(GatewayId, Arc<Gateway<T>>), GroupError> {
        let id = self.allocate_id(spec)?;
        let gateway = Gateway::serve_peer(transport, dialect, executor);
        self.gateways
            .lock()
            .insert(id.clone(), (gateway.clone() as Arc<dyn AnyGateway>, killable));
        Ok((id, gateway))
    }

    pub fn remove(&self, id: &GatewayId) {
        self.gateways.lock().remove(id);
    }

    pub fn get(&self, id: &GatewayId) -> Option<Arc<dyn AnyGateway>> {
        self.gateways.lock().get(id).map(|(gw, _)| gw.clone())
    }

    pub fn ids(&self) -> Vec<GatewayId> {
        self.gateways.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.gateways.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a channel on every gateway in the group, bundled into one
    /// [`MultiChannel`] that fans sends out and collects receives in
    /// arrival order.
    pub fn remote_exec_each(&self, source: impl Into<String>) -> MultiChannel {
        let source = source.into();
        let channels = self
            .gateways
            .lock()
            .values()
            .filter_map(|(gw, _)| gw.remote_exec(source.clone()).ok())
            .collect();
        MultiChannel::new(channels)
    }

    /// Ask every gateway to stop, escalating to [`Killable::kill`] for any
    /// gateway still running once `timeout` elapses: close politely first,
    /// force it if that didn't work fast enough.
    pub async fn terminate(&self, timeout: Duration) {
        let entries: Vec<GatewayEntry> = self.gateways.lock().drain().map(|(_, entry)| entry).collect();
        for (gateway, killable) in &entries {
            gateway.close_write();
            if let Some(k) = killable {
                k.terminate();
            }
        }
        for (gateway, killable) in entries {
            let joined = tokio::time::timeout(timeout, gateway.join()).await;
            if joined.is_err() {
                if let Some(k) = killable {
                    tracing::warn!("gateway did not shut down within the deadline, killing it");
                    k.kill();
                }
            }
        }
    }
}

/// Build the short source string a bootstrap channel carries, from whatever
/// of `chdir`/`nice` the spec names. Returns `None` if neither is set, so
/// `make_gateway` skips the bootstrap round trip entirely.
fn bootstrap_source(spec: &ExecSpec) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(dir) = spec.chdir() {
        parts.push(format!("chdir={dir}"));
    }
    if let Some(nice) = spec.nice() {
        parts.push(format!("nice={nice}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("__bootstrap__//{}", parts.join("//")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use nexus_session::{Channel, ChannelItem, DialectOptions, EchoExecutor, RemoteExecutor, Value};
    use nexus_transport::MemTransport;

    use super::*;

    struct FlagKillable(Arc<AtomicBool>);
    impl Killable for FlagKillable {
        fn terminate(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
        fn kill(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Closes any bootstrap (or other) channel immediately, standing in for
    /// a peer that successfully applied whatever the bootstrap source asked
    /// for.
    struct ConfirmingExecutor;
    impl RemoteExecutor for ConfirmingExecutor {
        fn execute(&self, channel: Channel, _source: &str) -> Result<(), String> {
            channel.close_blocking(None).map_err(|e| e.to_string())
        }
    }

    #[tokio::test]
    async fn tracks_multiple_gateways_by_id() {
        let group = Group::new();
        let (a_local, _a_peer) = MemTransport::pair();
        let (b_local, _b_peer) = MemTransport::pair();
        let (a, _) = group
            .make_gateway(a_local, DialectOptions::default(), &ExecSpec::default(), None)
            .await
            .unwrap();
        let (b, _) = group
            .make_gateway(b_local, DialectOptions::default(), &ExecSpec::default(), None)
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(group.len(), 2);
        group.remove(&a);
        assert_eq!(group.len(), 1);
    }

    #[tokio::test]
    async fn explicit_id_is_honored_and_duplicates_rejected() {
        let group = Group::new();
        let (local, _peer) = MemTransport::pair();
        let spec = ExecSpec::parse("popen//id=worker-1").unwrap();
        let (id, _) = group
            .make_gateway(local, DialectOptions::default(), &spec, None)
            .await
            .unwrap();
        assert_eq!(id.0, "worker-1");

        let (local2, _peer2) = MemTransport::pair();
        let err = group
            .make_gateway(local2, DialectOptions::default(), &spec, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::DuplicateId(id) if id == "worker-1"));
    }

    #[tokio::test]
    async fn chdir_spec_runs_bootstrap_before_returning() {
        let group = Group::new();
        let (local, peer) = MemTransport::pair();
        let peer_gw = Gateway::serve_peer(peer, DialectOptions::default(), Arc::new(ConfirmingExecutor));
        let serve = tokio::spawn({
            let peer_gw = peer_gw.clone();
            async move { peer_gw.serve().await }
        });

        let spec = ExecSpec::parse("popen//chdir=/tmp/example").unwrap();
        let (_id, gateway) = group
            .make_gateway(local, DialectOptions::default(), &spec, None)
            .await
            .unwrap();

        // The bootstrap channel was id 1; a fresh remote_exec gets the next
        // odd id, proving the bootstrap round trip actually completed
        // before `make_gateway` returned.
        let channel = gateway.remote_exec("ignored").unwrap();
        assert_eq!(channel.id(), 3);
        serve.abort();
    }

    #[tokio::test]
    async fn remote_exec_each_fans_out_across_peers() {
        let group = Group::new();
        let (local_a, peer_a) = MemTransport::pair();
        let (local_b, peer_b) = MemTransport::pair();
        group
            .make_gateway(local_a, DialectOptions::default(), &ExecSpec::default(), None)
            .await
            .unwrap();
        group
            .make_gateway(local_b, DialectOptions::default(), &ExecSpec::default(), None)
            .await
            .unwrap();

        let peer_a_gw = nexus_session::Gateway::serve_peer(peer_a, DialectOptions::default(), Arc::new(EchoExecutor));
        let peer_b_gw = nexus_session::Gateway::serve_peer(peer_b, DialectOptions::default(), Arc::new(EchoExecutor));
        tokio::spawn({
            let gw = peer_a_gw.clone();
            async move { gw.serve().await }
        });
        tokio::spawn({
            let gw = peer_b_gw.clone();
            async move { gw.serve().await }
        });

        let multi = group.remote_exec_each("ignored");
        assert_eq!(multi.len(), 2);
        multi.send_each(Value::Int(1)).await.unwrap();
        let results = multi.receive_each().await;
        assert_eq!(results.len(), 2);
        for r in results {
            assert!(matches!(r, Ok(ChannelItem::Value(Value::Int(2)))));
        }
    }

    #[tokio::test]
    async fn terminate_closes_write_side_and_kills_on_timeout() {
        let group = Group::new();
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

        group.terminate(Duration::from_millis(20)).await;
        assert!(killed.load(Ordering::SeqCst));
        assert!(group.is_empty());
    }
}
