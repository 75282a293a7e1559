use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nexus_session::{Channel, ChannelError, Gateway};
use nexus_transport::Transport;

/// A type-erased [`Gateway`]. `Group` holds gateways over heterogeneous
/// transports (a popen-backed one next to a socket-backed one) in a single
/// registry, which needs a common object-safe surface; `Gateway<T>` itself
/// stays generic and un-erased everywhere it's used directly.
pub trait AnyGateway: Send + Sync {
    fn new_channel(&self) -> Result<Channel, ChannelError>;
    fn remote_exec(&self, source: String) -> Result<Channel, ChannelError>;
    fn close_write(&self);
    fn join(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

impl<T: Transport> AnyGateway for Gateway<T> {
    fn new_channel(&self) -> Result<Channel, ChannelError> {
        Gateway::new_channel(self)
    }

    fn remote_exec(&self, source: String) -> Result<Channel, ChannelError> {
        Gateway::remote_exec(self, source)
    }

    fn close_write(&self) {
        self.transport().close_write();
    }

    fn join(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(Gateway::join(self))
    }
}

/// Anything that can be asked, then forced, to stop. Registered alongside a
/// gateway when the concrete transport wraps a resource `nexus-group`
/// doesn't otherwise know how to tear down, e.g. a spawned child process:
/// `terminate()` is a clean-shutdown request, `kill()` is the escalation
/// after a deadline expires.
pub trait Killable: Send + Sync {
    fn terminate(&self);
    fn kill(&self);
}

pub(crate) type GatewayEntry = (Arc<dyn AnyGateway>, Option<Arc<dyn Killable>>);
