//! Owns a set of [`nexus_session::Gateway`]s to distinct peers and the
//! bookkeeping to bring them all down together: id allocation, a
//! type-erased registry (gateways run over different concrete transports),
//! and ordered, escalating shutdown.

mod any_gateway;
mod error;
mod exit_hook;
mod group;
mod multichannel;

pub use any_gateway::{AnyGateway, Killable};
pub use error::GroupError;
pub use exit_hook::{new_tracked_group, run_exit_hooks};
pub use group::{GatewayId, Group};
pub use multichannel::MultiChannel;

pub use nexus_xspec::{ExecSpec, ExecSpecError};
