//! Gateway: HTTP host for the relay.
//!
//! Single port. `GET /` answers a health check; `POST <webhookPath>` takes Webex webhook
//! deliveries, checks their signature and queues them for one processor task that
//! handles events strictly one at a time under the per-event deadline.

mod server;
pub mod signature;

pub use server::{
    build_relay, decode_event, handle_one, router, run_gateway, GatewayState, SubmitError,
};
