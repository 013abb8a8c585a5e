//! HTTP gateway between the browser UI and the hosted agent-run service.
//!
//! The gateway accepts a question, starts an upstream run with streaming
//! enabled, and relays the newline-delimited JSON event stream back to the
//! browser without corrupting line boundaries. It also fronts the run-record
//! fetch and thought-summarization endpoints and serves the embedded chat UI.

pub mod relay;
pub mod server;
pub mod state;

pub use server::start_gateway;
pub use state::GatewayState;
