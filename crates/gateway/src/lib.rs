//! Gateway: WebSocket/HTTP server for a single two-party pairing session.
//!
//! Lifecycle:
//! 1. Generate the first session code
//! 2. Bind the listener, print the startup banner
//! 3. Serve `/health`, `/ws` and the optional static pages
//! 4. Route client frames into the lifecycle state machine
//! 5. On Ctrl-C/SIGTERM notify every participant and close
//!
//! All session transitions go through [`lifecycle::LifecycleManager`]; the
//! socket layer only decodes frames and drains each connection's outbox.

pub mod code;
pub mod lifecycle;
pub mod outbox;
pub mod registry;
pub mod relay;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod ws;
