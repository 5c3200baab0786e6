//! Real-time interview: per-connection session state, the question-sequencing
//! state machine, the WebSocket protocol, and the durable-store seam.

pub mod events;
pub mod orchestrator;
pub mod session;
pub mod socket;
pub mod store;
