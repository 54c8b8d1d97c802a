//! Stateless operation handlers (spec §4.9). Each handler only reads its
//! `OperationRequest` and `Dependencies`; none hold state across calls.

pub mod delete;
pub mod heartbeat;
pub mod read;
pub mod schema;
pub mod transaction;
pub mod write;
