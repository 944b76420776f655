//! greenlight-routing — routing descriptors for the traffic router.
//!
//! A pure function from committed team states to the full routing
//! plan the traffic router consumes: one descriptor per team (primary
//! backend = active environment, backup = the peer) plus global SSL
//! and HSTS directives. Descriptors are entirely recomputable — the
//! only write mode is regenerate-and-replace, never a diff or a hand
//! edit — and generation is deterministic, so identical inputs render
//! byte-identical output.
//!
//! The generator is invoked strictly after a state-store commit;
//! routing always reflects already-committed truth.

pub mod descriptor;
pub mod render;

pub use descriptor::{AclRule, RoutingDescriptor, RoutingPlan, SslBinding, generate};
pub use render::render;
