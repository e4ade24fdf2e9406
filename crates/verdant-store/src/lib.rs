//! Rule persistence over the hosted data service.
//!
//! [`rules::RuleStore`] is the single access layer for sensor rules: it
//! validates definitions before persistence, scopes every query to the
//! authenticated user, and gates writes on the session's [`Capabilities`].
//! The backing service is reached through the [`backend::TableBackend`]
//! abstraction; [`http::HttpBackend`] talks to the real service and
//! [`memory::MemoryBackend`] backs tests.

pub mod backend;
pub mod dispatch_log;
pub mod error;
pub mod http;
pub mod memory;
pub mod rules;


pub use dispatch_log::DispatchLogRow;
pub use rules::{CreateSensorRule, RuleStore, SensorRuleUpdate};

/// Write permissions resolved once per session from the auth collaborator
/// and injected into the store's write paths.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl Capabilities {
    /// Full write access; what an account owner session resolves to.
    pub fn full() -> Self {
        Self {
            can_create: true,
            can_edit: true,
            can_delete: true,
        }
    }

    /// No write access; rules remain readable.
    pub fn read_only() -> Self {
        Self {
            can_create: false,
            can_edit: false,
            can_delete: false,
        }
    }
}
