//! Provider selection: the closed catalog of backend families and the
//! factory that turns model configs into cached clients.

pub mod catalog;
pub mod factory;
