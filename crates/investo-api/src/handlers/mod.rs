//! HTTP handlers, one module per resource.

pub mod groups;
pub mod hierarchy;
pub mod projects;
pub mod sap;
