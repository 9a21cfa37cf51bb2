pub mod config;
pub mod deadline;
pub mod lifecycle;
pub mod lookups;
pub mod notifications;
pub mod principal;
pub mod reference;
pub mod repeat;
pub mod templates;
pub mod validation;
pub mod visibility;
