pub mod answer;
pub mod client;
pub mod deliverable;
pub mod message;
pub mod notification;
pub mod portfolio;
pub mod priority;
pub mod project;
pub mod session;
pub mod status;
pub mod tag;
pub mod task;
pub mod task_type;
pub mod template;
pub mod tenant;
pub mod user;
