pub mod actor;
pub mod application;

pub use actor::{Actor, Capability, Role};
pub use application::{Application, ApplicationId, ApplicationStatus, ApprovalStatus};
