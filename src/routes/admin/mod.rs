mod dashboard;
mod email_activity;
mod email_templates;
mod leads;
mod team;
mod workspace_emails;

pub use dashboard::*;
pub use email_activity::*;
pub use email_templates::*;
pub use leads::*;
pub use team::*;
pub use workspace_emails::*;
