mod dashboard;
mod email_templates;
mod leads;

pub use dashboard::*;
pub use email_templates::*;
pub use leads::*;
