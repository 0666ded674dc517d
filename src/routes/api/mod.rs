mod google_oauth;
mod leads;
mod send_email;

pub use google_oauth::*;
pub use leads::*;
pub use send_email::*;
