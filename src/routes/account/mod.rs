mod log_out;
mod password;

pub use log_out::*;
pub use password::*;
