mod api_key;
mod invite;
mod middleware;
mod otp;
mod password;
mod user;

pub use api_key::{extract_api_key, ApiKeyError, LeadIngestionKey};
pub use invite::{generate_temporary_password, send_invite_email};
pub use middleware::{reject_anonymous_users, reject_non_admins, UserId};
pub use otp::{generate_otp, hash_otp, issue_otp, send_otp_email, verify_otp, OtpError, OTP_TTL};
pub use password::{change_password, compute_password_hash, validate_credentials, AuthError, Credentials};
pub use user::{
    assign_workspace_email, create_user, delete_user, ensure_bootstrap_admin, get_user,
    list_users, AssignWorkspaceError, CreateUserError, NewUser, User,
};
