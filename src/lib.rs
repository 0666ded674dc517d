pub mod app;
pub mod auth;
pub mod config;
pub mod domain;
pub mod email_client;
pub mod email_templates;
pub mod google;
pub mod idempotency;
pub mod leads;
pub mod outreach;
pub mod reporting;
pub mod routes;
pub mod session_state;
pub mod telemetry;
pub mod utils;
pub mod workers;
pub mod workspace_emails;
