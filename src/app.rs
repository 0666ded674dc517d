use crate::{
    auth::{ensure_bootstrap_admin, reject_anonymous_users, reject_non_admins, LeadIngestionKey},
    config::Settings,
    email_client::EmailClient,
    google::{GmailApi, OAuthClient},
    routes::*,
};
use actix_session::{
    storage::{CookieSessionStore, RedisSessionStore, SessionStore},
    SessionMiddleware,
};
use actix_web::{
    cookie::Key, dev::Server, middleware::from_fn as mw_fn, web, web::Data, HttpServer,
};
use actix_web_flash_messages::{storage::CookieMessageStore, FlashMessagesFramework};
use anyhow::Context;
use core::net::SocketAddr;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

/// Public origin of the app, used to build absolute redirects.
pub struct AppBaseUrl(pub String);

/// Everything a request handler may ask for through `web::Data`.
struct Dependencies {
    db_pool: PgPool,
    email_client: EmailClient,
    oauth_client: OAuthClient,
    gmail_api: GmailApi,
    base_url: AppBaseUrl,
    lead_ingestion_key: LeadIngestionKey,
    hmac_secret: SecretString,
}

pub struct App {
    server: Server,
    socket_addr: SocketAddr,
}

impl App {
    pub async fn build(config: &Settings) -> anyhow::Result<Self> {
        // create the app dependencies
        let listener =
            TcpListener::bind((config.application.host.clone(), config.application.port))?;
        let socket_addr = listener.local_addr()?;
        let dependencies = Dependencies {
            db_pool: config.database.get_db_pool(),
            email_client: config.email_client.client()?,
            oauth_client: config.google.oauth_client()?,
            gmail_api: config.google.gmail_api()?,
            base_url: AppBaseUrl(config.application.base_url.clone()),
            lead_ingestion_key: LeadIngestionKey(config.lead_ingestion.api_key.clone()),
            hmac_secret: config.application.hmac_secret.clone(),
        };

        if let Some(admin) = &config.bootstrap_admin {
            ensure_bootstrap_admin(admin, &dependencies.db_pool)
                .await
                .context("Failed to seed the bootstrap admin.")?;
        }

        // create the app runner
        let server = match &config.redis_uri {
            Some(redis_uri) => {
                let store = RedisSessionStore::new(redis_uri.expose_secret()).await?;
                Self::get_server_runner(listener, dependencies, move || store.clone())?
            }
            None => {
                tracing::warn!("No redis_uri configured, falling back to cookie sessions");
                Self::get_server_runner(listener, dependencies, CookieSessionStore::default)?
            }
        };

        Ok(Self {
            server,
            socket_addr,
        })
    }

    /// `session_store` is called once per worker, so stores need not be `Clone`.
    fn get_server_runner<S, F>(
        listener: TcpListener,
        dependencies: Dependencies,
        session_store: F,
    ) -> anyhow::Result<Server>
    where
        S: SessionStore + 'static,
        F: Fn() -> S + Send + Clone + 'static,
    {
        let Dependencies {
            db_pool,
            email_client,
            oauth_client,
            gmail_api,
            base_url,
            lead_ingestion_key,
            hmac_secret,
        } = dependencies;
        let db_pool = Data::new(db_pool);
        let email_client = Data::new(email_client);
        let oauth_client = Data::new(oauth_client);
        let gmail_api = Data::new(gmail_api);
        let base_url = Data::new(base_url);
        let lead_ingestion_key = Data::new(lead_ingestion_key);
        let secret_key = Key::from(hmac_secret.expose_secret().as_bytes());
        let message_framework = {
            let store = CookieMessageStore::builder(secret_key.clone()).build();
            FlashMessagesFramework::builder(store).build()
        };
        let server = HttpServer::new(move || {
            actix_web::App::new()
                .wrap(message_framework.clone())
                .wrap(SessionMiddleware::new(session_store(), secret_key.clone()))
                .wrap(TracingLogger::default())
                .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                .service(health_check)
                .service(login_form)
                .service(login)
                .service(otp_form)
                .service(submit_otp)
                .service(logout)
                .service(
                    web::scope("/api")
                        .service(ingest_lead)
                        .service(send_email_to_lead)
                        .service(google_oauth_callback),
                )
                .service(
                    // the last middleware wrapped runs first
                    web::scope("/admin")
                        .wrap(mw_fn(reject_non_admins))
                        .wrap(mw_fn(reject_anonymous_users))
                        .service(admin_dashboard)
                        .service(admin_leads)
                        .service(assign_lead)
                        .service(team_members)
                        .service(create_team_member)
                        .service(invite_team_member)
                        .service(assign_member_workspace)
                        .service(remove_team_member)
                        .service(workspace_email_list)
                        .service(start_workspace_link)
                        .service(delete_workspace_email)
                        .service(admin_email_templates)
                        .service(create_email_template)
                        .service(email_activity_log),
                )
                .service(
                    web::scope("/team")
                        .wrap(mw_fn(reject_anonymous_users))
                        .service(team_dashboard)
                        .service(team_leads)
                        .service(team_lead_detail)
                        .service(update_lead_status)
                        .service(team_email_templates),
                )
                .service(
                    web::scope("/account")
                        .wrap(mw_fn(reject_anonymous_users))
                        .service(change_password_form)
                        .service(change_password),
                )
                .app_data(Data::clone(&db_pool))
                .app_data(Data::clone(&email_client))
                .app_data(Data::clone(&oauth_client))
                .app_data(Data::clone(&gmail_api))
                .app_data(Data::clone(&base_url))
                .app_data(Data::clone(&lead_ingestion_key))
        })
        .listen(listener)?
        .run();

        Ok(server)
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket_addr
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        self.server.await?;
        Ok(())
    }
}
