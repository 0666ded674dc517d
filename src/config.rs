use crate::{
    domain::EmailAddress,
    email_client::EmailClient,
    google::{GmailApi, OAuthClient},
};
use config::{Config, File};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use std::{env, error::Error, time::Duration};

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email_client: EmailClientSettings,
    pub google: GoogleSettings,
    pub lead_ingestion: LeadIngestionSettings,
    pub redis_uri: Option<SecretString>,
    pub bootstrap_admin: Option<BootstrapAdminSettings>,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub base_url: String,
    pub hmac_secret: SecretString,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: SecretString,
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .username(&self.username)
            .password(self.password.expose_secret())
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .ssl_mode(ssl_mode)
    }

    /// A pool that only connects on first use.
    pub fn get_db_pool(&self) -> PgPool {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(2))
            .connect_lazy_with(self.connect_options())
    }
}

#[derive(Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub authorization_token: SecretString,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn sender(&self) -> Result<EmailAddress, String> {
        EmailAddress::parse(&self.sender_email)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn client(&self) -> anyhow::Result<EmailClient> {
        let sender = self.sender().map_err(anyhow::Error::msg)?;
        let url = Url::parse(&self.base_url)?;
        Ok(EmailClient::new(
            url,
            sender,
            self.authorization_token.clone(),
            self.timeout(),
        ))
    }
}

#[derive(Deserialize, Clone)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub auth_base_url: String,
    pub token_url: String,
    pub gmail_base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl GoogleSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn oauth_client(&self) -> anyhow::Result<OAuthClient> {
        Ok(OAuthClient::new(
            self.client_id.clone(),
            self.client_secret.clone(),
            Url::parse(&self.redirect_uri)?,
            Url::parse(&self.auth_base_url)?,
            Url::parse(&self.token_url)?,
            self.timeout(),
        ))
    }

    pub fn gmail_api(&self) -> anyhow::Result<GmailApi> {
        Ok(GmailApi::new(
            Url::parse(&self.gmail_base_url)?,
            self.timeout(),
        ))
    }
}

#[derive(Deserialize, Clone)]
pub struct LeadIngestionSettings {
    pub api_key: SecretString,
}

#[derive(Deserialize, Clone)]
pub struct BootstrapAdminSettings {
    pub email: String,
    pub full_name: String,
    pub password: SecretString,
}

pub fn get() -> Result<Settings, Box<dyn Error>> {
    let config_path = env::current_dir()?.join("config");

    let app_env: Environment = env::var("APP_ENV")
        .unwrap_or_else(|_| "local".into())
        .try_into()?;

    let env_file = {
        let mut chars = app_env.as_str().chars();
        let mut env_file = chars
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_default();
        env_file.push_str(&chars.collect::<String>());

        format!("{}.toml", env_file)
    };

    let settings = Config::builder()
        .add_source(File::from(config_path.join("Base.toml")))
        .add_source(File::from(config_path.join(env_file)))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<Settings>()?)
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

impl TryFrom<&str> for Environment {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "local" => Ok(Self::Local),
            other => Err(format!(
                "{other} is not a supported environment. \
                Use either `local` or `production`.",
            )),
        }
    }
}
