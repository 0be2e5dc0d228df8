use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::api::{build_url, Query};
use crate::error::{Error, Result};

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
const AUTH_STATE: &str = "state-token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are treated as expired.
const EXPIRY_DELTA_SECS: i64 = 10;

/// Supplies bearer tokens for the Sheets API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// OAuth token as cached on disk between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_DELTA_SECS) > now,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, now: DateTime<Utc>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expiry: self.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }
}

async fn request_token(client: &Client, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
    debug!("Requesting OAuth token from {}", token_uri);
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| Error::SinkUnavailable(format!("fail to request oauth token: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::SinkUnavailable(format!("fail to read oauth token response: {}", e)))?;
    if !status.is_success() {
        return Err(Error::SinkUnavailable(format!(
            "oauth token request returns statusCode={} {}",
            status.as_u16(),
            body
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| Error::SinkUnavailable(format!("fail to decode oauth token response: {}", e)))
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Google service-account credentials, exchanged for access tokens via a signed JWT.
pub struct ServiceAccount {
    client: Client,
    client_email: String,
    private_key_id: Option<String>,
    token_uri: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<StoredToken>>,
}

impl ServiceAccount {
    pub fn from_file(client: Client, path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!(
                "fail to read service account key from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(client, &raw)
    }

    pub fn from_json(client: Client, raw: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(raw)
            .map_err(|e| Error::ConfigError(format!("invalid service account key: {}", e)))?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::ConfigError(format!("invalid service account private key: {}", e)))?;

        Ok(Self {
            client,
            client_email: key.client_email,
            private_key_id: key.private_key_id,
            token_uri: key.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let claims = Claims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::SinkUnavailable(format!("fail to sign service account assertion: {}", e)))
    }
}

#[async_trait]
impl TokenProvider for ServiceAccount {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_valid(now)) {
            return Ok(token.access_token.clone());
        }

        let assertion = self.assertion(now)?;
        let token = request_token(
            &self.client,
            &self.token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
        )
        .await?
        .into_stored(now);
        info!("Obtained access token for service account {}", self.client_email);

        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }
}

#[derive(Debug, Deserialize)]
struct CredentialFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

/// OAuth client registration as downloaded from the Google console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecret {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!(
                "fail to read google sheet oauth credential from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: CredentialFile = serde_json::from_str(raw).map_err(|e| {
            Error::ConfigError(format!("fail to get google sheet config from json: {}", e))
        })?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::ConfigError("oauth credential has neither an installed nor a web client".to_string())
        })
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OOB_REDIRECT_URI)
    }

    /// Consent page URL the user opens to obtain an authorization code.
    pub fn auth_code_url(&self) -> Result<String> {
        build_url(
            &self.auth_uri,
            &[
                Query::new("access_type", "offline"),
                Query::new("client_id", self.client_id.as_str()),
                Query::new("redirect_uri", self.redirect_uri()),
                Query::new("response_type", "code"),
                Query::new("scope", SPREADSHEETS_SCOPE),
                Query::new("state", AUTH_STATE),
            ],
        )
    }
}

pub fn load_token(path: &Path) -> Result<StoredToken> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        Error::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("invalid cached token: {}", e),
        ))
    })
}

pub fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    let content = serde_json::to_string(token).map_err(|e| {
        Error::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(content.as_bytes())?;

    info!("OAuth token cached at {}", path.display());
    Ok(())
}

fn read_auth_code<R: BufRead>(mut input: R) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    let code = line.trim().to_string();
    if code.is_empty() {
        return Err(Error::SinkUnavailable("unable to read authorization code".to_string()));
    }
    Ok(code)
}

/// Interactive OAuth installed-application flow with an on-disk token cache.
pub struct InstalledFlow {
    client: Client,
    secret: ClientSecret,
    token_path: PathBuf,
    token: Mutex<StoredToken>,
}

impl InstalledFlow {
    /// Loads the cached token from `token_path`, or runs the consent flow reading the
    /// authorization code from `input` and caches the result.
    pub async fn new<R: BufRead>(
        client: Client,
        secret: ClientSecret,
        token_path: PathBuf,
        input: R,
    ) -> Result<Self> {
        let cached = load_token(&token_path).and_then(|token| {
            if token.is_valid(Utc::now()) || token.refresh_token.is_some() {
                Ok(token)
            } else {
                Err(Error::SinkUnavailable(
                    "cached oauth token expired and has no refresh token".to_string(),
                ))
            }
        });
        let token = match cached {
            Ok(token) => token,
            Err(e) => {
                warn!("No usable cached token at {}: {}", token_path.display(), e);
                let token = Self::authorize(&client, &secret, input).await?;
                save_token(&token_path, &token)?;
                token
            }
        };

        Ok(Self {
            client,
            secret,
            token_path,
            token: Mutex::new(token),
        })
    }

    async fn authorize<R: BufRead>(client: &Client, secret: &ClientSecret, input: R) -> Result<StoredToken> {
        let auth_url = secret.auth_code_url()?;
        info!(
            "Go to the following link in your browser then type the authorization code: \n{}\n",
            auth_url
        );
        let code = read_auth_code(input)?;

        let now = Utc::now();
        let token = request_token(
            client,
            &secret.token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("redirect_uri", secret.redirect_uri()),
            ],
        )
        .await?;

        Ok(token.into_stored(now))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let now = Utc::now();
        let response = request_token(
            &self.client,
            &self.secret.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
            ],
        )
        .await?;

        let mut token = response.into_stored(now);
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for InstalledFlow {
    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if token.is_valid(Utc::now()) {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            Error::SinkUnavailable("cached oauth token expired and has no refresh token".to_string())
        })?;
        let refreshed = self.refresh(&refresh_token).await?;
        info!("Refreshed OAuth access token");
        save_token(&self.token_path, &refreshed)?;

        let access_token = refreshed.access_token.clone();
        *token = refreshed;
        Ok(access_token)
    }
}
