// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::AuthError;

/// Earthdata URS endpoint the login form is posted to
pub const URS_LOGIN_URL: &str = "https://urs.earthdata.nasa.gov";

/// Environment variable consulted when no password argument is given
pub const PASSWORD_ENV: &str = "GPMPWD";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Response of a session GET: HTTP status plus the complete body
pub struct SessionResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Authenticated-session abstraction for listing and download requests.
///
/// One session is created per run and shared by reference with every
/// listing fetch and file transfer; nothing mutates it after login.
#[async_trait]
pub trait ArchiveSession: Send + Sync {
    /// Fetch the full response body for a URL
    async fn get(&self, url: &str) -> Result<SessionResponse, reqwest::Error>;
}

/// Earthdata URS session backed by reqwest.
///
/// The login POST is made once up front; the cookie store carries the
/// resulting auth cookies into every later listing and download request.
pub struct EarthdataSession {
    client: reqwest::Client,
}

impl EarthdataSession {
    /// Log in to Earthdata URS and return a session ready for data requests.
    ///
    /// A rejected login fails here, before any listing is attempted,
    /// rather than surfacing as per-file failures later.
    pub async fn login(user: &str, password: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::RequestFailed {
                url: URS_LOGIN_URL.to_string(),
                source: e,
            })?;

        let response = client
            .post(URS_LOGIN_URL)
            .form(&[("user", user), ("password", password)])
            .send()
            .await
            .map_err(|e| AuthError::RequestFailed {
                url: URS_LOGIN_URL.to_string(),
                source: e,
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(AuthError::Rejected {
                url: URS_LOGIN_URL.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(Self { client })
    }
}

#[async_trait]
impl ArchiveSession for EarthdataSession {
    async fn get(&self, url: &str) -> Result<SessionResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(SessionResponse { status, body })
    }
}

/// Resolved account credentials for the archive session
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Resolve credentials from the explicit arguments, the `GPMPWD`
    /// environment variable and an optional credential file, in that
    /// priority order. The credential file holds the username on the
    /// first line and the password on the second.
    pub fn resolve(
        user: Option<String>,
        password: Option<String>,
        cred_file: Option<&Path>,
    ) -> Result<Self, AuthError> {
        let from_file = cred_file.map(read_credential_file).transpose()?;

        let user = user
            .or_else(|| from_file.as_ref().map(|(u, _)| u.clone()))
            .ok_or(AuthError::MissingUser)?;

        let password = password
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
            .or_else(|| from_file.map(|(_, p)| p))
            .ok_or(AuthError::MissingPassword {
                env_var: PASSWORD_ENV,
            })?;

        Ok(Self { user, password })
    }
}

fn read_credential_file(path: &Path) -> Result<(String, String), AuthError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| AuthError::CredentialFileUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut lines = content.lines().map(str::trim);
    match (lines.next(), lines.next()) {
        (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
            Ok((user.to_string(), password.to_string()))
        }
        _ => Err(AuthError::CredentialFileMalformed {
            path: path.to_path_buf(),
        }),
    }
}
