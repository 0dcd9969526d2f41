//! Interactive OAuth consent flow for Google Calendar.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use tracing::info;

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::gcal::session;

const REDIRECT_PORT: u16 = 8085;
const REDIRECT_URI: &str = "http://localhost:8085/callback";
const CONSENT_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Run the full consent flow and persist the resulting session.
pub async fn authenticate(config: &Config) -> SyncResult<()> {
    if config.google.client_id.is_empty() || config.google.client_secret.is_empty() {
        return Err(SyncError::Config(
            "google.client_id and google.client_secret must be set in the config file".into(),
        ));
    }

    let state = uuid::Uuid::new_v4().to_string();
    let mut consent = url::Url::parse(CONSENT_URL).expect("static URL");
    consent
        .query_pairs_mut()
        .append_pair("client_id", &config.google.client_id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", &state);

    eprintln!("\nOpen this URL in your browser to authenticate:\n");
    eprintln!("{}\n", consent);

    if open::that(consent.as_str()).is_err() {
        eprintln!("(Could not open browser automatically, please copy the URL above)");
    }

    let (code, returned_state) = wait_for_callback()?;
    if returned_state != state {
        return Err(SyncError::Auth("OAuth state mismatch".into()));
    }

    let http = reqwest::Client::new();
    let session = session::exchange_code(&http, &config.google, &code, REDIRECT_URI).await?;
    session.save(&Config::session_path()?)?;

    info!("Google authentication complete");
    Ok(())
}

/// Start a local HTTP listener to receive the OAuth callback.
fn wait_for_callback() -> SyncResult<(String, String)> {
    let listener = TcpListener::bind(("127.0.0.1", REDIRECT_PORT)).map_err(|e| {
        SyncError::Auth(format!("Failed to bind to port {}: {}", REDIRECT_PORT, e))
    })?;

    eprintln!("Waiting for OAuth callback on port {}...", REDIRECT_PORT);

    let (mut stream, _) = listener
        .accept()
        .map_err(|e| SyncError::Auth(format!("Failed to accept connection: {}", e)))?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| SyncError::Auth("Invalid callback request".into()))?;

    let url = url::Url::parse(&format!("http://localhost{}", url_part))
        .map_err(|e| SyncError::Auth(format!("Invalid callback URL: {}", e)))?;

    let param = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.to_string())
    };

    let code = param("code").ok_or_else(|| SyncError::Auth("No code in callback".into()))?;
    let state = param("state").ok_or_else(|| SyncError::Auth("No state in callback".into()))?;

    let response = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>\
        <h1>Authentication successful!</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok((code, state))
}
