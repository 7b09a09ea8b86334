use anyhow::{Context, Result, bail};
use tracing::info;

use crate::store::{ACCESS_TOKEN, REFRESH_TOKEN, StateStore};
use crate::types::TokenPair;

/// Exchange account credentials for an OAuth token pair (password grant).
/// `token_url` is normally [`crate::AUTH_TOKEN_URL`].
pub async fn password_grant(
    client: &reqwest::Client,
    token_url: &str,
    email: &str,
    password: &str,
) -> Result<TokenPair> {
    let form = [
        ("grant_type", "password"),
        ("credential_type", "email"),
        ("email", email),
        ("password", password),
    ];
    request_tokens(client, token_url, &form)
        .await
        .context("password grant failed")
}

/// Exchange a refresh token for a fresh token pair.
pub async fn refresh_grant(
    client: &reqwest::Client,
    token_url: &str,
    refresh_token: &str,
) -> Result<TokenPair> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    request_tokens(client, token_url, &form)
        .await
        .context("refresh grant failed")
}

async fn request_tokens(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenPair> {
    let resp = client.post(token_url).form(form).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("auth server returned {status}: {body}");
    }
    let tokens: TokenPair = resp.json().await.context("malformed token response")?;
    Ok(tokens)
}

/// Persist a token pair as credential records.
pub fn store_tokens(store: &mut StateStore, tokens: &TokenPair) -> Result<()> {
    store.set_credential(ACCESS_TOKEN, &tokens.access_token)?;
    store.set_credential(REFRESH_TOKEN, &tokens.refresh_token)?;
    info!("Stored access and refresh tokens");
    Ok(())
}

/// Access token persisted by a previous `setup-account` run.
pub fn stored_access_token(store: &StateStore) -> Result<&str> {
    store.credential(ACCESS_TOKEN).context(
        "no access token in the state file; run `setup-account` to authenticate first",
    )
}
