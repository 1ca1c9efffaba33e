use std::{path::PathBuf, sync::Arc, time::SystemTime};

use {
    anyhow::Result,
    tmibot_oauth::{Credential, TokenSource},
    tokio_util::sync::CancellationToken,
};

use crate::config_commands;

pub async fn token(config: Option<PathBuf>, no_browser: bool) -> Result<()> {
    let (_, config) = config_commands::load(config)?;
    let mut source = TokenSource::from_config(&config.auth);
    if no_browser {
        source = source.with_opener(Arc::new(|url: &str| {
            println!("Open this URL to authorize the bot:\n{url}");
        }));
    }

    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });

    let credential = match source.acquire(&cancel).await {
        Ok(credential) => credential,
        Err(e) if e.is_security_failure() => {
            anyhow::bail!("authorization was rejected, no token was issued: {e}")
        },
        Err(e) => return Err(e.into()),
    };
    println!("Token type: {}", credential.token_type);
    println!("Expires in: {}", describe_expiry(&credential));
    Ok(())
}

pub async fn validate(config: Option<PathBuf>, token: &str) -> Result<()> {
    let (_, config) = config_commands::load(config)?;
    let source = TokenSource::from_config(&config.auth);

    let credential = Credential::new(token.trim_start_matches("oauth:"), "bearer", 0);
    if source.validate(&credential).await? {
        println!("Token is valid.");
        Ok(())
    } else {
        anyhow::bail!("token was rejected by {}", config.auth.validate_url)
    }
}

fn describe_expiry(credential: &Credential) -> String {
    if credential.expires_in_seconds == 0 {
        return "unknown".into();
    }
    match credential.expires_at().duration_since(SystemTime::now()) {
        Ok(left) => format!("{}s", left.as_secs()),
        Err(_) => "expired".into(),
    }
}
