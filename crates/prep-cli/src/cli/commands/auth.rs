//! Login, registration, logout and status handlers.

use std::io::Write;

use anyhow::{Context, Result, bail};
use prep_core::api::ApiError;
use prep_core::api::auth::{
    ACTIVE_SESSION_EXISTS, AuthApi, Registration, format_phone_number, is_valid_phone_number,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::AppContext;

fn require_phone(phone: &str) -> Result<()> {
    if !is_valid_phone_number(phone) {
        bail!("Please enter a valid phone number (10 digits)");
    }
    Ok(())
}

/// Sends an OTP and reads it from stdin.
async fn obtain_code(auth: &AuthApi, phone: &str) -> Result<String> {
    if let Some(message) = auth.send_otp(phone).await.map_err(api_error)? {
        println!("{message}");
    }
    print!("Enter the OTP sent to {}: ", format_phone_number(phone));
    std::io::stdout().flush().context("flush stdout")?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("read OTP")?;
    let code = line.trim().to_string();
    if code.is_empty() {
        bail!("No OTP entered");
    }
    Ok(code)
}

fn api_error(err: ApiError) -> anyhow::Error {
    anyhow::anyhow!(err)
}

fn user_name(user: Option<&Value>) -> Option<&str> {
    user?
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub async fn login(ctx: &AppContext, phone: &str, code: Option<String>, force: bool) -> Result<()> {
    require_phone(phone)?;
    let auth = AuthApi::new(ctx.backend.clone());

    let code = match code {
        Some(code) => code,
        None => obtain_code(&auth, phone).await?,
    };

    let credentials = match auth.login(phone, &code, force).await {
        Ok(credentials) => credentials,
        Err(err) if err.code.as_deref() == Some(ACTIVE_SESSION_EXISTS) => {
            bail!(
                "{}. Re-run with --force to log out the other device.",
                err.message
            )
        }
        Err(err) if err.status == Some(404) => {
            bail!(
                "{} Run `prep register --phone {phone} --name <name>`.",
                err.message
            )
        }
        Err(err) => return Err(api_error(err)).context("login failed"),
    };

    match user_name(credentials.user.as_ref()) {
        Some(name) => println!("Logged in as {name}."),
        None => println!("Logged in."),
    }
    println!("Session valid until {}", credentials.expires_at.to_rfc3339());
    Ok(())
}

pub async fn register(
    ctx: &AppContext,
    registration: Registration,
    code: Option<String>,
) -> Result<()> {
    require_phone(&registration.phone_number)?;
    if registration.name.trim().is_empty() {
        bail!("Please enter your name");
    }
    let auth = AuthApi::new(ctx.backend.clone());

    let code = match code {
        Some(code) => code,
        None => obtain_code(&auth, &registration.phone_number).await?,
    };
    auth.verify_otp(&registration.phone_number, &code)
        .await
        .map_err(api_error)
        .context("OTP verification failed")?;
    auth.register(&registration)
        .await
        .map_err(api_error)
        .context("registration failed")?;

    println!(
        "Registration successful. Log in with `prep login --phone {}`.",
        registration.phone_number.trim()
    );
    Ok(())
}

pub async fn logout(ctx: &AppContext) -> Result<()> {
    if ctx.session.credentials().is_none() {
        println!("Not logged in.");
        return Ok(());
    }

    let auth = AuthApi::new(ctx.backend.clone());
    if let Err(err) = auth.logout().await {
        tracing::warn!(error = %err, "Backend logout failed; local session cleared");
    }
    println!("Logged out.");
    Ok(())
}

pub fn status(ctx: &AppContext) {
    println!("Backend: {}", ctx.backend.base_url());

    let credentials = ctx
        .session
        .credentials()
        .filter(|_| ctx.session.is_authenticated());
    let Some(credentials) = credentials else {
        println!("Not logged in.");
        return;
    };

    match user_name(credentials.user.as_ref()) {
        Some(name) => println!("Logged in as {name}."),
        None => println!("Logged in."),
    }
    println!("Session valid until {}", credentials.expires_at.to_rfc3339());
}
