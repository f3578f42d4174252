use serde_json::{Map, Value};

use super::secret_or_prompt;
use crate::services::is_admin;
use crate::state::SharedState;

pub async fn cmd_signup(
    state: &SharedState,
    email: &str,
    password: Option<String>,
    full_name: Option<String>,
    username: Option<String>,
) -> anyhow::Result<()> {
    let password = secret_or_prompt(password, "Choose a password:")?;

    let mut metadata = Map::new();
    if let Some(name) = full_name {
        metadata.insert("full_name".to_string(), Value::String(name));
    }
    if let Some(name) = username {
        metadata.insert("username".to_string(), Value::String(name));
    }

    let response = state.auth.sign_up(email, &password, metadata).await?;

    if response.session.is_some() {
        println!("✓ Account created and signed in as {email}");
    } else {
        println!("✓ Account created. Check {email} for a confirmation link.");
    }
    Ok(())
}

pub async fn cmd_login(
    state: &SharedState,
    email: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = secret_or_prompt(password, "Password:")?;
    let response = state.auth.sign_in(email, &password).await?;

    let admin = if is_admin(response.user.as_ref()) {
        " (admin)"
    } else {
        ""
    };
    println!("✓ Signed in as {email}{admin}");
    Ok(())
}

pub async fn cmd_logout(state: &SharedState) -> anyhow::Result<()> {
    state.auth.sign_out().await?;
    println!("✓ Signed out");
    Ok(())
}

pub async fn cmd_whoami(state: &SharedState) -> anyhow::Result<()> {
    if state.auth.session().await?.is_none() {
        println!("Not signed in.");
        return Ok(());
    }

    let user = state.auth.current_user().await?;
    println!("User: {}", user.email.as_deref().unwrap_or("(no email)"));
    println!("{:-<50}", "");
    println!("ID:    {}", user.id);
    println!("Admin: {}", if is_admin(Some(&user)) { "Yes" } else { "No" });
    if let Some(name) = user.user_metadata.get("full_name").and_then(Value::as_str) {
        println!("Name:  {name}");
    }
    if let Some(at) = user.last_sign_in_at {
        println!("Last sign-in: {}", at.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

pub async fn cmd_reset_password(state: &SharedState, email: &str) -> anyhow::Result<()> {
    state.auth.reset_password(email).await?;
    println!("✓ If {email} has an account, a reset link is on its way.");
    Ok(())
}

pub async fn cmd_update_password(
    state: &SharedState,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = secret_or_prompt(password, "New password:")?;
    state.auth.update_password(&password).await?;
    println!("✓ Password updated");
    Ok(())
}
