use super::signed_in_user;
use crate::domain::UserId;
use crate::models::{Profile, ProfilePatch};
use crate::state::SharedState;

fn parse_user_id(id: &str) -> anyhow::Result<UserId> {
    id.parse()
        .map_err(|e| anyhow::anyhow!("Invalid user ID '{id}': {e}"))
}

fn display_name(profile: &Profile) -> &str {
    profile
        .full_name
        .as_deref()
        .or(profile.username.as_deref())
        .unwrap_or("(unnamed)")
}

pub async fn cmd_users_show(state: &SharedState, id: Option<String>) -> anyhow::Result<()> {
    let user_id = match id {
        Some(id) => parse_user_id(&id)?,
        None => signed_in_user(state).await?,
    };

    let profile = state.users.profile(user_id).await?;

    println!("Profile: {}", display_name(&profile));
    println!("{:-<60}", "");
    println!("ID:       {}", profile.id);
    println!("Username: {}", profile.username.as_deref().unwrap_or("-"));
    println!("Admin:    {}", if profile.is_admin { "Yes" } else { "No" });
    if let Some(created) = profile.created_at {
        println!("Created:  {}", created.format("%Y-%m-%d"));
    }
    Ok(())
}

pub async fn cmd_users_list(state: &SharedState) -> anyhow::Result<()> {
    let profiles = state.users.list_profiles().await?;

    if profiles.is_empty() {
        println!("No profiles.");
        return Ok(());
    }

    println!("Profiles ({}):", profiles.len());
    println!("{:-<80}", "");
    for profile in &profiles {
        let admin = if profile.is_admin { " [ADMIN]" } else { "" };
        println!("• {}{}", display_name(profile), admin);
        println!("  ID: {}", profile.id);
    }
    Ok(())
}

pub async fn cmd_users_update(
    state: &SharedState,
    full_name: Option<String>,
    username: Option<String>,
) -> anyhow::Result<()> {
    if full_name.is_none() && username.is_none() {
        println!("Nothing to update. Pass --full-name or --username.");
        return Ok(());
    }

    let user_id = signed_in_user(state).await?;
    let patch = ProfilePatch {
        full_name,
        username,
        ..ProfilePatch::default()
    };

    match state.users.update_profile(user_id, patch).await? {
        Some(profile) => println!("✓ Profile updated: {}", display_name(&profile)),
        None => println!("No profile exists for {user_id}."),
    }
    Ok(())
}

pub async fn cmd_users_delete(state: &SharedState, id: &str) -> anyhow::Result<()> {
    let user_id = parse_user_id(id)?;
    state.users.delete_profile(user_id).await?;
    println!("✓ Deleted profile {user_id}");
    Ok(())
}

pub async fn cmd_users_set_admin(state: &SharedState, id: &str, admin: bool) -> anyhow::Result<()> {
    let user_id = parse_user_id(id)?;
    let profile = state.users.toggle_admin_status(user_id, admin).await?;

    let verb = if admin { "granted to" } else { "revoked from" };
    match profile {
        Some(profile) => println!("✓ Admin rights {verb} {}", display_name(&profile)),
        None => println!("✓ Admin rights {verb} {user_id} (no profile row to update)"),
    }
    Ok(())
}
