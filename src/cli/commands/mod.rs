mod auth;
mod entries;
mod users;

pub use auth::{
    cmd_login, cmd_logout, cmd_reset_password, cmd_signup, cmd_update_password, cmd_whoami,
};
pub use entries::{
    cmd_entries_add, cmd_entries_delete, cmd_entries_list, cmd_entries_show,
    cmd_entries_signed, cmd_entries_totals, cmd_entries_update,
};
pub use users::{
    cmd_users_delete, cmd_users_list, cmd_users_set_admin, cmd_users_show, cmd_users_update,
};

use anyhow::Context;

use crate::domain::UserId;
use crate::state::SharedState;

/// Returns `given`, or reads a line from stdin after printing `prompt`.
fn secret_or_prompt(given: Option<String>, prompt: &str) -> anyhow::Result<String> {
    if let Some(value) = given {
        return Ok(value);
    }

    println!("{prompt}");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let input = input.trim_end_matches(['\r', '\n']).to_string();

    if input.is_empty() {
        anyhow::bail!("No password given");
    }
    Ok(input)
}

/// The signed-in user's id.
async fn signed_in_user(state: &SharedState) -> anyhow::Result<UserId> {
    let user = state
        .auth
        .current_user()
        .await
        .context("Not signed in. Run 'ndt-hours auth login <email>' first")?;
    Ok(user.id)
}
