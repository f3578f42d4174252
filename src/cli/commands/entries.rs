use chrono::{Local, NaiveDate};
use serde_json::Map;

use super::signed_in_user;
use crate::domain::EntryId;
use crate::models::{Entry, EntryFilters, EntryPatch, NewEntry};
use crate::parser::number::format_hours;
use crate::state::SharedState;

fn parse_entry_id(id: &str) -> anyhow::Result<EntryId> {
    id.parse()
        .map_err(|e| anyhow::anyhow!("Invalid entry ID '{id}': {e}"))
}

fn entry_date_text(entry: &Entry) -> String {
    entry
        .entry_date
        .map_or_else(|| "????-??-??".to_string(), |d| d.to_string())
}

fn print_entry_line(entry: &Entry) {
    let hours = entry.hours.map_or_else(|| "? h".to_string(), format_hours);
    let method = entry.method.as_deref().unwrap_or("-");
    let company = entry.company.as_deref().unwrap_or("-");
    println!(
        "{}  {:<6} {:>8}  {:<24} {}",
        entry_date_text(entry),
        method,
        hours,
        company,
        entry.id
    );
}

pub async fn cmd_entries_list(
    state: &SharedState,
    method: Option<String>,
    company: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let user_id = signed_in_user(state).await?;
    let filters = EntryFilters {
        method,
        company,
        date_from: from,
        date_to: to,
    };

    let entries = state.entries.filtered_entries(user_id, &filters).await?;

    if entries.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    println!("Entries ({}):", entries.len());
    println!("{:-<80}", "");
    for entry in &entries {
        print_entry_line(entry);
    }

    let total: f64 = entries.iter().filter_map(|e| e.hours).sum();
    println!("{:-<80}", "");
    println!("Total: {}", format_hours(total));
    Ok(())
}

pub async fn cmd_entries_show(state: &SharedState, id: &str) -> anyhow::Result<()> {
    let entry_id = parse_entry_id(id)?;
    let entry = match state.entries.entry(entry_id).await {
        Ok(entry) => entry,
        Err(e) if e.is_not_found() => {
            println!("Entry {entry_id} not found.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let signed = state.entries.has_signature(entry_id).await?;

    println!("Entry {}", entry.id);
    println!("{:-<60}", "");
    println!("Date:    {}", entry_date_text(&entry));
    println!("Method:  {}", entry.method.as_deref().unwrap_or("-"));
    println!(
        "Hours:   {}",
        entry.hours.map_or_else(|| "?".to_string(), format_hours)
    );
    println!("Company: {}", entry.company.as_deref().unwrap_or("-"));
    println!("Signed:  {}", if signed { "Yes" } else { "No" });

    for (key, value) in &entry.extra {
        if !value.is_null() {
            println!("{key}: {value}");
        }
    }
    Ok(())
}

pub async fn cmd_entries_add(
    state: &SharedState,
    method: String,
    hours: f64,
    company: Option<String>,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let user_id = signed_in_user(state).await?;

    let entry = state
        .entries
        .create_entry(NewEntry {
            user_id,
            method,
            hours,
            company,
            entry_date: date.unwrap_or_else(|| Local::now().date_naive()),
            extra: Map::new(),
        })
        .await?;

    println!("✓ Logged entry:");
    print_entry_line(&entry);
    Ok(())
}

pub async fn cmd_entries_update(
    state: &SharedState,
    id: &str,
    patch: EntryPatch,
) -> anyhow::Result<()> {
    let entry_id = parse_entry_id(id)?;

    if patch.is_empty() {
        println!("Nothing to update. Pass --method, --hours, --company or --date.");
        return Ok(());
    }

    match state.entries.update_entry(entry_id, patch).await? {
        Some(entry) => {
            println!("✓ Updated entry:");
            print_entry_line(&entry);
        }
        None => println!("Entry {entry_id} not found."),
    }
    Ok(())
}

pub async fn cmd_entries_delete(state: &SharedState, id: &str) -> anyhow::Result<()> {
    let entry_id = parse_entry_id(id)?;
    state.entries.delete_entry(entry_id).await?;
    println!("✓ Deleted entry {entry_id} and its signatures");
    Ok(())
}

pub async fn cmd_entries_totals(state: &SharedState) -> anyhow::Result<()> {
    let user_id = signed_in_user(state).await?;
    let totals = state.entries.totals_by_method(user_id).await?;

    if totals.is_empty() {
        println!("No hours logged yet.");
        return Ok(());
    }

    println!("Hours by method:");
    println!("{:-<30}", "");
    for (method, hours) in &totals {
        println!("{method:<12} {:>12}", format_hours(*hours));
    }
    println!("{:-<30}", "");
    println!("{:<12} {:>12}", "Total", format_hours(totals.values().sum()));
    Ok(())
}

pub async fn cmd_entries_signed(state: &SharedState, id: &str) -> anyhow::Result<()> {
    let entry_id = parse_entry_id(id)?;
    if state.entries.has_signature(entry_id).await? {
        println!("Entry {entry_id} is signed.");
    } else {
        println!("Entry {entry_id} has no signature.");
    }
    Ok(())
}
