//! Member directory commands: `tovalley member add`, `tovalley member list`.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum MemberCommand {
    /// Register a member under a unique nickname.
    Add {
        /// Public nickname used to open chat rooms.
        nickname: String,
    },

    /// List registered members.
    #[command(alias = "ls")]
    List,
}

pub async fn handle_member_command(
    action: MemberCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match action {
        MemberCommand::Add { nickname } => add_member(state, &nickname, json).await,
        MemberCommand::List => list_members(state, json).await,
    }
}

async fn add_member(state: &AppState, nickname: &str, json: bool) -> Result<()> {
    if nickname.trim().is_empty() {
        anyhow::bail!("nickname must not be empty");
    }

    let member = state.chat_service.members().add(nickname).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&member)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Member {} registered with id {}",
        style("✓").green().bold(),
        style(&member.nickname).cyan(),
        style(member.id).bold()
    );
    println!(
        "  {}",
        style(format!("Send requests with header X-Member-Id: {}", member.id)).dim()
    );
    println!();
    Ok(())
}

async fn list_members(state: &AppState, json: bool) -> Result<()> {
    let members = state.chat_service.members().list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&members)?);
        return Ok(());
    }

    if members.is_empty() {
        println!();
        println!(
            "  {} No members yet. Add one with: {}",
            style("i").blue().bold(),
            style("tovalley member add <nickname>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Nickname").fg(Color::White),
    ]);

    for member in &members {
        table.add_row(vec![
            Cell::new(member.id).fg(Color::DarkGrey),
            Cell::new(&member.nickname).fg(Color::Cyan),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} member{}",
        style(members.len()).bold(),
        if members.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}
