use anyhow::Result;
use console::style;
use serde::Serialize;

use huddle_core::{Identity, Meeting, ParticipantStatus};

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", style("✔").green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    println!("{} {}", style("✖").red(), msg);
}

/// Print info message (indented)
pub fn info(msg: &str) {
    println!("  {}", msg);
}

/// Print a header/title
pub fn header(msg: &str) {
    println!();
    println!("  {}", style(msg).bold());
    println!();
}

/// Print a dimmed hint for empty results
pub fn empty(msg: &str) {
    println!("  {}", style(msg).dim());
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct Outcome<'a> {
    ok: bool,
    action: &'a str,
}

/// Report the result of a state change that can be refused.
pub fn outcome(json: bool, action: &str, ok: bool, done: &str, refused: &str) -> Result<()> {
    if json {
        return print_json(&Outcome { ok, action });
    }
    if ok {
        success(done);
    } else {
        error(refused);
    }
    Ok(())
}

pub fn identity_line(identity: &Identity) -> String {
    format!(
        "{}  {}",
        style(identity.display_name()).bold(),
        style(format!("{} <{}>", identity.id, identity.email)).dim()
    )
}

pub fn status_label(status: ParticipantStatus) -> String {
    match status {
        ParticipantStatus::Accepted => style("accepted").green().to_string(),
        ParticipantStatus::Declined => style("declined").red().to_string(),
        ParticipantStatus::Pending => style("pending").yellow().to_string(),
    }
}

pub fn meeting_summary(meeting: &Meeting) {
    println!(
        "  #{} {}  {}",
        meeting.id,
        style(&meeting.title).bold(),
        style(format!(
            "{} to {}",
            meeting.starts_at.format("%Y-%m-%d %H:%M"),
            meeting.ends_at.format("%H:%M UTC")
        ))
        .dim()
    );
}
