use anyhow::Result;
use chrono::{DateTime, Utc};
use console::style;
use huddle_core::{Core, Meeting, MeetingDraft, Participant, ParticipantStatus};

use crate::ui;

/// Parse `contact` or `contact:status` (status defaults to pending).
pub fn parse_participant(value: &str) -> Result<Participant, String> {
    match value.split_once(':') {
        None => Ok(Participant::pending(value)),
        Some((contact, status)) => Ok(Participant::new(contact, parse_status(status)?)),
    }
}

pub fn parse_status(value: &str) -> Result<ParticipantStatus, String> {
    ParticipantStatus::parse(&value.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown status `{}` (pending, accepted, declined)", value))
}

pub fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn print_meeting(meeting: &Meeting) {
    ui::meeting_summary(meeting);
    if let Some(description) = &meeting.description {
        ui::info(&format!("  {}", style(description).italic()));
    }
    for participant in &meeting.participants {
        let organizer = if participant.contact_id == meeting.creator_id {
            style(" (organizer)").dim().to_string()
        } else {
            String::new()
        };
        ui::info(&format!(
            "  {} {}{}",
            participant.contact_id,
            ui::status_label(participant.status),
            organizer
        ));
    }
}

pub struct CreateArgs {
    pub creator: String,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub invite: Vec<Participant>,
}

pub async fn create(core: &Core, args: CreateArgs, json: bool) -> Result<()> {
    let mut draft = MeetingDraft::new(args.title, args.starts_at, args.ends_at);
    draft.description = args.description;

    let created = core
        .meetings
        .create_meeting(&args.creator, &draft, &args.invite)
        .await?;

    if json {
        return ui::print_json(&created);
    }
    match created {
        Some(meeting) => {
            ui::success(&format!("Created meeting #{}", meeting.id));
            print_meeting(&meeting);
        }
        None => ui::error(
            "Meeting not created (empty title, end before start, or an unknown identity)",
        ),
    }
    Ok(())
}

pub async fn show(core: &Core, meeting_id: i64, json: bool) -> Result<()> {
    let meeting = core.meetings.get_meeting(meeting_id).await?;
    if json {
        return ui::print_json(&meeting);
    }
    match meeting {
        Some(meeting) => print_meeting(&meeting),
        None => ui::error(&format!("No meeting #{}", meeting_id)),
    }
    Ok(())
}

pub async fn reconcile(
    core: &Core,
    meeting_id: i64,
    organizer: &str,
    participants: Vec<Participant>,
    json: bool,
) -> Result<()> {
    let ok = core
        .meetings
        .reconcile_participants(meeting_id, &participants, organizer)
        .await?;
    ui::outcome(
        json,
        "reconcile",
        ok,
        &format!("Participants of meeting #{} updated", meeting_id),
        "Only the organizer can change participants, and every participant must exist",
    )
}

pub async fn respond(
    core: &Core,
    meeting_id: i64,
    contact: &str,
    status: ParticipantStatus,
    json: bool,
) -> Result<()> {
    let ok = core.meetings.respond(meeting_id, contact, status).await?;
    ui::outcome(
        json,
        "respond",
        ok,
        &format!("{} {} meeting #{}", contact, status.as_str(), meeting_id),
        "Not an invitee of this meeting, or not a valid answer",
    )
}

pub async fn delete(core: &Core, meeting_id: i64, acting: &str, json: bool) -> Result<()> {
    let ok = core.meetings.delete_meeting(meeting_id, acting).await?;
    ui::outcome(
        json,
        "delete",
        ok,
        &format!("Meeting #{} deleted", meeting_id),
        "Only the organizer can delete a meeting",
    )
}

pub async fn list(core: &Core, contact: &str, json: bool) -> Result<()> {
    let meetings = core.meetings.meetings_for(contact).await?;
    if json {
        return ui::print_json(&meetings);
    }

    ui::header(&format!("Meetings for {}", contact));
    if meetings.is_empty() {
        ui::empty("No meetings");
    }
    for meeting in &meetings {
        ui::meeting_summary(meeting);
    }
    Ok(())
}
