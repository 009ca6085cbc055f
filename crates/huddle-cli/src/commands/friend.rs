use anyhow::Result;
use console::style;
use huddle_core::Core;

use crate::ui;

pub async fn send(core: &Core, from: &str, to: &str, json: bool) -> Result<()> {
    let ok = core.friendships.send(from, to).await?;
    ui::outcome(
        json,
        "send",
        ok,
        &format!("Friend request sent from {} to {}", from, to),
        "Request not sent (unknown identity, self request, or the pair is already linked)",
    )
}

pub async fn accept(core: &Core, relationship_id: i64, acting: &str, json: bool) -> Result<()> {
    let ok = core.friendships.accept(relationship_id, acting).await?;
    ui::outcome(
        json,
        "accept",
        ok,
        &format!("Request {} accepted", relationship_id),
        "Only the receiver of a pending request can accept it",
    )
}

pub async fn decline(core: &Core, relationship_id: i64, acting: &str, json: bool) -> Result<()> {
    let ok = core.friendships.decline(relationship_id, acting).await?;
    ui::outcome(
        json,
        "decline",
        ok,
        &format!("Request {} declined", relationship_id),
        "Only the receiver of a pending request can decline it",
    )
}

pub async fn cancel(core: &Core, relationship_id: i64, acting: &str, json: bool) -> Result<()> {
    let ok = core.friendships.cancel(relationship_id, acting).await?;
    ui::outcome(
        json,
        "cancel",
        ok,
        &format!("Request {} cancelled", relationship_id),
        "Only the sender of a pending request can cancel it",
    )
}

pub async fn remove(core: &Core, user: &str, friend: &str, json: bool) -> Result<()> {
    let ok = core.friendships.remove(user, friend).await?;
    ui::outcome(
        json,
        "remove",
        ok,
        &format!("{} and {} are no longer friends", user, friend),
        "These identities are not friends",
    )
}

pub async fn list(core: &Core, user: &str, json: bool) -> Result<()> {
    let friends = core.friendships.list_friends(user).await?;
    if json {
        return ui::print_json(&friends);
    }

    ui::header(&format!("Friends of {}", user));
    if friends.is_empty() {
        ui::empty("No friends yet");
    }
    for friend in &friends {
        ui::info(&ui::identity_line(friend));
    }
    Ok(())
}

pub async fn pending(core: &Core, user: &str, json: bool) -> Result<()> {
    let requests = core.friendships.list_pending_requests(user).await?;
    if json {
        return ui::print_json(&requests);
    }

    ui::header(&format!("Pending requests for {}", user));
    if requests.is_empty() {
        ui::empty("Nothing pending");
    }
    for request in &requests {
        let direction = if request.is_incoming {
            style("from").cyan()
        } else {
            style("to").magenta()
        };
        ui::info(&format!(
            "#{} {} {}",
            request.relationship.id,
            direction,
            ui::identity_line(&request.other)
        ));
    }
    Ok(())
}

pub async fn suggest(core: &Core, user: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let suggestions = match limit {
        Some(max) => {
            core.suggestions
                .suggest_up_to(&core.identities, user, max)
                .await?
        }
        None => core.suggest(user).await?,
    };
    if json {
        return ui::print_json(&suggestions);
    }

    ui::header(&format!("People {} may know", user));
    if suggestions.is_empty() {
        ui::empty("No suggestions");
    }
    for suggestion in &suggestions {
        let mutual = match suggestion.mutual_count {
            0 => String::new(),
            1 => "1 mutual friend".to_string(),
            n => format!("{} mutual friends", n),
        };
        ui::info(&format!(
            "{}  {}",
            ui::identity_line(&suggestion.identity),
            style(mutual).cyan()
        ));
    }
    Ok(())
}
