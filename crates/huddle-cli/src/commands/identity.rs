use anyhow::Result;
use huddle_core::{Core, Identity, IdentityService};

use crate::ui;

pub async fn add(
    core: &Core,
    id: String,
    first_name: String,
    last_name: Option<String>,
    email: String,
    json: bool,
) -> Result<()> {
    let identity = Identity::new(id, first_name, last_name.unwrap_or_default(), email);
    let stored = core.register_identity(&identity).await?;

    if json {
        return ui::print_json(&stored);
    }
    ui::success(&format!("Registered {}", ui::identity_line(&stored)));
    Ok(())
}

pub async fn search(core: &Core, term: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let found = IdentityService::search(&core.identities, term, limit).await?;

    if json {
        return ui::print_json(&found);
    }
    if found.is_empty() {
        ui::empty(&format!("No identities match \"{}\"", term));
        return Ok(());
    }
    for identity in &found {
        ui::info(&ui::identity_line(identity));
    }
    Ok(())
}
