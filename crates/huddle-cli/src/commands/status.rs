use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use huddle_core::{Core, HuddlePaths};

use crate::ui;

#[derive(Serialize)]
struct Status {
    data_dir: String,
    identities: i64,
    relationships: BTreeMap<&'static str, i64>,
    meetings: i64,
}

pub async fn run(core: &Core, paths: &HuddlePaths, json: bool) -> Result<()> {
    let relationships = core
        .identities
        .relationship_count_by_status()
        .await?
        .into_iter()
        .map(|(status, count)| (status.as_str(), count))
        .collect();

    let status = Status {
        data_dir: paths.base_dir.display().to_string(),
        identities: core.identities.identity_count().await?,
        relationships,
        meetings: core.meetings.meeting_count().await?,
    };

    if json {
        return ui::print_json(&status);
    }

    ui::header("Huddle");
    ui::info(&format!("Data:          {}", status.data_dir));
    ui::info(&format!("Identities:    {}", status.identities));
    if status.relationships.is_empty() {
        ui::info("Relationships: none");
    }
    for (name, count) in &status.relationships {
        ui::info(&format!("{:<14} {}", format!("{}:", name), count));
    }
    ui::info(&format!("Meetings:      {}", status.meetings));
    println!();
    Ok(())
}
