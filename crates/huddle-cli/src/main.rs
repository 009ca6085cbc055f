use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use huddle_core::{Core, HuddleConfig, HuddlePaths, Participant, ParticipantStatus};
use tracing_subscriber::EnvFilter;

mod commands;
mod ui;

use commands::meeting::{parse_participant, parse_status, parse_time};

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Friends, suggestions and meetings. Local-first.")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to $HUDDLE_DATA_DIR or the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the identity directory
    Identity {
        #[command(subcommand)]
        command: IdentityCommand,
    },

    /// Friend requests, friends and suggestions
    Friend {
        #[command(subcommand)]
        command: FriendCommand,
    },

    /// Meetings and their participants
    Meeting {
        #[command(subcommand)]
        command: MeetingCommand,
    },

    /// Show data location and record counts
    Status,
}

#[derive(Subcommand)]
enum IdentityCommand {
    /// Register or update an identity
    Add {
        id: String,
        first_name: String,
        email: String,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Search identities by name or email
    Search {
        term: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum FriendCommand {
    /// Send a friend request
    Send { from: String, to: String },
    /// Accept a pending request (receiver only)
    Accept {
        relationship_id: i64,
        #[arg(long = "as", value_name = "USER")]
        acting: String,
    },
    /// Decline a pending request (receiver only)
    Decline {
        relationship_id: i64,
        #[arg(long = "as", value_name = "USER")]
        acting: String,
    },
    /// Withdraw a pending request (sender only)
    Cancel {
        relationship_id: i64,
        #[arg(long = "as", value_name = "USER")]
        acting: String,
    },
    /// End a friendship
    Remove { user: String, friend: String },
    /// List accepted friends
    List { user: String },
    /// List pending requests, incoming and outgoing
    Pending { user: String },
    /// People the user may know
    Suggest {
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum MeetingCommand {
    /// Create a meeting
    Create {
        #[arg(long = "as", value_name = "USER")]
        creator: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Start time (RFC 3339)
        #[arg(long, value_parser = parse_time)]
        starts: DateTime<Utc>,
        /// End time (RFC 3339)
        #[arg(long, value_parser = parse_time)]
        ends: DateTime<Utc>,
        /// Invitee as `id` or `id:status` (repeatable)
        #[arg(long, value_parser = parse_participant)]
        invite: Vec<Participant>,
    },
    /// Show a meeting and its participants
    Show { meeting_id: i64 },
    /// Replace the participant set (organizer only)
    Reconcile {
        meeting_id: i64,
        #[arg(long = "as", value_name = "USER")]
        organizer: String,
        /// Desired participants as `id` or `id:status`
        #[arg(value_parser = parse_participant)]
        participants: Vec<Participant>,
    },
    /// Answer an invitation
    Respond {
        meeting_id: i64,
        #[arg(long = "as", value_name = "USER")]
        contact: String,
        /// accepted or declined
        #[arg(value_parser = parse_status)]
        status: ParticipantStatus,
    },
    /// Delete a meeting (organizer only)
    Delete {
        meeting_id: i64,
        #[arg(long = "as", value_name = "USER")]
        acting: String,
    },
    /// List meetings a contact participates in
    List { contact: String },
}

fn init_tracing(config: &HuddleConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.logging.filter.as_deref().unwrap_or("warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match cli.data_dir {
        Some(dir) => HuddlePaths::from_base(dir),
        None => HuddlePaths::from_env(),
    };
    let config = HuddleConfig::load(&paths.config_path)?;
    init_tracing(&config);

    let core = Core::init(&paths, &config).await?;
    let json = cli.json;

    match cli.command {
        Commands::Identity { command } => match command {
            IdentityCommand::Add {
                id,
                first_name,
                email,
                last_name,
            } => commands::identity::add(&core, id, first_name, last_name, email, json).await,
            IdentityCommand::Search { term, limit } => {
                commands::identity::search(&core, &term, limit, json).await
            }
        },
        Commands::Friend { command } => match command {
            FriendCommand::Send { from, to } => commands::friend::send(&core, &from, &to, json).await,
            FriendCommand::Accept {
                relationship_id,
                acting,
            } => commands::friend::accept(&core, relationship_id, &acting, json).await,
            FriendCommand::Decline {
                relationship_id,
                acting,
            } => commands::friend::decline(&core, relationship_id, &acting, json).await,
            FriendCommand::Cancel {
                relationship_id,
                acting,
            } => commands::friend::cancel(&core, relationship_id, &acting, json).await,
            FriendCommand::Remove { user, friend } => {
                commands::friend::remove(&core, &user, &friend, json).await
            }
            FriendCommand::List { user } => commands::friend::list(&core, &user, json).await,
            FriendCommand::Pending { user } => commands::friend::pending(&core, &user, json).await,
            FriendCommand::Suggest { user, limit } => {
                commands::friend::suggest(&core, &user, limit, json).await
            }
        },
        Commands::Meeting { command } => match command {
            MeetingCommand::Create {
                creator,
                title,
                description,
                starts,
                ends,
                invite,
            } => {
                let args = commands::meeting::CreateArgs {
                    creator,
                    title,
                    description,
                    starts_at: starts,
                    ends_at: ends,
                    invite,
                };
                commands::meeting::create(&core, args, json).await
            }
            MeetingCommand::Show { meeting_id } => {
                commands::meeting::show(&core, meeting_id, json).await
            }
            MeetingCommand::Reconcile {
                meeting_id,
                organizer,
                participants,
            } => {
                commands::meeting::reconcile(&core, meeting_id, &organizer, participants, json)
                    .await
            }
            MeetingCommand::Respond {
                meeting_id,
                contact,
                status,
            } => commands::meeting::respond(&core, meeting_id, &contact, status, json).await,
            MeetingCommand::Delete { meeting_id, acting } => {
                commands::meeting::delete(&core, meeting_id, &acting, json).await
            }
            MeetingCommand::List { contact } => {
                commands::meeting::list(&core, &contact, json).await
            }
        },
        Commands::Status => commands::status::run(&core, &paths, json).await,
    }
}
