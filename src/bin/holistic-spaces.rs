use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use holistic_spaces::geo::{AddressSuggestions, DebouncedAddressSearch};
use holistic_spaces::prelude::*;
use holistic_spaces::tracking::{LocationTracker, TrackOutcome};
use holistic_spaces::services::{
    referral_link, AdminService, EventService, ProfileService, ReferralService, SignupRequest, SignupService,
    SpaceBoard, SpaceFilters,
};

#[derive(Parser, Debug)]
#[clap(name = "holistic-spaces", version)]
#[clap(about = "Command line client for the Holistic Spaces community backend", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Output debug logs to stderr
    #[clap(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Great-circle distance in km between two points
    Distance {
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    },
    /// Show how an invite code is stored
    NormalizeInvite { code: String },
    /// Look up an address
    Geocode { query: String },
    /// Name the address at a position
    Reverse { lat: f64, lon: f64 },
    /// Type addresses line by line and get suggestions once typing pauses
    Suggest,
    /// Sign in and keep the session
    Login {
        email: String,
        /// Falls back to HOLISTIC_PASSWORD
        #[clap(long)]
        password: Option<String>,
    },
    /// Sign out and forget the session
    Logout,
    /// Create an account with an invite code
    Signup {
        #[clap(long)]
        email: String,
        #[clap(long)]
        password: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        invite: String,
    },
    /// List spaces
    Spaces {
        /// Free text filter
        #[clap(long)]
        search: Option<String>,
        /// Only spaces near LAT,LON
        #[clap(long, value_parser = parse_point)]
        near: Option<Coordinates>,
        #[clap(long, default_value_t = 25.0)]
        radius_km: f64,
    },
    /// Join a space
    Join { space_id: Uuid },
    /// Leave a space
    Leave { space_id: Uuid },
    /// List upcoming events
    Events,
    /// Register for an event
    Register { event_id: Uuid },
    /// List invite codes (administrators)
    Invites {
        /// Create a new code expiring after this many days
        #[clap(long)]
        create: Option<i64>,
    },
    /// Show your referral link and how many people joined through it
    Referrals,
    /// Upload a profile picture
    Avatar { file: std::path::PathBuf },
    /// Record a GPS fix against your known places
    Track {
        #[clap(value_parser = parse_point)]
        position: Coordinates,
    },
}

fn parse_point(raw: &str) -> std::result::Result<Coordinates, String> {
    let (lat, lon) = raw.split_once(',').ok_or("expected LAT,LON")?;
    let lat = lat.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let lon = lon.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let point = Coordinates::new(lat, lon);
    if !point.is_valid() {
        return Err("coordinates out of range".to_string());
    }
    Ok(point)
}

fn print_suggestions(batch: &AddressSuggestions) {
    match &batch.results {
        Ok(results) if results.is_empty() => println!("{}: no matches", batch.query),
        Ok(results) => {
            println!("{}:", batch.query);
            for address in results {
                println!("  {}", address.display_name);
            }
        }
        Err(message) => println!("{}: {}", batch.query, message),
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "holistic_spaces=debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    // Commands that work offline
    match &cli.command {
        Commands::Distance { lat1, lon1, lat2, lon2 } => {
            let km = haversine_km(Coordinates::new(*lat1, *lon1), Coordinates::new(*lat2, *lon2));
            println!("{:.3} km", km);
            return Ok(());
        }
        Commands::NormalizeInvite { code } => {
            println!("{}", normalize_invite_code(code));
            return Ok(());
        }
        _ => {}
    }

    let backend = Backend::from_env().context("failed to configure backend")?;
    let store = SupabaseStore::new(backend.clone());

    match cli.command {
        Commands::Distance { .. } | Commands::NormalizeInvite { .. } => {}
        Commands::Geocode { query } => {
            let results = backend.geocoder().search(&query).await?;
            if results.is_empty() {
                println!("No results");
            }
            for address in results {
                println!(
                    "{:.6},{:.6}  {}",
                    address.coordinates.latitude, address.coordinates.longitude, address.display_name
                );
            }
        }
        Commands::Reverse { lat, lon } => {
            match backend.geocoder().reverse(Coordinates::new(lat, lon)).await? {
                Some(address) => println!("{}", address.display_name),
                None => println!("No address at this position"),
            }
        }
        Commands::Suggest => {
            let (search, mut suggestions) =
                DebouncedAddressSearch::spawn(Arc::new(backend.geocoder()), backend.options().search_debounce);
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut pending: Option<String> = None;
            loop {
                tokio::select! {
                    line = lines.next_line() => match line? {
                        Some(line) => {
                            search.input(&line);
                            pending = Some(line);
                        }
                        None => break,
                    },
                    Some(batch) = suggestions.recv() => {
                        if pending.as_deref() == Some(batch.query.as_str()) {
                            pending = None;
                        }
                        print_suggestions(&batch);
                    }
                }
            }
            if pending.is_some() {
                if let Ok(Some(batch)) = tokio::time::timeout(Duration::from_secs(10), suggestions.recv()).await {
                    print_suggestions(&batch);
                }
            }
        }
        Commands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => std::env::var("HOLISTIC_PASSWORD").context("no --password and HOLISTIC_PASSWORD not set")?,
            };
            let session = backend.auth().sign_in(&email, &password).await?;
            println!("Signed in as {}", session.user_id()?);
        }
        Commands::Logout => {
            backend.auth().sign_out().await?;
            println!("Signed out");
        }
        Commands::Signup { email, password, name, invite } => {
            let store = Arc::new(store);
            let signup = SignupService::new(backend.auth().clone(), store.clone(), store.clone(), store);
            let outcome = signup
                .sign_up(&SignupRequest {
                    email,
                    password,
                    full_name: name,
                    invite_code: invite,
                })
                .await?;
            match outcome.session {
                Some(_) => println!("Welcome! Account {} is ready", outcome.user_id),
                None => println!("Check your inbox to confirm account {}", outcome.user_id),
            }
        }
        Commands::Spaces { search, near, radius_km } => {
            let board = space_board(&backend, store)?;
            board.set_viewer_location(near);
            board.refresh().await?;
            let filters = SpaceFilters {
                search,
                near: near.map(|point| (point, radius_km)),
                ..Default::default()
            };
            for listing in board.filtered(&filters).await {
                let space = &listing.space;
                let seats = match space.capacity {
                    Some(capacity) => format!("{}/{}", listing.attendee_count, capacity),
                    None => listing.attendee_count.to_string(),
                };
                println!(
                    "{}  {}  [{}] {} {}{}",
                    space.id,
                    space.start_time.format("%Y-%m-%d %H:%M"),
                    space.status,
                    space.title,
                    seats,
                    if listing.is_member { " (joined)" } else { "" }
                );
            }
        }
        Commands::Join { space_id } => {
            let board = space_board(&backend, store)?;
            board.refresh().await?;
            board.join(space_id).await?;
            println!("Joined {}", space_id);
        }
        Commands::Leave { space_id } => {
            let board = space_board(&backend, store)?;
            board.refresh().await?;
            board.leave(space_id).await?;
            println!("Left {}", space_id);
        }
        Commands::Events => {
            let store = Arc::new(store);
            let events = EventService::new(store.clone(), store, Arc::new(backend.clone()));
            for event in events.upcoming(Utc::now()).await? {
                println!(
                    "{}  {}  {}{}",
                    event.id,
                    event.start_time.format("%Y-%m-%d %H:%M"),
                    event.title,
                    if event.requires_agreement { " (agreement required)" } else { "" }
                );
            }
        }
        Commands::Register { event_id } => {
            let user_id = backend.auth().current_user_id()?;
            let store = Arc::new(store);
            let events = EventService::new(store.clone(), store, Arc::new(backend.clone()));
            let registration = events.register(event_id, user_id).await?;
            println!("Registration {} is pending approval", registration.id);
        }
        Commands::Invites { create } => {
            let user_id = backend.auth().current_user_id()?;
            let store = Arc::new(store);
            let admin = AdminService::new(store.clone(), store.clone(), store, user_id);
            if let Some(days) = create {
                let code = admin.create_invite_code(Some(days)).await?;
                println!("Created {}", code.display_code());
            }
            for view in admin.list_invite_codes().await? {
                let state = if view.used {
                    "used"
                } else if view.expired {
                    "expired"
                } else {
                    "available"
                };
                println!("{}  {}", view.display, state);
            }
        }
        Commands::Referrals => {
            let user_id = backend.auth().current_user_id()?;
            let store = Arc::new(store);
            let referrals = ReferralService::new(store.clone(), store.clone(), store, user_id);
            let code = referrals.my_invite_code().await?;
            println!("{}", referral_link(&backend.options().site_url, &code.code));
            let stats = referrals.stats().await?;
            println!("{} people joined through your invites", stats.count);
            for name in stats.names() {
                println!("  {}", name);
            }
        }
        Commands::Avatar { file } => {
            let user_id = backend.auth().current_user_id()?;
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .context("file name is not valid UTF-8")?;
            let profiles = ProfileService::new(Arc::new(store), Arc::new(backend.geocoder()), user_id);
            let storage = backend.fresh_storage().await?;
            let profile = profiles.upload_avatar(&storage, file_name, data).await?;
            println!("Avatar set: {}", profile.avatar_url.unwrap_or_default());
        }
        Commands::Track { position } => {
            let user_id = backend.auth().current_user_id()?;
            let tracker = LocationTracker::new(Arc::new(store), user_id);
            match tracker.record_position(position).await? {
                TrackOutcome::Existing(place) => println!(
                    "Back at {} (visit {})",
                    place.name.as_deref().unwrap_or("a known place"),
                    place.visit_count
                ),
                TrackOutcome::Created(place) => println!("New place recorded: {}", place.id),
            }
        }
    }

    Ok(())
}

fn space_board(backend: &Backend, store: SupabaseStore) -> anyhow::Result<SpaceBoard> {
    let user_id = backend.auth().current_user_id().context("sign in first")?;
    let store = Arc::new(store);
    Ok(SpaceBoard::new(store.clone(), store, user_id, backend.options().refetch_delay))
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
