//! Breakdown Buddy - terminal front end for the roadside-assistance API
//!
//! Each subcommand maps onto one client operation. Output goes to stdout,
//! logs go to `~/.breakdown-buddy/breakdown-buddy.log`.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

use breakdown_buddy::config::{config_dir, Config};
use breakdown_buddy::constants::{APP_NAME, APP_VERSION, LOG_FILE};
use breakdown_buddy::models::{MechanicProfile, ProfileUpdate};
use breakdown_buddy::notifications::{badge_applies, DashboardStats};
use breakdown_buddy::{
    ApiClient, ApiError, AuthManager, BreakdownRequest, Credentials, IssueType, Message,
    NewBreakdownRequest, NewMessage, Registration, RequestStatus, Role, Session, User,
};

#[derive(Parser)]
#[command(name = "breakdown-buddy", version = APP_VERSION, about = "Roadside assistance for truck owners and mechanics")]
struct Cli {
    /// Config file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:5000/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session
    Login {
        username: String,
        #[arg(long, env = "BREAKDOWN_BUDDY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BREAKDOWN_BUDDY_PASSWORD", hide_env_values = true)]
        password: String,
        /// truck_owner or mechanic
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        business_name: Option<String>,
        #[arg(long)]
        business_type: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List breakdown requests
    Requests {
        /// Only requests you own or are assigned to
        #[arg(long)]
        mine: bool,
    },
    /// File a breakdown request
    Create {
        /// engine_failure, transmission, hydraulics, air_brakes, electrical,
        /// tire_blowout, fuel_system, trailer, pneumatics or other
        issue_type: IssueType,
        description: String,
        location: String,
        #[arg(long, requires = "longitude", allow_hyphen_values = true)]
        latitude: Option<f64>,
        #[arg(long, requires = "latitude", allow_hyphen_values = true)]
        longitude: Option<f64>,
    },
    /// Accept a pending request (mechanics)
    Accept { request_id: i64 },
    /// Move a request to a new status
    Status {
        request_id: i64,
        status: RequestStatus,
    },
    /// Show the chat for a request
    Messages {
        request_id: i64,
        /// Keep refreshing until Ctrl-C
        #[arg(long)]
        follow: bool,
    },
    /// Send a chat message
    Send { request_id: i64, text: String },
    /// List chat threads, newest first
    Inbox,
    /// Show notifications
    Notifications {
        /// Keep refreshing the unread badge until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Register a device push token
    PushToken {
        token: String,
        #[arg(long, default_value = std::env::consts::OS)]
        platform: String,
    },
    /// Request and notification counters
    Dashboard,
    /// Edit your profile
    Profile {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        business_name: Option<String>,
    },
    /// Save mechanic service settings
    MechanicSettings {
        #[arg(long = "region", required = true)]
        regions: Vec<String>,
        #[arg(long = "specialty")]
        specialties: Vec<String>,
        #[arg(long, default_value_t = 50)]
        radius: u32,
        #[arg(long)]
        unavailable: bool,
        #[arg(long)]
        local_only: bool,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    match s {
        "truck_owner" | "owner" => Ok(Role::TruckOwner),
        "mechanic" => Ok(Role::Mechanic),
        other => Err(format!("unknown role '{other}', expected truck_owner or mechanic")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(config_dir(), LOG_FILE);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let config = load_config(&cli)?;
    tracing::info!(api = %config.api_base(), "{} {} starting", APP_NAME, APP_VERSION);

    let session = Session::file(&config.session_path);
    let client = ApiClient::new(&config, session).context("Failed to create API client")?;
    let mut auth = AuthManager::new(client);

    run(cli.command, &config, &mut auth).await
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config =
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    config.apply_env()?;
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Turn a client failure into the alert a screen would show
fn alert(action: &'static str) -> impl FnOnce(ApiError) -> anyhow::Error {
    move |e| {
        let message = e.user_message(action);
        anyhow::Error::new(e).context(message)
    }
}

async fn signed_in(auth: &mut AuthManager) -> anyhow::Result<User> {
    if !auth.restore().await.map_err(alert("check your session"))? {
        bail!("Not signed in. Run `breakdown-buddy login` first.");
    }
    auth.user()
        .cloned()
        .context("Session restored without a user")
}

async fn run(command: Command, config: &Config, auth: &mut AuthManager) -> anyhow::Result<()> {
    match command {
        Command::Login { username, password } => {
            let user = auth
                .authenticate(&Credentials::new(username, password))
                .await
                .map_err(alert("log in"))?;
            println!("Signed in as {} (id {})", display_name(&user), user.id);
        }

        Command::Register {
            username,
            email,
            password,
            role,
            full_name,
            phone,
            business_name,
            business_type,
        } => {
            let registration = Registration {
                username,
                email,
                password,
                role,
                full_name,
                phone,
                business_name,
                business_type,
            };
            let user = auth
                .register(&registration)
                .await
                .map_err(alert("create your account"))?;
            println!("Welcome, {} (id {})", display_name(&user), user.id);
        }

        Command::Logout => {
            auth.logout().map_err(alert("log out"))?;
            println!("Signed out");
        }

        Command::Whoami => {
            let user = signed_in(auth).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }

        Command::Requests { mine } => {
            let user = signed_in(auth).await?;
            let client = auth.client();
            let requests = match (mine, user.is_mechanic()) {
                (true, true) => client.mechanic_requests(user.id).await,
                (true, false) | (false, false) => client.owner_requests(user.id).await,
                (false, true) => client.requests_for(&user).await,
            }
            .map_err(alert("load requests"))?;

            if requests.is_empty() {
                println!("No requests");
            }
            for request in &requests {
                print_request(request);
            }
        }

        Command::Create {
            issue_type,
            description,
            location,
            latitude,
            longitude,
        } => {
            let user = signed_in(auth).await?;
            let mut request = NewBreakdownRequest::new(user.id, issue_type, description, location);
            if let (Some(lat), Some(lon)) = (latitude, longitude) {
                request = request.with_coordinates(lat, lon);
            }
            let created = auth
                .client()
                .create_request(&request)
                .await
                .map_err(alert("submit your request"))?;
            println!("Request #{} submitted. Nearby mechanics will be notified.", created.id);
        }

        Command::Accept { request_id } => {
            let user = signed_in(auth).await?;
            if !user.is_mechanic() {
                bail!("Only mechanics can accept requests");
            }
            auth.client()
                .accept_request(request_id, user.id)
                .await
                .map_err(alert("accept request"))?;
            println!("Request #{request_id} accepted");
        }

        Command::Status { request_id, status } => {
            signed_in(auth).await?;
            auth.client()
                .update_request_status(request_id, &status)
                .await
                .map_err(alert("update status"))?;
            println!("Request status updated to {status}");
        }

        Command::Messages { request_id, follow } => {
            let user = signed_in(auth).await?;
            let client = auth.client();
            let request = find_request(client, &user, request_id).await?;

            if !follow {
                let messages = client
                    .messages(request_id)
                    .await
                    .map_err(alert("load messages"))?;
                for message in &messages {
                    print_message(request.as_ref(), &user, message);
                }
                return Ok(());
            }

            let mut seen = 0usize;
            let mut subscription =
                client.watch_messages(request_id, config.message_poll_interval());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    outcome = subscription.next() => match outcome {
                        Some(Ok(messages)) => {
                            for message in messages.iter().skip(seen) {
                                print_message(request.as_ref(), &user, message);
                            }
                            seen = messages.len();
                        }
                        // Logged by the watcher; keep polling
                        Some(Err(_)) => {}
                        None => break,
                    }
                }
            }
            subscription.cancel();
        }

        Command::Send { request_id, text } => {
            let user = signed_in(auth).await?;
            let client = auth.client();
            let request = find_request(client, &user, request_id)
                .await?
                .with_context(|| format!("Request #{request_id} not found"))?;

            client
                .send_message(&NewMessage::text(&request, &user, text))
                .await
                .map_err(alert("send message"))?;
            println!("Message sent");
        }

        Command::Inbox => {
            let user = signed_in(auth).await?;
            let inbox = auth
                .client()
                .inbox(&user)
                .await
                .map_err(alert("load conversations"))?;

            if inbox.is_empty() {
                println!("No conversations yet");
            }
            for conversation in &inbox {
                let unread = match conversation.unread {
                    0 => String::new(),
                    n => format!(" ({n} new)"),
                };
                let time = conversation
                    .last_message_at
                    .map(|t| t.format("%d %b %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "#{:<5} {:<22} {}{unread}",
                    conversation.request_id,
                    conversation.issue_type.label(),
                    conversation.other_label()
                );
                println!(
                    "       {:<12} {}",
                    time,
                    conversation.last_message.as_deref().unwrap_or("No messages yet")
                );
            }
        }

        Command::Notifications { watch } => {
            let user = signed_in(auth).await?;
            let client = auth.client();

            if !watch {
                let notifications = client
                    .notifications()
                    .await
                    .map_err(alert("load notifications"))?;
                for n in &notifications {
                    let marker = if n.is_read { " " } else { "*" };
                    println!(
                        "{marker} [{}] {}",
                        n.kind,
                        n.title.as_deref().or(n.body.as_deref()).unwrap_or("")
                    );
                }
                return Ok(());
            }

            if !badge_applies(&user) {
                println!("Unread requests: 0");
                return Ok(());
            }
            let mut subscription =
                client.watch_unread_requests(config.notification_poll_interval());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    outcome = subscription.next() => match outcome {
                        Some(Ok(count)) => println!("Unread requests: {count}"),
                        Some(Err(_)) => {}
                        None => break,
                    }
                }
            }
            subscription.cancel();
        }

        Command::PushToken { token, platform } => {
            let user = signed_in(auth).await?;
            auth.client()
                .register_push_token(&token, &platform)
                .await
                .map_err(alert("register for notifications"))?;
            println!("Push token registered for {} ({platform})", display_name(&user));
        }

        Command::Dashboard => {
            let user = signed_in(auth).await?;
            let client = auth.client();
            let requests = client
                .active_requests()
                .await
                .map_err(alert("load dashboard"))?;
            let notifications = client
                .notifications()
                .await
                .map_err(alert("load dashboard"))?;
            let stats = DashboardStats::from_parts(&requests, &notifications);

            println!("Hello, {}", display_name(&user));
            println!("  Active requests: {}", stats.active_requests);
            println!("  Completed jobs:  {}", stats.completed_jobs);
            println!("  Unread:          {}", stats.unread_messages);
        }

        Command::Profile {
            full_name,
            email,
            phone,
            location,
            business_name,
        } => {
            let user = signed_in(auth).await?;
            let update = ProfileUpdate {
                full_name,
                email,
                phone,
                location,
                business_name,
            };
            if update.is_empty() {
                println!("{}", serde_json::to_string_pretty(&user)?);
                return Ok(());
            }
            let updated = auth
                .client()
                .update_profile(&update)
                .await
                .map_err(alert("update profile"))?;
            println!("Profile updated for {}", display_name(&updated));
        }

        Command::MechanicSettings {
            regions,
            specialties,
            radius,
            unavailable,
            local_only,
        } => {
            let user = signed_in(auth).await?;
            if !user.is_mechanic() {
                bail!("Only mechanics have service settings");
            }
            let mut profile = MechanicProfile::for_user(&user).with_radius(radius);
            profile.service_regions = regions;
            profile.specialties = specialties;
            profile.is_available = !unavailable;
            profile.accept_outside_area_notifications = !local_only;

            auth.client()
                .save_mechanic_profile(&profile)
                .await
                .map_err(alert("update settings"))?;
            println!("Mechanic settings updated");
        }
    }

    Ok(())
}

/// Look up a request the way the chat screen does: owners search their own,
/// mechanics search the active list
async fn find_request(
    client: &ApiClient,
    user: &User,
    request_id: i64,
) -> anyhow::Result<Option<BreakdownRequest>> {
    let requests = if user.is_mechanic() {
        client.active_requests().await
    } else {
        client.owner_requests(user.id).await
    }
    .map_err(alert("load request"))?;
    Ok(requests.into_iter().find(|r| r.id == request_id))
}

fn display_name(user: &User) -> &str {
    user.full_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(&user.username)
}

fn print_request(request: &BreakdownRequest) {
    println!(
        "#{:<5} {:<12} {:<22} {}",
        request.id,
        request.status.as_str(),
        request.issue_type.label(),
        request.location
    );
}

fn print_message(request: Option<&BreakdownRequest>, user: &User, message: &Message) {
    let sender = if message.sender_id == user.id {
        "You"
    } else {
        request
            .map(|r| r.sender_label(message.sender_id))
            .unwrap_or("Unknown")
    };
    let time = message
        .created_at
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();
    println!("[{time:>5}] {sender}: {}", message.content);
}
