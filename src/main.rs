//! Guestbook: a terminal client for guestbook message boards.
//!
//! This is the application entry point. It loads configuration, initializes
//! tracing, builds the API client and templates, and then either runs a single
//! command or an interactive session that polls for new messages.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guestbook::api::HttpApi;
use guestbook::board::{Id, MessageDraft, ReplyDraft, SortMode};
use guestbook::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use guestbook::controller::{parse_command, Controller, Intent, Notice, RefreshOrigin, COMMAND_HELP};
use guestbook::poller::{shutdown_signal, spawn_poller, unless_stopped};
use guestbook::profile::ProfileStore;
use guestbook::state::AppState;
use guestbook::templates::init_templates;

/// Guestbook: browse and post to a guestbook from the terminal
#[derive(Parser, Debug)]
#[command(name = "guestbook", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "guestbook=debug")
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List messages
    List {
        /// Only show messages whose name, content or email contain this text
        #[arg(long)]
        search: Option<String>,
        /// newest or oldest
        #[arg(long, default_value = "newest")]
        sort: SortMode,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show a message and its replies
    Show { id: Id },
    /// Post a new message
    Post {
        #[arg(long)]
        content: String,
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        #[arg(long)]
        video: Option<PathBuf>,
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Reply to a message, or to one of its replies with --parent
    Reply {
        message_id: Id,
        #[arg(long)]
        content: String,
        #[arg(long)]
        parent: Option<Id>,
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        video: Option<PathBuf>,
    },
    /// Show or set the name and email used for posting
    Profile {
        #[arg(long, requires = "email")]
        name: Option<String>,
        #[arg(long, requires = "name")]
        email: Option<String>,
    },
    /// Interactive session with background refresh
    Watch,
}

fn load_config(path: &str) -> Result<AppConfig, guestbook::config::ConfigError> {
    if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
        return Ok(AppConfig::default());
    }
    AppConfig::load(path)
}

fn init_tracing(log_level: Option<String>, json: bool) {
    // Priority: CLI > env > default
    let log_filter = log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_filter))
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Print notices to stderr; returns whether any of them was an error.
fn report(notices: &[Notice]) -> bool {
    for notice in notices {
        eprintln!("{}", notice);
    }
    notices.iter().any(|n| matches!(n, Notice::Error(_)))
}

fn print_view(controller: &Controller) {
    match controller.render() {
        Ok(view) => println!("{}", view),
        Err(e) => eprintln!("Error: {}", e.user_message()),
    }
}

/// Run intents in order, stopping at the first one that reports an error.
async fn run_all(controller: &mut Controller, intents: Vec<Intent>) -> bool {
    for intent in intents {
        if report(&controller.dispatch(intent).await) {
            return false;
        }
    }
    true
}

async fn watch(controller: &mut Controller, interval: Duration) {
    let (sender, receiver) = async_channel::unbounded::<Intent>();
    let poller = spawn_poller(interval, sender.clone());

    // Blocking reads on a plain thread so a pending read never holds up shutdown
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read from stdin");
                    break;
                }
            };
            match parse_command(&line) {
                Ok(Some(intent)) => {
                    let quit = intent == Intent::Quit;
                    if sender.send_blocking(intent).is_err() || quit {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{}", e.user_message()),
            }
        }
        let _ = sender.send_blocking(Intent::Quit);
    });

    let stop = shutdown_signal();
    tokio::pin!(stop);

    let initial = Intent::Refresh {
        origin: RefreshOrigin::User,
    };
    match unless_stopped(controller.dispatch(initial), &mut stop).await {
        Some(notices) => {
            report(&notices);
            print_view(controller);
            eprintln!("{}", COMMAND_HELP);
        }
        None => return finish(receiver, poller),
    }

    loop {
        let intent = tokio::select! {
            received = receiver.recv() => match received {
                Ok(Intent::Quit) | Err(_) => break,
                Ok(intent) => intent,
            },
            _ = &mut stop => break,
        };

        // Input keeps queueing while a request is pending; shutdown cuts it short
        match unless_stopped(controller.dispatch(intent), &mut stop).await {
            Some(notices) => {
                report(&notices);
                print_view(controller);
            }
            None => break,
        }
    }

    finish(receiver, poller);
}

fn finish(receiver: async_channel::Receiver<Intent>, poller: tokio::task::JoinHandle<()>) {
    receiver.close();
    poller.abort();
    tracing::info!("Session ended");
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_tracing(args.log_level, config.logging.is_json());
    tracing::info!(base_url = %config.api.base_url, "Loaded configuration");

    let tera = init_templates()?;
    let api = Arc::new(HttpApi::new(&config.api)?);
    let profiles = ProfileStore::new(config.profile.path.clone());
    let poll_interval = Duration::from_secs(config.polling.interval_seconds);

    let state = AppState::new(config, tera, api);
    let mut controller = Controller::new(state, profiles)?;

    let ok = match args.command {
        Command::List { search, sort, page } => {
            let mut intents = vec![
                Intent::Refresh {
                    origin: RefreshOrigin::User,
                },
                Intent::SetSort(sort),
            ];
            if let Some(query) = search {
                intents.push(Intent::Search(query));
            }
            if page != 1 {
                intents.push(Intent::GoToPage(page));
            }
            let ok = run_all(&mut controller, intents).await;
            if ok {
                print_view(&controller);
            }
            ok
        }
        Command::Show { id } => {
            let ok = run_all(&mut controller, vec![Intent::OpenMessage(id)]).await;
            if ok {
                print_view(&controller);
            }
            ok
        }
        Command::Post {
            content,
            images,
            video,
            files,
        } => {
            let draft = MessageDraft {
                content,
                images,
                video,
                files,
            };
            run_all(&mut controller, vec![Intent::PostMessage(draft)]).await
        }
        Command::Reply {
            message_id,
            content,
            parent,
            image,
            video,
        } => {
            // --parent always names a reply, never the message itself
            let target = match parent {
                Some(reply_id) => Intent::ReplyRequested(reply_id),
                None => Intent::ReplyToMessage,
            };
            let draft = ReplyDraft {
                content,
                image,
                video,
            };
            let ok = run_all(
                &mut controller,
                vec![
                    Intent::OpenMessage(message_id),
                    target,
                    Intent::SubmitReply(draft),
                ],
            )
            .await;
            if ok {
                print_view(&controller);
            }
            ok
        }
        Command::Profile { name, email } => match (name, email) {
            (Some(name), Some(email)) => {
                run_all(&mut controller, vec![Intent::EditProfile { name, email }]).await
            }
            _ => {
                match controller.profile() {
                    Some(profile) => println!("{} <{}>", profile.name, profile.email),
                    None => println!("No profile set"),
                }
                true
            }
        },
        Command::Watch => {
            watch(&mut controller, poll_interval).await;
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
