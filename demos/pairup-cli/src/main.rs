//! Terminal client for Pairup: run an instructor console or follow a
//! session as a student.

use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use pairup::prelude::*;
use pairup_protocol::PairingEntry;
use pairup_transport::WebSocketConnector;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pairup-cli")]
#[command(about = "Classroom speed-pairing from the terminal", long_about = None)]
struct Cli {
    /// Session service base URL. Overrides PAIRUP_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open or resume a session and drive it from stdin
    Instructor {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Create the account instead of signing in
        #[arg(long)]
        register: bool,
    },
    /// Join or resume a session and print what the student sees
    Student {
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
}

const HELP: &str = "commands: start [topic] | discuss | next | reset | pause | resume | \
add NAME | remove ID | topics | participate on|off | end | logout";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    let config = config.validated();

    let result = match cli.command {
        Command::Instructor {
            email,
            password,
            register,
        } => run_instructor(&config, email, password, register).await,
        Command::Student { keyword, name } => run_student(&config, keyword, name).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error ({:?}): {e}", e.kind());
            ExitCode::FAILURE
        }
    }
}

// ---------------------------------------------------------------------------
// Instructor
// ---------------------------------------------------------------------------

async fn run_instructor(
    config: &ClientConfig,
    email: Option<String>,
    password: Option<String>,
    register: bool,
) -> Result<(), PairupError> {
    let mut instructor = match recover(config, Utc::now()).await? {
        Recovered::Instructor(handle) => {
            println!("resuming as {}", handle.principal);
            InstructorClient::from_handle(config, handle)?
        }
        _ => {
            let (Some(email), Some(password)) = (email, password) else {
                eprintln!("not signed in: pass --email and --password");
                return Ok(());
            };
            if register {
                InstructorClient::register(config, &email, &password).await?
            } else {
                InstructorClient::login(config, &email, &password).await?
            }
        }
    };

    let session = instructor.open_session().await?;
    println!("session keyword: {}", session.keyword());
    println!("{HELP}");

    let printer = tokio::spawn(print_snapshots(session.console().subscribe()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else { continue };
        let rest = words.collect::<Vec<_>>().join(" ");
        let console = session.console();

        let outcome = match command {
            "start" => console.start((!rest.is_empty()).then_some(rest)).await,
            "discuss" => console.begin_discussion().await,
            "next" => console.next_round().await,
            "reset" => console.reset_round().await,
            "pause" => console.pause().await,
            "resume" => console.resume().await,
            "add" => console.add_student(rest).await.map(|student| {
                println!("added {} (#{})", student.name, student.id);
            }),
            "remove" => match rest.parse::<u64>() {
                Ok(id) => console.remove_student(ParticipantId(id)).await,
                Err(_) => {
                    println!("usage: remove ID");
                    Ok(())
                }
            },
            "topics" => {
                for topic in instructor.topics().await {
                    println!("  {:<12} {}", topic.value, topic.label);
                }
                Ok(())
            }
            "participate" => console.set_participating(rest == "on").await,
            "end" => match instructor.end_session(&session).await {
                Ok(()) => {
                    println!("session ended");
                    break;
                }
                Err(e) => {
                    println!("! {e}");
                    Ok(())
                }
            },
            "logout" => {
                session.close().await;
                printer.abort();
                instructor.logout()?;
                println!("signed out");
                return Ok(());
            }
            _ => {
                println!("{HELP}");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            println!("! {e}");
        }
    }

    printer.abort();
    Ok(())
}

async fn print_snapshots(mut snapshots: tokio::sync::watch::Receiver<ConsoleSnapshot>) {
    let mut last = String::new();
    loop {
        let line = render(&snapshots.borrow_and_update());
        if line != last {
            println!("{line}");
            last = line;
        }
        if snapshots.changed().await.is_err() {
            return;
        }
    }
}

fn render(snapshot: &ConsoleSnapshot) -> String {
    let timer = if snapshot.timer.paused {
        format!("{}s paused", snapshot.timer.remaining_seconds)
    } else if snapshot.timer.running {
        format!("{}s", snapshot.timer.remaining_seconds)
    } else {
        "-".to_string()
    };
    let mut line = format!(
        "[{}] round {} | {} | {} students",
        snapshot.phase,
        snapshot.round_number,
        timer,
        snapshot.roster.len()
    );
    if let Some(pairing) = &snapshot.pairing {
        for entry in pairing.entries() {
            match entry {
                PairingEntry::Pair { leader, talker, .. } => {
                    line.push_str(&format!("\n  {} leads {}", leader.name, talker.name));
                }
                PairingEntry::Break { participant, .. } => {
                    line.push_str(&format!("\n  {} on break", participant.name));
                }
            }
        }
    }
    if let Some(error) = &snapshot.last_error {
        line.push_str(&format!("\n  ! {error}"));
    }
    line
}

// ---------------------------------------------------------------------------
// Student
// ---------------------------------------------------------------------------

async fn run_student(
    config: &ClientConfig,
    keyword: Option<String>,
    name: Option<String>,
) -> Result<(), PairupError> {
    let client = match recover(config, Utc::now()).await? {
        Recovered::Student(handle) => {
            println!("resuming as {}", handle.principal);
            let connector = WebSocketConnector::new(config.realtime_url()?);
            StudentClient::resume(config, connector, handle)?
        }
        recovered => {
            if matches!(recovered, Recovered::Instructor(_)) {
                warn!("an instructor login is stored here; joining replaces it");
            }
            let (Some(keyword), Some(name)) = (keyword, name) else {
                eprintln!("not in a session: pass --keyword and --name");
                return Ok(());
            };
            StudentClient::connect(config, &keyword, &name).await?
        }
    };
    println!("joined {} as {}. type `leave` to leave", client.keyword(), client.username());

    let mut state = client.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                if let Some(reason) = current.exit {
                    match reason {
                        ExitReason::Removed { reason } => println!("you were {reason}"),
                        ExitReason::SessionEnded => println!("the session has ended"),
                    }
                    return Ok(());
                }
                println!("{}", describe(&current.view));
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim() == "leave" => break,
                Ok(Some(_)) => println!("type `leave` to leave"),
                Ok(None) | Err(_) => break,
            },
        }
    }

    client.leave().await?;
    println!("left the session");
    Ok(())
}

fn describe(view: &StudentView) -> String {
    let partner = view.partner.as_deref().unwrap_or("?");
    match view.phase {
        DisplayPhase::Waiting => "waiting for the next round".to_string(),
        DisplayPhase::Break => "you are on break this round".to_string(),
        DisplayPhase::Paired => match view.role {
            Some(PairRole::Leader) => format!("paired with {partner}: you will lead"),
            _ => format!("paired with {partner}: you will talk"),
        },
        DisplayPhase::Discussing => match (&view.role, &view.prompt) {
            (Some(PairRole::Leader), Some(prompt)) => {
                format!("discuss with {partner}. ask: {prompt}")
            }
            _ => format!("discuss with {partner}. {partner} asks the question"),
        },
    }
}
