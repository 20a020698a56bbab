use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wspdriver::logging::init_logging;
use wspdriver::{selectors, ChromeBrowser, Config, Session};

const DEFAULT_CONFIG_PATH: &str = "wspdriver.json";
const PAUSE_STEP: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "wspdriver")]
#[command(about = "Drive a WhatsApp Web session from the command line", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the login QR code and wait until it is scanned
    Login {
        /// Where to write the QR code image
        #[arg(short, long, default_value = "login.png")]
        output: PathBuf,

        /// Give up after this many seconds (waits forever if omitted)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Show the logged-in account and save its avatar
    Whoami {
        /// Where to write the avatar image
        #[arg(long, default_value = "avatar.png")]
        avatar: PathBuf,
    },

    /// Print messages not shown before
    Unread {
        /// Keep polling every N seconds until Ctrl-C
        #[arg(short, long)]
        watch: Option<u64>,

        /// Print one JSON object per message
        #[arg(long)]
        json: bool,
    },

    /// Send a text message to a contact
    Send {
        /// Phone number or name typed into the chat search
        contact: String,

        /// Message text
        text: String,
    },

    /// Save a screenshot of the current page
    Screenshot {
        /// Output PNG path
        output: PathBuf,
    },

    /// Print the web client version fingerprint
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    if cli.headed {
        config.browser.headless = false;
    }
    let _log_guard = init_logging(&config.log).context("failed to init logging")?;

    let session = wspdriver::start(&config).context("failed to start browser session")?;
    watch_ctrl_c(session.cancellation_token());

    let result = run(&session, cli.command);
    if let Err(err) = session.quit() {
        warn!("failed to close browser: {err}");
    }
    result
}

fn run(session: &Session<ChromeBrowser>, command: Commands) -> Result<()> {
    match command {
        Commands::Login { output, timeout } => login(session, &output, timeout),
        Commands::Whoami { avatar } => whoami(session, &avatar),
        Commands::Unread { watch, json } => unread(session, watch, json),
        Commands::Send { contact, text } => {
            session
                .send_message(&contact, &text)
                .with_context(|| format!("failed to send message to {contact}"))?;
            println!("sent");
            Ok(())
        }
        Commands::Screenshot { output } => {
            session
                .save_screenshot(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("{}", output.display());
            Ok(())
        }
        Commands::Version => {
            println!("wspdriver {}", env!("CARGO_PKG_VERSION"));
            println!("markup revision {}", selectors::MARKUP_REVISION);
            println!("web client {}", session.web_client_version());
            Ok(())
        }
    }
}

fn login(session: &Session<ChromeBrowser>, output: &Path, timeout: Option<u64>) -> Result<()> {
    if session.is_logged_in()? {
        println!("already logged in");
        return Ok(());
    }
    session
        .save_login_as_image(output)
        .context("failed to save login code")?;
    println!("scan the code saved at {}", output.display());
    session.wait_for_login(timeout.map(Duration::from_secs))?;
    println!("logged in");
    Ok(())
}

fn whoami(session: &Session<ChromeBrowser>, avatar: &Path) -> Result<()> {
    let user = session.get_user_data().context("failed to read profile")?;
    user.save_avatar(avatar)
        .with_context(|| format!("failed to write {}", avatar.display()))?;
    println!("name:   {}", user.name());
    println!("phone:  {}", user.phone_number());
    println!("avatar: {}", avatar.display());
    Ok(())
}

fn unread(session: &Session<ChromeBrowser>, watch: Option<u64>, json: bool) -> Result<()> {
    loop {
        for message in session.get_unread_messages()? {
            let message = message?;
            if json {
                println!("{}", serde_json::to_string(&message)?);
            } else {
                println!("{message}");
            }
        }
        let Some(seconds) = watch else {
            return Ok(());
        };
        if !pause(session, Duration::from_secs(seconds)) {
            info!("stopped watching");
            return Ok(());
        }
    }
}

/// Sleeps for `interval` unless the session is stopped first. Returns false
/// when stopped.
fn pause(session: &Session<ChromeBrowser>, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    while Instant::now() < deadline {
        if !session.is_running() {
            return false;
        }
        thread::sleep(PAUSE_STEP);
    }
    session.is_running()
}

fn watch_ctrl_c(token: CancellationToken) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!("ctrl-c handler unavailable: {err}");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, stopping");
                token.cancel();
            }
        });
    });
}
