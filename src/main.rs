#![deny(dead_code)]
use anyhow::{anyhow, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::{env, io};

mod config;
mod ui;
mod utils;

use crate::{
    config::{load_config, save_config, AppConfig},
    ui::{ChatUI, UiAction},
};
use sochat::account::{
    self, load_profile, profile,
    verification::{complete_sign_in, start_phone_sign_in},
    AccountForm, NextStep, PickedImage, Route, SaveMode, VerificationForm,
};
use sochat::backend::{MemoryBackend, RealtimeStore, Services};
use sochat::chat::{presence, ChatScreen};
use sochat::models::{AuthUser, Profile, UserSummary};
use sochat::AuthSession;

/// Command line arguments for So Chat
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "So Chat: a terminal one-to-one chat client.",
    long_about = "So Chat signs in with a phone number, lets you set up your profile and then \
    opens a live chat with one peer.\n\n\
    The backend runs in-process; verification codes are printed to the terminal."
)]
struct Args {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Where to write the log
    #[arg(long, value_name = "PATH", default_value = "sochat.log")]
    log_file: PathBuf,

    /// Phone number to sign in with
    #[arg(long, value_name = "NUMBER")]
    phone: Option<String>,

    /// User id of the peer to chat with
    #[arg(long, value_name = "UID")]
    peer: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.config {
        config::set_config_path_override(path.clone());
    }
    let mut app_config = load_config()?;

    utils::setup_logging(Some(&args.log_file), app_config.log_level())?;
    info!("So Chat starting up");
    info!("Logging to file: {}", args.log_file.display());

    let backend = MemoryBackend::new(&app_config.storage_bucket);
    seed_accounts(&backend, &app_config).await?;
    let services = backend.services();

    // A fresh in-process backend always starts signed out; the other routes
    // apply to backends that keep their session between runs.
    let session = match account::initial_route(services.auth.as_ref()) {
        Route::Home(session) => {
            presence::mark_online(services.store.as_ref(), &session).await?;
            session
        }
        Route::AccountInformation(session) => run_account_setup(&services, session, &app_config).await?,
        Route::SignIn => {
            let session = run_phone_sign_in(&backend, &mut app_config, args.phone.as_deref()).await?;
            match complete_sign_in(&services, &session).await? {
                NextStep::SignedIn => session,
                NextStep::AccountInformation => run_account_setup(&services, session, &app_config).await?,
            }
        }
    };

    let peer = pick_peer(&services, &session, &app_config, args.peer.as_deref()).await?;
    let chat = ChatScreen::open(services.store.clone(), session.clone(), peer)?;

    let mut terminal = ui::setup_terminal()?;
    let mut chat_ui = ChatUI::new();
    let outcome = run_main_loop(&mut chat_ui, &mut terminal, chat).await;
    ui::restore_terminal(terminal)?;

    match outcome? {
        UiAction::SignOut => {
            profile::sign_out(&services, session).await?;
            println!("Signed out.");
        }
        _ => info!("Leaving without signing out"),
    }
    Ok(())
}

/// Register the configured peers with the in-process backend.
async fn seed_accounts(backend: &MemoryBackend, config: &AppConfig) -> Result<()> {
    let last_seen = chrono::Utc::now().timestamp_millis() - 3_600_000;
    for seed in &config.accounts {
        backend.auth.seed_account(AuthUser {
            uid: seed.uid.clone(),
            phone_number: Some(seed.phone_number.clone()),
            display_name: Some(seed.name.clone()),
            photo_url: None,
            email: None,
        });

        let profile = Profile {
            name: Some(seed.name.clone()),
            about: seed.about.clone(),
            status: Some(serde_json::Value::from(last_seen)),
            phone_number: Some(seed.phone_number.clone()),
            ..Default::default()
        };
        backend
            .store
            .set(&account::user_path(&seed.uid), serde_json::to_value(&profile)?)
            .await?;
        info!("Seeded account {} ({})", seed.uid, seed.name);
    }
    Ok(())
}

/// Phone number, then verification code, until the code is accepted.
async fn run_phone_sign_in(
    backend: &MemoryBackend,
    app_config: &mut AppConfig,
    phone_arg: Option<&str>,
) -> Result<AuthSession> {
    let phone = match phone_arg
        .map(str::to_string)
        .or_else(|| env::var("SOCHAT_PHONE").ok())
        .or_else(|| app_config.last_phone_number.clone())
    {
        Some(phone) => phone,
        None => utils::prompt("Phone number (e.g. +628123456789)")?,
    };
    if phone.is_empty() {
        return Err(anyhow!("A phone number is required to sign in"));
    }

    let pending = start_phone_sign_in(backend.auth.as_ref(), &phone).await?;
    if let Some(code) = backend.auth.sent_code(&pending.verification_id) {
        eprintln!("SMS to {}: your So Chat code is {}", pending.phone_number, code);
    }

    let mut form = VerificationForm::new(pending);
    loop {
        let input = utils::prompt("Verification code")?;
        form.set_code(&input);
        match form.verify(backend.auth.as_ref()).await {
            Ok(session) => {
                if app_config.last_phone_number.as_deref() != Some(phone.as_str()) {
                    app_config.last_phone_number = Some(phone.clone());
                    if let Err(e) = save_config(app_config) {
                        eprintln!("Warning: Failed to save config: {}", e);
                    }
                }
                return Ok(session);
            }
            Err(e) => match e.user_message() {
                Some(message) => eprintln!("{}", message),
                None => return Err(e.into()),
            },
        }
    }
}

/// Collect name, about and an optional photo, then save.
async fn run_account_setup(services: &Services, session: AuthSession, app_config: &AppConfig) -> Result<AuthSession> {
    let mut form = AccountForm::new(services.clone(), session, SaveMode::Setup);
    form.load().await?;
    form.set_location(app_config.location);

    if let Some(phone) = form.display_phone_number() {
        eprintln!("Setting up the account for {}", phone);
    }
    let about = utils::prompt("About you (optional)")?;
    if !about.is_empty() {
        form.set_about(&about);
    }

    let photo = utils::prompt("Photo file (optional)")?;
    if !photo.is_empty() {
        let path = PathBuf::from(&photo);
        match std::fs::read(&path) {
            Ok(bytes) => form.set_avatar(PickedImage {
                bytes,
                mime: utils::image_mime(&path).to_string(),
            }),
            // Unreadable picks are dropped, the rest of the form still saves
            Err(e) => warn!("Ignoring photo {}: {}", path.display(), e),
        }
    }

    loop {
        let name = utils::prompt("Your name")?;
        form.set_name(&name);
        match form.save().await {
            Ok(_) => return Ok(form.session().clone()),
            Err(e) => match e.user_message() {
                Some(message) => eprintln!("{}", message),
                None => return Err(e.into()),
            },
        }
    }
}

async fn pick_peer(
    services: &Services,
    session: &AuthSession,
    app_config: &AppConfig,
    requested: Option<&str>,
) -> Result<UserSummary> {
    let uid = match requested {
        Some(uid) => uid.to_string(),
        None => app_config
            .accounts
            .iter()
            .map(|a| a.uid.clone())
            .find(|uid| uid != session.uid())
            .ok_or_else(|| anyhow!("No peer to chat with; pass --peer or add accounts to the config"))?,
    };

    let profile = load_profile(services.store.as_ref(), &uid)
        .await?
        .ok_or_else(|| anyhow!("Unknown peer '{}'", uid))?;
    Ok(UserSummary::from_profile(&uid, &profile))
}

async fn run_main_loop(
    chat_ui: &mut ChatUI,
    terminal: &mut ui::Terminal<ui::CrosstermBackend<io::Stdout>>,
    mut chat: ChatScreen,
) -> Result<UiAction> {
    let action = loop {
        chat.poll_updates();
        terminal.draw(|f| chat_ui.draw(f, &chat))?;

        match chat_ui.handle_input()? {
            Some(UiAction::Send(text)) => {
                chat.set_text(&text);
                match chat.send().await {
                    Ok(Some(_)) => chat_ui.clear_input(),
                    Ok(None) => {}
                    // Already logged by the chat screen
                    Err(_) => chat_ui.set_notice(Some("Message not sent".to_string())),
                }
            }
            Some(action) => break action,
            None => {}
        }
    };

    chat.close();
    Ok(action)
}
