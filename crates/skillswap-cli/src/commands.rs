use clap::Args;
use skillswap_core::{
    AppConfig, AppState, CandidateStatus, ChatEvent, ChatMessage, CoreError, SignUpForm,
    UserProfile,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Args)]
pub struct SignupArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    /// National identity number
    #[arg(long)]
    cnic: String,
    #[arg(long)]
    contact: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm_password: String,
    /// Picture to use; a copy is kept in the data directory
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    availability: String,
    /// Skill you can teach (repeatable)
    #[arg(long = "have", required = true)]
    skills_have: Vec<String>,
    /// Skill you want to learn (repeatable)
    #[arg(long = "learn", required = true)]
    skills_learn: Vec<String>,
}

/// Log the detail, show the user the short version.
fn user_error(err: CoreError) -> anyhow::Error {
    debug!("{:?}", err);
    anyhow::anyhow!(err.user_message())
}

/// Check the form, then copy the picture into `images_dir`. Nothing is
/// written when the form is invalid.
fn prepare_signup(args: SignupArgs, images_dir: &Path) -> anyhow::Result<SignUpForm> {
    let mut form = SignUpForm {
        name: args.name,
        email: args.email,
        national_id: args.cnic,
        contact: args.contact,
        location: args.location,
        password: args.password,
        confirm_password: args.confirm_password,
        image: args.image.to_string_lossy().into_owned(),
        availability: args.availability,
        skills_have: args.skills_have,
        skills_learn: args.skills_learn,
    };
    form.validate().map_err(user_error)?;

    let image = skillswap_common::import_profile_image_into(&args.image, images_dir)?;
    form.image = image.to_string_lossy().into_owned();
    Ok(form)
}

pub async fn signup(app: &AppState, args: SignupArgs) -> anyhow::Result<()> {
    let form = prepare_signup(args, &skillswap_common::profile_images_dir())?;

    match app.accounts().register(&form).await {
        Ok(session) => {
            println!("Account created. Your user id is {}", session.user_id);
            Ok(())
        }
        Err(e) => {
            skillswap_common::discard_profile_image(Path::new(&form.image));
            Err(user_error(e))
        }
    }
}

pub async fn login(app: &AppState, email: &str, password: &str) -> anyhow::Result<()> {
    let session = app
        .accounts()
        .login(email, password)
        .await
        .map_err(user_error)?;
    println!("Signed in as {}", session.user_id);
    print_profile(&session.profile);
    Ok(())
}

pub async fn dashboard(app: &AppState, user: &str, query: &str) -> anyhow::Result<()> {
    let mut sync = app.relationships(user);
    let report = sync.load_state().await.map_err(user_error)?;
    for slice in &report.failed {
        eprintln!("! Could not refresh {:?}", slice);
    }

    let state = sync.state();
    for notice in state.notices() {
        println!("{}", notice.user_message());
    }
    if let Some(profile) = state.profile() {
        print_profile(profile);
    }

    println!("\nFollow requests:");
    if state.requests().is_empty() {
        println!("  (none)");
    }
    for request in state.requests() {
        println!("  {} ({}) at {}", request.sender_name, request.id, request.timestamp);
    }

    println!("\nMy followers:");
    let followers = sync.followers_profiles();
    if followers.is_empty() {
        println!("  (none)");
    }
    for entry in followers {
        println!("  {} ({})", entry.profile.name, entry.id);
    }

    println!("\nMatches:");
    let candidates = sync.candidates(query);
    if candidates.is_empty() {
        println!("  (none)");
    }
    for entry in candidates {
        let status = match sync.candidate_status(&entry.id) {
            CandidateStatus::Follow => "follow",
            CandidateStatus::RequestSent => "request sent",
            CandidateStatus::Following => "following",
        };
        println!(
            "  {} ({}) - {} - skills: {} [{}]",
            entry.profile.name,
            entry.id,
            or_na(&entry.profile.location),
            entry.profile.skills_have().join(", "),
            status
        );
    }
    Ok(())
}

pub async fn follow(app: &AppState, user: &str, recipient: &str) -> anyhow::Result<()> {
    let mut sync = app.relationships(user);
    sync.load_state().await.map_err(user_error)?;
    sync.send_follow_request(recipient)
        .await
        .map_err(user_error)?;
    println!("Follow request sent to {}", recipient);
    Ok(())
}

pub async fn accept(app: &AppState, user: &str, sender: &str) -> anyhow::Result<()> {
    let mut sync = app.relationships(user);
    sync.accept_follow_request(sender)
        .await
        .map_err(user_error)?;
    println!("Accepted follow request from {}", sender);
    Ok(())
}

pub async fn chat(app: &AppState, user: &str, recipient: &str) -> anyhow::Result<()> {
    let mut session = app.chat(user, recipient);
    let events = session.events();
    session.connect().await.map_err(user_error)?;

    let mut shown: HashSet<String> = HashSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ChatEvent::Messages(messages)) => print_new(user, &messages, &mut shown),
                Ok(ChatEvent::ConnectionError(msg)) | Ok(ChatEvent::ParseFailed(msg)) => {
                    eprintln!("! {}", msg);
                }
                Ok(ChatEvent::Opened) => eprintln!("-- connected to {} --", session.conversation_id()),
                Ok(ChatEvent::Closed) | Err(_) => break,
            },
            line = lines.next_line() => match line? {
                Some(text) => {
                    if let Err(e) = session.send_message(&text).await {
                        eprintln!("! {}", e.user_message());
                    }
                }
                None => break,
            },
        }
    }

    session.disconnect();
    Ok(())
}

pub fn config(config: &AppConfig, root: &Path, set_root: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(new_root) = set_root {
        skillswap_common::save_persistent_root(&new_root)?;
        println!("Saved data directory {:?}", new_root);
    }
    println!("data directory: {}", root.display());
    if let Some(path) = skillswap_common::config_path() {
        println!("config file: {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn print_new(user: &str, messages: &[ChatMessage], shown: &mut HashSet<String>) {
    for message in messages {
        if !shown.insert(message.id.clone()) {
            continue;
        }
        let who = if message.sender_id == user { "me" } else { message.sender_id.as_str() };
        println!("[{}] {}: {}", message.timestamp, who, message.text);
    }
}

fn print_profile(profile: &UserProfile) {
    println!("{} <{}>", profile.name, or_na(&profile.email));
    println!("  location: {}", or_na(&profile.location));
    println!("  contact: {}", or_na(&profile.contact));
    println!("  availability: {}", or_na(&profile.availability));
    println!("  offers: {}", profile.skills_have().join(", "));
    println!("  wants: {}", profile.skills_learn().join(", "));
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}
