//! `chestsense` command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use csense_auth::{
    AuthError, AuthService, DoctorRegistration, IdentityClient, PatientRegistration,
};
use csense_cli::{logging, render, AnalysisPipeline};
use csense_firestore::{FirestoreClient, UserRepository};
use csense_ml_client::MlClient;
use csense_models::{AnalysisResult, ImagePayload};

#[derive(Parser)]
#[command(name = "chestsense")]
#[command(about = "Chest X-ray upload, AI analysis and history", long_about = None)]
struct Cli {
    /// Debug logging for ChestSense crates
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify an image that is already uploaded; prints the result as JSON
    Analyze {
        /// Local copy of the X-ray
        #[arg(short, long)]
        file: PathBuf,
        /// Storage URL of the same image
        #[arg(long)]
        image_url: String,
        /// Ask for a heatmap overlay
        #[arg(long, default_value_t = false)]
        heatmap: bool,
    },
    /// Upload an X-ray, record it and analyze it
    Upload {
        /// Owner of the analysis record
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        heatmap: bool,
    },
    /// List a user's analyses, newest first
    History {
        #[arg(short, long)]
        user: String,
        /// Include per-class scores
        #[arg(long, default_value_t = false)]
        scores: bool,
    },
    /// Follow a user's analyses until interrupted
    Watch {
        #[arg(short, long)]
        user: String,
        /// Poll interval in seconds
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
    /// Sign in and print the stored profile
    SignIn {
        #[arg(long, env = "CHESTSENSE_EMAIL")]
        email: String,
        #[arg(long, env = "CHESTSENSE_PASSWORD")]
        password: String,
    },
    /// Create a doctor account
    RegisterDoctor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        license_number: String,
        #[arg(long)]
        specialization: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long, env = "CHESTSENSE_PASSWORD")]
        password: String,
    },
    /// Create a patient account
    RegisterPatient {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: String,
        #[arg(long)]
        gender: String,
        #[arg(long)]
        blood_group: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long, env = "CHESTSENSE_PASSWORD")]
        password: String,
    },
    /// Email a password reset link
    ResetPassword {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Already installed is fine
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Command::Analyze {
            file,
            image_url,
            heatmap,
        } => analyze(file, image_url, heatmap).await,
        Command::Upload {
            user,
            file,
            heatmap,
        } => upload(&user, file, heatmap).await,
        Command::History { user, scores } => history(&user, scores).await,
        Command::Watch {
            user,
            interval_secs,
        } => watch(&user, Duration::from_secs(interval_secs.max(1))).await,
        Command::SignIn { email, password } => {
            let auth = auth_service().await?;
            report_auth(auth.sign_in(&email, &password).await.map(|user| match user {
                Some(u) => serde_json::to_string_pretty(&u).unwrap_or_default(),
                None => "Signed in; no profile stored for this account.".to_string(),
            }))
        }
        Command::RegisterDoctor {
            name,
            license_number,
            specialization,
            email,
            phone,
            password,
        } => {
            let auth = auth_service().await?;
            let form = DoctorRegistration {
                name,
                license_number,
                specialization,
                email,
                phone,
                password,
            };
            report_auth(
                auth.register_doctor(form)
                    .await
                    .map(|u| format!("Registered doctor {}", u.uid)),
            )
        }
        Command::RegisterPatient {
            name,
            age,
            gender,
            blood_group,
            email,
            phone,
            password,
        } => {
            let auth = auth_service().await?;
            let form = PatientRegistration {
                name,
                age,
                gender,
                blood_group,
                email,
                phone,
                password,
            };
            report_auth(
                auth.register_patient(form)
                    .await
                    .map(|u| format!("Registered patient {}", u.uid)),
            )
        }
        Command::ResetPassword { email } => {
            let auth = auth_service().await?;
            report_auth(
                auth.send_password_reset(&email)
                    .await
                    .map(|_| "Password reset email sent.".to_string()),
            )
        }
    }
}

async fn analyze(file: PathBuf, image_url: String, heatmap: bool) -> anyhow::Result<ExitCode> {
    let image = ImagePayload::from_path(&file)
        .into_bytes()
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;

    let client = MlClient::from_env()?;
    debug!(endpoint = %client.config().base_url, "Submitting image");
    let result = client.submit(image, image_url, heatmap).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(exit_for(&result))
}

async fn upload(user: &str, file: PathBuf, heatmap: bool) -> anyhow::Result<ExitCode> {
    let pipeline = AnalysisPipeline::from_env().await?;
    let outcome = pipeline
        .run(user, ImagePayload::from_path(&file), heatmap)
        .await?;

    info!(analysis_id = %outcome.record.id, "Upload finished");
    println!("{}", render::history_line(&outcome.record));
    for line in render::score_lines(&outcome.record) {
        println!("{}", line);
    }
    Ok(exit_for(&outcome.result))
}

async fn history(user: &str, scores: bool) -> anyhow::Result<ExitCode> {
    let pipeline = AnalysisPipeline::from_env().await?;
    let records = pipeline.history(user).await?;

    if records.is_empty() {
        println!("No analyses for {}", user);
    }
    for record in &records {
        println!("{}", render::history_line(record));
        if scores {
            for line in render::score_lines(record) {
                println!("{}", line);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn watch(user: &str, interval: Duration) -> anyhow::Result<ExitCode> {
    let pipeline = AnalysisPipeline::from_env().await?;
    let mut feed = pipeline.watch(user, interval);

    loop {
        tokio::select! {
            changed = feed.changed() => {
                if !changed {
                    break;
                }
                let records = feed.latest();
                println!("--- {} analyses ---", records.len());
                for record in &records {
                    println!("{}", render::history_line(record));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn auth_service() -> anyhow::Result<AuthService> {
    let identity = IdentityClient::from_env()?;
    let users = UserRepository::new(FirestoreClient::from_env().await?);
    Ok(AuthService::new(identity, users))
}

/// Print the success text, or the user-facing message for an auth failure.
fn report_auth(result: Result<String, AuthError>) -> anyhow::Result<ExitCode> {
    match result {
        Ok(text) => {
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            debug!(code = %e.code(), "Auth failure: {}", e);
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn exit_for(result: &AnalysisResult) -> ExitCode {
    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
