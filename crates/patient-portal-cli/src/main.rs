//! `patient-portal`: patient records from the terminal.
//!
//! Each invocation restores the session from the local database, performs
//! one action and exits. With `--stub` the in-process backend answers
//! instead of HTTP; its records reset on every run but sessions persist.

mod render;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use patient_portal_core::api::{ApiClient, HttpTransport, Transport};
use patient_portal_core::app::Portal;
use patient_portal_core::auth::{AuthContext, AuthError, AuthResult};
use patient_portal_core::config::{ClientConfig, FallbackMode};
use patient_portal_core::directory::{DirectoryError, DirectoryResult};
use patient_portal_core::forms::{LoginForm, PatientForm, RegisterForm};
use patient_portal_core::guard::Route;
use patient_portal_core::session::SessionStore;
use patient_portal_core::stub::StubBackend;

const STUB_SECRET: &[u8] = b"patient-portal-stub";

#[derive(Parser, Debug)]
#[command(name = "patient-portal", version, about = "Manage patient records from the terminal")]
struct Cli {
    /// Session database path
    #[arg(long, env = "PATIENT_PORTAL_DB", default_value = "patient-portal.db", global = true)]
    db: PathBuf,

    /// Backend origin (defaults to PATIENT_PORTAL_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Show sample patients when the backend cannot be reached
    #[arg(long, global = true)]
    offline_fallback: bool,

    /// Use the in-process stub backend
    #[arg(long, global = true)]
    stub: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PATIENT_PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account, then sign in with it
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PATIENT_PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Patient records
    #[command(subcommand)]
    Patients(PatientsCommand),
}

#[derive(Subcommand, Debug)]
enum PatientsCommand {
    /// Table of all patients
    List,
    /// One patient in full
    Show { id: String },
    /// Add a patient
    Create(PatientFields),
    /// Change fields of a patient; omitted fields keep their value
    Update {
        id: String,
        #[command(flatten)]
        fields: PatientFields,
    },
    /// Remove a patient
    Delete { id: String },
}

#[derive(Args, Debug, Default, Clone)]
struct PatientFields {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// Date of birth, YYYY-MM-DD
    #[arg(long, value_name = "YYYY-MM-DD")]
    dob: Option<String>,
    #[arg(long)]
    street: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip: Option<String>,
}

impl PatientFields {
    fn apply(self, form: &mut PatientForm) {
        let pairs = [
            (self.first_name, &mut form.first_name),
            (self.last_name, &mut form.last_name),
            (self.email, &mut form.email),
            (self.phone, &mut form.phone_number),
            (self.dob, &mut form.date_of_birth),
            (self.street, &mut form.address_street),
            (self.city, &mut form.address_city),
            (self.state, &mut form.address_state),
            (self.zip, &mut form.address_zip),
        ];
        for (value, slot) in pairs {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

fn client_config(cli: &Cli) -> ClientConfig {
    let from_env = ClientConfig::from_env();
    let mut config = match &cli.backend_url {
        Some(url) => ClientConfig::new(url.as_str())
            .with_timeout(from_env.timeout)
            .with_fallback(from_env.fallback),
        None => from_env,
    };

    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    if cli.offline_fallback {
        config = config.with_fallback(FallbackMode::CannedPatients);
    }
    config
}

fn open(cli: &Cli) -> Result<Portal<Box<dyn Transport>>> {
    let session = SessionStore::open(&cli.db)
        .with_context(|| format!("Failed to open session database {}", cli.db.display()))?;
    let config = client_config(cli);
    debug!(base_url = %config.base_url, stub = cli.stub, "opening portal");

    let transport: Box<dyn Transport> = if cli.stub {
        Box::new(
            StubBackend::new()
                .with_secret(STUB_SECRET)
                .with_sample_patients(),
        )
    } else {
        Box::new(HttpTransport::new(config.timeout).context("Failed to build HTTP client")?)
    };

    Ok(Portal::new(AuthContext::new(
        ApiClient::new(config, transport),
        session,
    )))
}

fn run(cli: Cli) -> Result<()> {
    let mut portal = open(&cli)?;

    match cli.command {
        Command::Login { email, password } => {
            portal.start(Route::Login);
            auth_outcome(portal.submit_login(&LoginForm::new(email, password)))?;
            println!("{}", render::screen(portal.screen()));
        }
        Command::Register {
            name,
            email,
            password,
            confirm_password,
        } => {
            portal.start(Route::Login);
            let form = RegisterForm {
                name,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
            };
            auth_outcome(portal.submit_register(&form))?;
            println!("{}", render::screen(portal.screen()));
        }
        Command::Logout => {
            portal.start(Route::Dashboard);
            portal.logout()?;
            println!("Signed out.");
        }
        Command::Whoami => {
            println!("{}", render::screen(portal.start(Route::Dashboard)));
        }
        Command::Patients(command) => patients(&mut portal, command)?,
    }
    Ok(())
}

fn patients<T: Transport>(portal: &mut Portal<T>, command: PatientsCommand) -> Result<()> {
    let screen = portal.start(Route::Patients);
    if screen.route() != Some(Route::Patients) {
        bail!("{}", render::screen(screen));
    }

    match command {
        PatientsCommand::List => println!("{}", render::screen(portal.screen())),
        PatientsCommand::Show { id } => {
            let patient = directory_outcome(portal.patient(&id))?;
            println!("{}", render::patient(&patient));
        }
        PatientsCommand::Create(fields) => {
            let mut form = PatientForm::default();
            fields.apply(&mut form);
            let patient = directory_outcome(portal.create_patient(&form))?;
            println!("Created {} ({})", patient.full_name(), patient.id);
        }
        PatientsCommand::Update { id, fields } => {
            let current = directory_outcome(portal.patient(&id))?;
            let mut form = PatientForm::from_patient(&current);
            fields.apply(&mut form);
            let patient = directory_outcome(portal.update_patient(&id, &form))?;
            println!("Updated {} ({})", patient.full_name(), patient.id);
        }
        PatientsCommand::Delete { id } => {
            directory_outcome(portal.delete_patient(&id))?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

fn auth_outcome(result: AuthResult<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(AuthError::Validation(errors)) => {
            Err(anyhow!("Please fix the following:\n{}", render::validation(&errors)))
        }
        Err(e) => Err(e.into()),
    }
}

fn directory_outcome<T>(result: DirectoryResult<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(DirectoryError::Validation(errors)) => {
            Err(anyhow!("Please fix the following:\n{}", render::validation(&errors)))
        }
        Err(e) => Err(e.into()),
    }
}
