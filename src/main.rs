use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokengate::config::{
    ConfigError, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_LOGIN_PATH, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_TOKENS_PATH, Timeouts, default_session_file, parse_bool,
};
use tokengate::{
    AuthConfig, AuthController, AuthError, FileTokenStore, GuardConfig, HttpTokenEndpoint, Location,
    MemoryTokenStore, RouteAuthRequirement, RouteTable, SessionStore, TokenStore,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing password; pass --password or set TOKENGATE_PASSWORD")]
    MissingPassword,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{code}: {0}", code = .0.error_code())]
    Auth(#[from] AuthError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "tokengate", about = "Token session login, reload, logout and route guard CLI")]
struct Cli {
    #[arg(long, env = "AUTH_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "AUTH_TOKENS_PATH", default_value = DEFAULT_TOKENS_PATH)]
    tokens_path: String,

    #[arg(long, env = "AUTH_ENABLED", default_value = "true", value_parser = parse_enabled)]
    auth_enabled: bool,

    #[arg(long, env = "AUTH_LOGIN_PATH", default_value = DEFAULT_LOGIN_PATH)]
    login_path: String,

    /// Persist tokens here between invocations. Defaults to a per-user file
    /// under the platform config dir.
    #[arg(long, env = "AUTH_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Keep tokens in memory only, ignoring any session file; every run
    /// starts signed out.
    #[arg(long)]
    no_persist: bool,

    #[arg(long, env = "AUTH_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "AUTH_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login(LoginArgs),
    Reload,
    Logout,
    /// Reload the persisted session and print its identity claims.
    Whoami,
    Guard(GuardArgs),
}

#[derive(Args, Debug)]
struct LoginArgs {
    #[arg(long, env = "TOKENGATE_USERNAME")]
    username: String,

    #[arg(long, env = "TOKENGATE_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct GuardArgs {
    /// Requested location, e.g. `/garden?tab=beds`.
    location: String,

    #[arg(long)]
    protected: bool,
}

fn parse_enabled(raw: &str) -> Result<bool, String> {
    parse_bool(raw).ok_or_else(|| format!("{raw:?} is not a boolean"))
}

impl Cli {
    fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        AuthConfig {
            base_url: self.base_url.clone(),
            tokens_path: self.tokens_path.clone(),
            auth_enabled: self.auth_enabled,
            login_path: self.login_path.clone(),
            session_file: if self.no_persist {
                None
            } else {
                self.session_file.clone().or_else(default_session_file)
            },
            timeouts: Timeouts { request_secs: self.request_timeout_secs, connect_secs: self.connect_timeout_secs },
        }
        .validated()
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = cli.auth_config()?;

    let tokens: Arc<dyn TokenStore> = match &config.session_file {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using session file");
            Arc::new(FileTokenStore::new(path))
        }
        None => Arc::new(MemoryTokenStore::new()),
    };
    let endpoint = Arc::new(HttpTokenEndpoint::new(&config)?);
    let controller = AuthController::new(endpoint, tokens, SessionStore::new());

    match cli.command {
        Command::Login(args) => {
            if config.session_file.is_none() {
                tracing::warn!("no session file; the issued tokens are discarded when this process exits");
            }
            run_login(&controller, args).await
        }
        Command::Reload => run_reload(&controller).await,
        Command::Logout => run_logout(&controller).await,
        Command::Whoami => run_whoami(&controller).await,
        Command::Guard(args) => run_guard(&controller, &config, args).await,
    }
}

async fn run_login(controller: &AuthController, args: LoginArgs) -> Result<(), CliError> {
    let password = args.password.ok_or(CliError::MissingPassword)?;
    let identity = controller.login(&args.username, &password).await?;
    eprintln!("logged in as {}", identity.subject().unwrap_or(args.username.as_str()));
    print_state(controller)
}

async fn run_reload(controller: &AuthController) -> Result<(), CliError> {
    controller.reload_session().await?;
    print_state(controller)
}

async fn run_logout(controller: &AuthController) -> Result<(), CliError> {
    let result = controller.logout().await;
    print_state(controller)?;
    result.map_err(CliError::from)
}

async fn run_whoami(controller: &AuthController) -> Result<(), CliError> {
    let identity = controller.reload_session().await?;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

async fn run_guard(controller: &AuthController, config: &AuthConfig, args: GuardArgs) -> Result<(), CliError> {
    if let Err(e) = controller.reload_session().await {
        tracing::debug!(code = e.error_code(), "no usable session for guard check");
    }
    let requirement = if args.protected { RouteAuthRequirement::PROTECTED } else { RouteAuthRequirement::PUBLIC };
    let table = RouteTable::new(GuardConfig::from(config), requirement);
    let location = Location::parse(&args.location);
    let decision = table.guard(controller.session(), &location);
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn print_state(controller: &AuthController) -> Result<(), CliError> {
    let state = controller.session().state();
    let rendered = json!({
        "status": state.status(),
        "identity": state.identity(),
        "error": state.error().map(|e| json!({ "code": e.error_code(), "message": e.to_string() })),
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}
