#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use kaveri_api_client::{KaveriApiClient, KaveriApiClientConfig};
use kaveri_app_state::agent_detail::AgentDetailScreen;
use kaveri_app_state::agent_list::AgentListScreen;
use kaveri_app_state::connectivity::{ConnectivityMonitor, OFFLINE_MESSAGE, OFFLINE_TITLE};
use kaveri_app_state::dashboard::{DashboardScreen, DashboardStats, StatKind, format_amount};
use kaveri_app_state::login::LoginForm;
use kaveri_app_state::mutation::MutationOutcome;
use kaveri_app_state::notify::{Notifications, ToastLevel};
use kaveri_app_state::recharge::RechargeOutcome;
use kaveri_app_state::route::AppRoute;
use kaveri_app_state::shell::{AppShell, RootView};
use kaveri_app_state::{AppContext, ScreenError};
use kaveri_client_core::config::AdminConfig;
use kaveri_client_core::models::{AgentRecord, AgentRole};
use kaveri_client_core::session::{FileCredentialStore, SessionContext};
use tracing_subscriber::EnvFilter;

const SIGN_IN_HINT: &str = "sign in required; run `kaveri-admin login --email <email>`";

#[derive(Debug, Parser)]
#[command(name = "kaveri-admin")]
#[command(about = "Kaveri Institutions admin console")]
pub struct Cli {
    /// Backend base URL. Overrides KAVERI_API_BASE_URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Credential file. Overrides KAVERI_SESSION_PATH.
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in with manager credentials
    Login(LoginArgs),
    /// Clear the stored credential
    Logout,
    /// Show whether a usable session is stored
    Status,
    /// Dashboard statistics and the active agents
    Dashboard,
    /// List agents
    Agents(AgentsArgs),
    /// Agent profile, letters and credit history
    Agent(AgentArgs),
    /// Mark an agent as verified
    Verify(AgentArgs),
    /// Withdraw an agent's verification
    Block(AgentArgs),
    /// Make an agent an admin
    Promote(ConfirmArgs),
    /// Make an admin an agent
    Demote(ConfirmArgs),
    /// Suspend an agent
    Suspend(ConfirmArgs),
    /// Lift an agent's suspension
    Restore(ConfirmArgs),
    /// Flip the authorization of one of an agent's letters
    Letter(LetterArgs),
    /// Add credits to a verified agent
    Recharge(RechargeArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    /// Read from stdin when omitted.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct AgentsArgs {
    /// Show suspended agents instead of active ones.
    #[arg(long)]
    pub suspended: bool,
}

#[derive(Debug, Args)]
pub struct AgentArgs {
    pub kaveri_id: String,
}

#[derive(Debug, Args)]
pub struct ConfirmArgs {
    pub kaveri_id: String,
    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct LetterArgs {
    pub kaveri_id: String,
    pub letter_id: String,
}

#[derive(Debug, Args)]
pub struct RechargeArgs {
    pub kaveri_id: String,
    pub amount: String,
}

impl Commands {
    /// Screen the command acts on.
    #[must_use]
    pub fn route(&self) -> AppRoute {
        match self {
            Self::Login(_) | Self::Logout | Self::Status => AppRoute::Login,
            Self::Dashboard
            | Self::Agents(_)
            | Self::Verify(_)
            | Self::Block(_)
            | Self::Recharge(_) => AppRoute::Dashboard,
            Self::Agent(AgentArgs { kaveri_id })
            | Self::Promote(ConfirmArgs { kaveri_id, .. })
            | Self::Demote(ConfirmArgs { kaveri_id, .. })
            | Self::Suspend(ConfirmArgs { kaveri_id, .. })
            | Self::Restore(ConfirmArgs { kaveri_id, .. })
            | Self::Letter(LetterArgs { kaveri_id, .. }) => AppRoute::AgentDetail {
                kaveri_id: kaveri_id.clone(),
            },
        }
    }
}

pub fn load_config(cli: &Cli) -> Result<AdminConfig> {
    let mut config = AdminConfig::from_env()
        .context("failed to read configuration")?
        .with_base_url_override(cli.base_url.as_deref())
        .context("invalid --base-url")?;
    if let Some(path) = &cli.session_file {
        config.session_path.clone_from(path);
    }
    Ok(config)
}

/// Logs go to stderr so command output stays clean. `RUST_LOG` wins over the
/// configured filter.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();
}

pub async fn run(cli: Cli, config: &AdminConfig) -> Result<()> {
    let console = Console::open(config)?;
    let target = cli.command.route();
    let mut shell = AppShell::mount(&console.ctx, &console.connectivity, target.clone());
    if target.requires_session() && *shell.route() == AppRoute::Login {
        bail!(SIGN_IN_HINT);
    }

    let result = console.execute(cli.command).await;
    match shell.view() {
        RootView::Offline => eprintln!("{OFFLINE_TITLE}\n{OFFLINE_MESSAGE}"),
        RootView::Route(AppRoute::Login) if target.requires_session() => {
            eprintln!("{SIGN_IN_HINT}");
        }
        RootView::Route(_) => {}
    }
    result
}

struct Console {
    ctx: AppContext,
    connectivity: ConnectivityMonitor,
}

impl Console {
    fn open(config: &AdminConfig) -> Result<Self> {
        let session = SessionContext::new(FileCredentialStore::new(config.session_path.clone()));
        let connectivity = ConnectivityMonitor::default();
        let client = KaveriApiClient::new(KaveriApiClientConfig::from(config), session.clone())
            .context("failed to build API client")?
            .with_connectivity(Arc::new(connectivity.clone()));
        Ok(Self {
            ctx: AppContext::new(Arc::new(client), session),
            connectivity,
        })
    }

    async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Login(args) => self.login(args).await,
            Commands::Logout => {
                self.ctx.session().sign_out();
                println!("Signed out.");
                Ok(())
            }
            Commands::Status => {
                self.status();
                Ok(())
            }
            Commands::Dashboard => self.dashboard().await,
            Commands::Agents(args) => self.agents(args.suspended).await,
            Commands::Agent(args) => self.agent(&args.kaveri_id).await,
            Commands::Verify(args) => self.set_verification(&args.kaveri_id, true).await,
            Commands::Block(args) => self.set_verification(&args.kaveri_id, false).await,
            Commands::Promote(args) => self.change_role(args, AgentRole::Admin).await,
            Commands::Demote(args) => self.change_role(args, AgentRole::Agent).await,
            Commands::Suspend(args) => self.change_suspension(args, true).await,
            Commands::Restore(args) => self.change_suspension(args, false).await,
            Commands::Letter(args) => self.toggle_letter(args).await,
            Commands::Recharge(args) => self.recharge(args).await,
        }
    }

    async fn login(&self, args: LoginArgs) -> Result<()> {
        let password = match args.password {
            Some(password) => password,
            None => prompt_line("Password: ")?,
        };
        let mut form = LoginForm::new(args.email, password);
        form.submit(&self.ctx).await?;
        println!("Signed in as {}.", form.email.trim());
        Ok(())
    }

    fn status(&self) {
        match self.ctx.session().admit(self.ctx.now()) {
            Ok(claims) => {
                println!("Signed in");
                println!("  role:    {}", claims.role.as_deref().unwrap_or("-"));
                println!("  email:   {}", claims.email.as_deref().unwrap_or("-"));
                if let Some(expires_at) = claims.expires_at() {
                    println!("  expires: {}", expires_at.to_rfc3339());
                }
            }
            Err(reason) => println!("Signed out ({reason})"),
        }
    }

    async fn dashboard(&self) -> Result<()> {
        let mut screen = DashboardScreen::default();
        screen.enter(&self.ctx).await.map_err(screen_error)?;
        print_stats(screen.stats());
        println!();
        print_agents(screen.agent_list().agents());
        print_toasts(screen.notifications_mut());
        Ok(())
    }

    async fn agents(&self, suspended: bool) -> Result<()> {
        let mut list = AgentListScreen::new(suspended);
        list.refresh(&self.ctx).await.map_err(screen_error)?;
        print_agents(list.agents());
        Ok(())
    }

    async fn load_agent(&self, kaveri_id: &str) -> Result<AgentDetailScreen> {
        let mut screen = AgentDetailScreen::new(kaveri_id);
        screen.load(&self.ctx).await.map_err(screen_error)?;
        Ok(screen)
    }

    async fn agent(&self, kaveri_id: &str) -> Result<()> {
        let screen = self.load_agent(kaveri_id).await?;
        print_agent(&screen);
        Ok(())
    }

    async fn set_verification(&self, kaveri_id: &str, verified: bool) -> Result<()> {
        let mut notifications = Notifications::default();
        for show_suspended in [false, true] {
            let mut list = AgentListScreen::new(show_suspended);
            list.refresh(&self.ctx).await.map_err(screen_error)?;
            let outcome = list
                .set_verification(&self.ctx, kaveri_id, verified, &mut notifications)
                .await;
            if let Some(outcome) = outcome {
                print_toasts(&mut notifications);
                return settled(outcome);
            }
        }
        bail!("agent {kaveri_id} not found")
    }

    async fn change_role(&self, args: ConfirmArgs, target: AgentRole) -> Result<()> {
        let mut screen = self.load_agent(&args.kaveri_id).await?;
        let name = agent_name(&screen);
        let Some(change) = screen.open_role_dialog().cloned() else {
            bail!(
                "role changes are unavailable while {} is suspended",
                args.kaveri_id
            );
        };
        if change.to != target {
            bail!("{name} is already {}", change.from);
        }
        let prompt = format!("Are you sure you want to {} {name}?", change.verb());
        if !confirm(&prompt, args.yes)? {
            screen.cancel_role_dialog();
            println!("Cancelled.");
            return Ok(());
        }
        let outcome = screen
            .confirm_role_change(&self.ctx)
            .await
            .ok_or_else(|| anyhow!("a role change for {} is in progress", args.kaveri_id))?;
        print_toasts(screen.notifications_mut());
        settled(outcome)
    }

    async fn change_suspension(&self, args: ConfirmArgs, suspend: bool) -> Result<()> {
        let mut screen = self.load_agent(&args.kaveri_id).await?;
        let name = agent_name(&screen);
        let Some(change) = screen.open_suspend_dialog() else {
            bail!("agent {} not found", args.kaveri_id);
        };
        if change.target() != suspend {
            let state = if suspend { "suspended" } else { "active" };
            bail!("{name} is already {state}");
        }
        let prompt = format!("Are you sure you want to {} {name}?", change.verb());
        if !confirm(&prompt, args.yes)? {
            screen.cancel_suspend_dialog();
            println!("Cancelled.");
            return Ok(());
        }
        let outcome = screen
            .confirm_suspension(&self.ctx)
            .await
            .ok_or_else(|| anyhow!("a suspension change for {} is in progress", args.kaveri_id))?;
        print_toasts(screen.notifications_mut());
        settled(outcome)
    }

    async fn toggle_letter(&self, args: LetterArgs) -> Result<()> {
        let mut screen = self.load_agent(&args.kaveri_id).await?;
        let outcome = screen
            .toggle_letter(&self.ctx, &args.letter_id)
            .await
            .ok_or_else(|| {
                anyhow!(
                    "letter {} not found for agent {}",
                    args.letter_id,
                    args.kaveri_id
                )
            })?;
        print_toasts(screen.notifications_mut());
        settled(outcome)
    }

    async fn recharge(&self, args: RechargeArgs) -> Result<()> {
        let mut screen = DashboardScreen::default();
        screen.enter(&self.ctx).await.map_err(screen_error)?;
        if !screen.recharge_mut().select(&args.kaveri_id) {
            bail!("{} is not a verified agent", args.kaveri_id);
        }
        screen.recharge_mut().set_amount(args.amount);
        let outcome = screen.submit_recharge(&self.ctx).await;
        print_toasts(screen.notifications_mut());
        match outcome {
            RechargeOutcome::Completed { kaveri_id, amount } => {
                println!("Added {amount} credits to {kaveri_id}.");
                Ok(())
            }
            RechargeOutcome::Invalid(errors) => Err(errors.into()),
            RechargeOutcome::Failed(error) => Err(error.into()),
        }
    }
}

fn screen_error(error: ScreenError) -> anyhow::Error {
    if error.requires_login() {
        anyhow!("{error}; {SIGN_IN_HINT}")
    } else {
        error.into()
    }
}

fn settled<V>(outcome: MutationOutcome<V>) -> Result<()> {
    match outcome {
        MutationOutcome::Committed { .. } => Ok(()),
        MutationOutcome::RolledBack { key, error, .. } => {
            Err(anyhow::Error::new(error).context(format!("{key} was not saved")))
        }
    }
}

fn agent_name(screen: &AgentDetailScreen) -> String {
    screen.profile().map_or_else(
        || screen.kaveri_id().to_string(),
        |profile| profile.user.display_name().to_string(),
    )
}

fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    let answer = prompt_line(&format!("{prompt} [y/N] "))?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn prompt_line(prompt: &str) -> Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_stats(stats: &DashboardStats) {
    for kind in [
        StatKind::LettersGenerated,
        StatKind::PendingUsers,
        StatKind::TotalUsers,
        StatKind::AmountReceived,
    ] {
        let current = stats.stat(kind).current;
        let value = if kind == StatKind::AmountReceived {
            format_amount(current)
        } else {
            current.to_string()
        };
        println!("{:<18} {:>14}  {}", kind.title(), value, stats.trend(kind));
    }
    println!(
        "{:<18} {:>14}",
        "Authorized",
        format_amount(stats.authorized_amount())
    );
    println!(
        "{:<18} {:>14}",
        "Unauthorized",
        format_amount(stats.unauthorized_amount)
    );
}

fn print_agents(agents: &[AgentRecord]) {
    if agents.is_empty() {
        println!("No agents.");
        return;
    }
    println!("{:<12} {:<24} {:<8} STATUS", "KAVERI ID", "NAME", "ROLE");
    for agent in agents {
        println!(
            "{:<12} {:<24} {:<8} {}",
            agent.kaveri_id,
            agent.display_name(),
            agent.role,
            agent.status_label()
        );
    }
}

fn print_agent(screen: &AgentDetailScreen) {
    let Some(profile) = screen.profile() else {
        return;
    };
    let user = &profile.user;
    let dash = |value: Option<&String>| value.map_or("-".to_string(), Clone::clone);
    println!("{} ({})", user.display_name(), user.kaveri_id);
    println!("  email:       {}", dash(user.email.as_ref()));
    println!("  contact:     {}", dash(user.contact.as_ref()));
    println!("  consultancy: {}", dash(user.consultancy_name.as_ref()));
    println!("  role:        {}", user.role);
    println!("  status:      {}", user.status_label());
    println!(
        "  credits:     {} total, {} available",
        profile.credits.unwrap_or_default(),
        profile.available_credits.unwrap_or_default()
    );

    println!();
    println!("Letters");
    if screen.letters().letters().is_empty() {
        println!("  none");
    }
    for letter in screen.letters().letters() {
        let mark = if letter.authorized {
            "authorized"
        } else {
            "unauthorized"
        };
        println!(
            "  {:<26} {:<24} {:<20} {mark}",
            letter.id,
            letter.student_name,
            letter.course.as_deref().unwrap_or("-")
        );
    }

    println!();
    println!("Credit history");
    if screen.credit_logs().is_empty() {
        println!("  none");
    }
    for entry in screen.credit_logs() {
        println!(
            "  {}  {:>10}",
            entry.added_at.format("%Y-%m-%d %H:%M"),
            entry.amount
        );
    }
}

fn print_toasts(notifications: &mut Notifications) {
    for toast in notifications.drain() {
        match toast.level {
            ToastLevel::Success => println!("{}", toast.message),
            ToastLevel::Error => eprintln!("{}", toast.message),
        }
    }
}
