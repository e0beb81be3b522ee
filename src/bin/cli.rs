//! LikeBot CLI
//!
//! Command-line dashboard for the LikeBot backend:
//! - Operator login and user administration
//! - Accounts, posts, channels, proxies and palettes
//! - Task creation, execution control, runs and reports
//! - Live log tail

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use likebot::api::dto::{
    Account, AccountStatus, AccountUpdate, BulkResponse, ChannelFields, LoginStart, NewProxy,
    Palette, PaletteUpdate, PostUpdate, ProxyImportOptions, ProxyUpdate, RegisterRequest,
    TaskAction, TaskStatus, TaskUpdate, UserRole,
};
use likebot::config::generate_default_config;
use likebot::import::{
    count_status, import_accounts, import_posts, import_proxies, AccountCsvImporter,
};
use likebot::logs::{self, DEFAULT_BUFFER_CAPACITY};
use likebot::reports::{format_phone, format_timestamp};
use likebot::services::accounts::filter_by_proxy;
use likebot::services::{ChannelFilter, PostFilter, ProxyFilter, ReportQuery, TaskFilter};
use likebot::{
    AccountsService, Access, ApiClient, ApiError, AuthService, BulkReport, ChannelsService, Config,
    ImportStatus, Landing, LogBuffer, LogEvent, LogStream, LoggingConfig, LoginDriver, LoginEvent,
    LoginInput, PalettesService, PostsService, ProxiesService, ProxyCsvImporter, ReportFilter,
    ReportView, SelectionMode, SortDirection, SortField, StatsService, TaskDraft, TasksService,
    UsersService,
};

#[derive(Parser)]
#[command(name = "likebot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Admin dashboard for the LikeBot Telegram automation backend")]
#[command(long_about = "Manage LikeBot accounts, posts, channels, proxies and reaction tasks.\nRun without a command to see where to start.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend URL (overrides config and LIKEBOT_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Config file (default: ~/.config/likebot/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Operator login, logout and registration
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Telegram accounts
    #[command(subcommand)]
    Accounts(AccountsCommand),

    /// Target posts
    #[command(subcommand)]
    Posts(PostsCommand),

    /// Reaction and comment tasks
    #[command(subcommand)]
    Tasks(TasksCommand),

    /// Indexed channels
    #[command(subcommand)]
    Channels(ChannelsCommand),

    /// Proxies
    #[command(subcommand)]
    Proxies(ProxiesCommand),

    /// Reaction palettes
    #[command(subcommand)]
    Palettes(PalettesCommand),

    /// Dashboard users (admin)
    #[command(subcommand)]
    Users(UsersCommand),

    /// Database-wide counters
    Stats,

    /// Backend logs
    #[command(subcommand)]
    Logs(LogsCommand),

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Log in and store the session
    Login {
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Create an operator account
    Register {
        username: String,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(long)]
        role: Option<UserRole>,
    },
    /// Show the logged-in operator
    Whoami,
}

#[derive(Subcommand)]
pub enum AccountsCommand {
    List {
        /// Exact phone number
        #[arg(long)]
        phone: Option<String>,
        /// Only accounts linked to this proxy
        #[arg(long)]
        proxy: Option<String>,
    },
    Get {
        phone: String,
    },
    /// Add an account by logging it in to Telegram
    Login {
        phone: String,
        /// 2FA password, if the account has one
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        session_name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Update {
        phone: String,
        #[arg(long)]
        session_name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// NEW, ACTIVE, LOGGED_IN, BANNED or ERROR
        #[arg(long)]
        status: Option<String>,
        /// Replace linked proxies (repeatable)
        #[arg(long = "proxy")]
        proxies: Vec<String>,
    },
    /// Delete accounts one request at a time
    Delete {
        #[arg(required = true)]
        phones: Vec<String>,
    },
    /// Delete accounts through the bulk endpoint
    BulkDelete {
        #[arg(required = true)]
        phones: Vec<String>,
    },
    /// Check the account's Telegram session
    Validate {
        phone: String,
    },
    /// Index the channels the account is subscribed to
    IndexChannels {
        phone: String,
    },
    /// Show the stored password (admin)
    Password {
        phone: String,
    },
    /// Link every proxy-less account to the least used active proxy
    AutoAssignProxies {
        /// Only show the plan
        #[arg(long)]
        dry_run: bool,
    },
    /// Import accounts from CSV (phone_number,session_name,notes)
    Import {
        path: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum PostsCommand {
    List {
        #[arg(long)]
        post_id: Option<i64>,
        #[arg(long)]
        chat_id: Option<i64>,
        /// Only posts with resolved ids
        #[arg(long)]
        validated: bool,
    },
    Get {
        post_id: i64,
    },
    Create {
        /// https://t.me/... link
        link: String,
    },
    Update {
        post_id: i64,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        chat_id: Option<i64>,
        #[arg(long)]
        message_id: Option<i64>,
    },
    Delete {
        #[arg(required = true)]
        post_ids: Vec<i64>,
    },
    /// Resolve chat and message ids on the backend
    Validate {
        post_id: i64,
    },
    /// Create posts from a file with one link per line
    Import {
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum TasksCommand {
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        name: Option<String>,
    },
    Get {
        task_id: i64,
    },
    /// Create a task from details, posts and accounts
    Create(CreateTaskArgs),
    Update {
        task_id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        task_id: i64,
    },
    Start {
        task_id: i64,
    },
    Pause {
        task_id: i64,
    },
    Resume {
        task_id: i64,
    },
    Status {
        task_id: i64,
    },
    Runs {
        task_id: i64,
    },
    DeleteRun {
        task_id: i64,
        run_id: String,
    },
    /// Delete every run of a task
    DeleteRuns {
        task_id: i64,
    },
    /// Runs across all tasks
    AllRuns,
    /// Filtered, sorted and paged task report
    Report(ReportArgs),
}

#[derive(Args)]
pub struct CreateTaskArgs {
    name: String,
    #[arg(long)]
    description: Option<String>,
    /// React with this palette (default: positive)
    #[arg(long, conflicts_with = "comment")]
    react: Option<String>,
    /// Comment with this text
    #[arg(long)]
    comment: Option<String>,
    /// Post link (repeatable)
    #[arg(long = "post")]
    posts: Vec<String>,
    /// File with one post link per line
    #[arg(long)]
    posts_file: Option<PathBuf>,
    /// Account phone number (repeatable)
    #[arg(long = "account", conflicts_with = "random")]
    accounts: Vec<String>,
    /// Pick this many ACTIVE accounts at random
    #[arg(long)]
    random: Option<usize>,
}

#[derive(Args)]
pub struct ReportArgs {
    task_id: i64,
    /// Report of a single run
    #[arg(long)]
    run: Option<String>,
    #[arg(long = "type", default_value = "all")]
    report_type: String,
    /// Client phone number substring
    #[arg(long)]
    client: Option<String>,
    #[arg(long)]
    palette: Option<String>,
    /// Only failed events
    #[arg(long, conflicts_with = "successes")]
    errors: bool,
    /// Only successful events
    #[arg(long)]
    successes: bool,
    /// First day (YYYY-MM-DD, UTC)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day (YYYY-MM-DD, UTC)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// datetime, client or palette
    #[arg(long, default_value = "datetime")]
    sort: SortField,
    #[arg(long)]
    asc: bool,
    #[arg(long, default_value_t = 1)]
    page: usize,
}

#[derive(Args)]
pub struct ChannelArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    private: Option<bool>,
    #[arg(long)]
    reactions: Option<bool>,
    #[arg(long)]
    subscribers_only: Option<bool>,
    #[arg(long)]
    discussion_chat_id: Option<i64>,
    /// Tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,
}

impl ChannelArgs {
    fn fields(self) -> ChannelFields {
        ChannelFields {
            channel_name: self.name,
            is_private: self.private,
            has_enabled_reactions: self.reactions,
            reactions_only_for_subscribers: self.subscribers_only,
            discussion_chat_id: self.discussion_chat_id,
            tags: (!self.tags.is_empty()).then_some(self.tags),
        }
    }
}

#[derive(Subcommand)]
pub enum ChannelsCommand {
    List {
        #[arg(long)]
        chat_id: Option<i64>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    Get {
        chat_id: i64,
    },
    Create {
        chat_id: i64,
        #[command(flatten)]
        fields: ChannelArgs,
    },
    Update {
        chat_id: i64,
        #[command(flatten)]
        fields: ChannelArgs,
    },
    Delete {
        chat_id: i64,
    },
    Stats,
    /// Channels with the number of stored posts
    PostCounts,
}

#[derive(Subcommand)]
pub enum ProxiesCommand {
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        active_only: bool,
    },
    Get {
        name: String,
    },
    Create {
        name: String,
        host: String,
        port: u16,
        #[arg(long = "type", default_value = "socks5")]
        proxy_type: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        inactive: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    Update {
        name: String,
        #[arg(long = "type")]
        proxy_type: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete {
        name: String,
    },
    Stats,
    /// Connectivity test run by the backend
    Test {
        name: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Upload a proxy list to the backend importer
    Import {
        path: PathBuf,
        #[arg(long = "type")]
        proxy_type: Option<String>,
        #[arg(long)]
        base_name: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Create proxies from CSV (host,port,username,password,proxy_type)
    ImportCsv {
        path: PathBuf,
        /// Type for rows without a proxy_type column
        #[arg(long = "type", default_value = "socks5")]
        proxy_type: String,
        #[arg(long)]
        inactive: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum PalettesCommand {
    List,
    Get {
        name: String,
    },
    Create {
        name: String,
        #[arg(required = true)]
        emojis: Vec<String>,
        /// Use the emojis in order instead of at random
        #[arg(long)]
        ordered: bool,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        name: String,
        /// Replace the emojis (repeatable)
        #[arg(long = "emoji")]
        emojis: Vec<String>,
        #[arg(long)]
        ordered: Option<bool>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum UsersCommand {
    List,
    SetRole {
        username: String,
        role: UserRole,
    },
    /// Mark a user verified
    Verify {
        username: String,
        /// Remove verification instead
        #[arg(long)]
        revoke: bool,
    },
    Delete {
        username: String,
    },
}

#[derive(Subcommand)]
pub enum LogsCommand {
    /// Follow the backend log until the stream closes or Ctrl-C
    Tail {
        /// Log file on the backend
        #[arg(long)]
        file: Option<String>,
        /// Lines of history to start with (0-1000)
        #[arg(short = 'n', long)]
        tail: Option<u32>,
        /// Lines kept for JSON output
        #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY)]
        buffer: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging);

    let api_url = config.api.url.clone();
    match run(cli, config).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_transport) {
                eprintln!("Cannot connect to LikeBot API at {}", api_url);
                eprintln!("Error: {}", e);
                eprintln!();
                eprintln!("Check the backend is running or pass --api-url.");
            } else {
                eprintln!("Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(url) = &cli.api_url {
        config.api.url = url.clone();
    }
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let Some(command) = cli.command else {
        let app = App::new(config, cli.format)?;
        return landing(&app).await;
    };

    if let Commands::Config { output } = &command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let app = App::new(config, cli.format)?;
    match command {
        Commands::Auth(cmd) => auth(&app, cmd).await,
        Commands::Accounts(cmd) => accounts(&app, cmd).await,
        Commands::Posts(cmd) => posts(&app, cmd).await,
        Commands::Tasks(cmd) => tasks(&app, cmd).await,
        Commands::Channels(cmd) => channels(&app, cmd).await,
        Commands::Proxies(cmd) => proxies(&app, cmd).await,
        Commands::Palettes(cmd) => palettes(&app, cmd).await,
        Commands::Users(cmd) => users(&app, cmd).await,
        Commands::Stats => stats(&app).await,
        Commands::Logs(cmd) => tail_logs(&app, cmd).await,
        Commands::Config { .. } => Ok(()),
    }
}

struct App {
    config: Config,
    client: ApiClient,
    format: OutputFormat,
}

impl App {
    fn new(config: Config, format: OutputFormat) -> Result<Self> {
        let client = ApiClient::from_config(&config)?;
        Ok(Self {
            config,
            client,
            format,
        })
    }

    async fn require(&self, access: Access) -> Result<()> {
        self.client.session().check(access).await?;
        Ok(())
    }

    fn concurrency(&self) -> usize {
        self.config.bulk.concurrency
    }

    fn accounts(&self) -> AccountsService {
        AccountsService::new(self.client.clone())
    }

    fn posts(&self) -> PostsService {
        PostsService::new(self.client.clone())
    }

    fn tasks(&self) -> TasksService {
        TasksService::new(self.client.clone())
    }

    fn proxies(&self) -> ProxiesService {
        ProxiesService::new(self.client.clone())
    }

    /// JSON as is, or the given table renderer
    fn emit<T: Serialize + ?Sized>(&self, value: &T, table: impl FnOnce()) -> Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Table => table(),
        }
        Ok(())
    }

    fn message<T: Serialize + ?Sized>(&self, value: &T, text: impl Display) -> Result<()> {
        self.emit(value, || println!("{}", text))
    }
}

async fn landing(app: &App) -> Result<()> {
    match app.client.session().landing().await {
        Landing::Home => {
            if let Some(user) = app.client.session().current_user().await {
                println!("Logged in as {} ({})", user.username, user.role);
            }
            println!("LikeBot Admin v{} at {}", env!("CARGO_PKG_VERSION"), app.client.base_url());
            println!();
            println!("Try:");
            println!("  likebot stats");
            println!("  likebot tasks list");
            println!("  likebot --help");
        }
        Landing::Login => {
            println!("Not logged in to {}", app.client.base_url());
            println!();
            println!("Log in with:");
            println!("  likebot auth login <username>");
        }
    }
    Ok(())
}

// ============================================
// AUTH
// ============================================

async fn auth(app: &App, cmd: AuthCommand) -> Result<()> {
    let service = AuthService::new(app.client.clone());

    match cmd {
        AuthCommand::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ").await?,
            };
            let user = service.login(&username, &password).await?;
            app.message(&user, format!("Logged in as {} ({})", user.username, user.role))?;
            if !user.is_verified {
                eprintln!("Note: this user is not verified yet; most commands will be refused.");
            }
        }
        AuthCommand::Logout => {
            service.logout().await?;
            println!("Logged out");
        }
        AuthCommand::Register {
            username,
            password,
            role,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ").await?,
            };
            let user = service
                .register(&RegisterRequest {
                    username,
                    password,
                    role,
                })
                .await?;
            app.message(
                &user,
                format!(
                    "Registered {} ({}). An admin must verify the user before it can log in.",
                    user.username, user.role
                ),
            )?;
        }
        AuthCommand::Whoami => {
            app.require(Access::Authenticated).await?;
            let user = service.me().await?;
            app.emit(&user, || {
                println!("Username: {}", user.username);
                println!("Role:     {}", user.role);
                println!("Verified: {}", yes_no(user.is_verified));
            })?;
        }
    }
    Ok(())
}

// ============================================
// ACCOUNTS
// ============================================

async fn accounts(app: &App, cmd: AccountsCommand) -> Result<()> {
    app.require(Access::Authenticated).await?;
    let service = app.accounts();

    match cmd {
        AccountsCommand::List { phone, proxy } => {
            let all = service.list(phone.as_deref()).await?;
            let shown: Vec<&Account> = match proxy.as_deref() {
                Some(name) => filter_by_proxy(&all, name),
                None => all.iter().collect(),
            };
            app.emit(&shown, || print_accounts(&shown))?;
        }
        AccountsCommand::Get { phone } => {
            let account = service.get(&phone).await?;
            app.emit(&account, || print_accounts(&[&account]))?;
        }
        AccountsCommand::Login {
            phone,
            password,
            session_name,
            notes,
        } => {
            login_account(
                app,
                LoginStart {
                    phone_number: phone,
                    password,
                    session_name,
                    notes,
                },
            )
            .await?;
        }
        AccountsCommand::Update {
            phone,
            session_name,
            notes,
            status,
            proxies,
        } => {
            let update = AccountUpdate {
                session_name,
                notes,
                status: status.map(|s| AccountStatus::from(s.to_ascii_uppercase())),
                proxy_names: (!proxies.is_empty()).then_some(proxies),
            };
            let response = service.update(&phone, &update).await?;
            app.message(&response, or_default(&response.message, "Account updated"))?;
        }
        AccountsCommand::Delete { phones } => {
            let report = service.delete_many(phones, app.concurrency()).await;
            print_bulk_report("Deleted", &report);
            if report.failure_count() > 0 {
                bail!("{} of {} deletions failed", report.failure_count(), report.items.len());
            }
        }
        AccountsCommand::BulkDelete { phones } => {
            let response = service.bulk_delete(&phones).await?;
            app.emit(&response, || print_bulk_response(&response))?;
        }
        AccountsCommand::Validate { phone } => {
            let response = service.validate(&phone).await?;
            app.message(&response, or_default(&response.message, "Account is valid"))?;
        }
        AccountsCommand::IndexChannels { phone } => {
            let result = service.index_channels(&phone).await?;
            app.emit(&result, || {
                println!(
                    "{} ({} channels indexed)",
                    result.message.as_deref().unwrap_or("Channels indexed"),
                    result.channels_indexed
                )
            })?;
        }
        AccountsCommand::Password { phone } => {
            let result = service.password(&phone).await?;
            app.emit(&result, || match (&result.password, result.has_password) {
                (Some(password), true) => println!("{}: {}", result.phone_number, password),
                _ => println!("{} has no password set", result.phone_number),
            })?;
        }
        AccountsCommand::AutoAssignProxies { dry_run } => {
            let all = service.list(None).await?;
            let proxies = app.proxies().list(&ProxyFilter::default()).await?;

            if dry_run {
                let plan = likebot::services::accounts::plan_proxy_assignment(&all, &proxies);
                let rows: Vec<Vec<String>> = plan
                    .iter()
                    .map(|(phone, proxy)| vec![phone.clone(), proxy.clone()])
                    .collect();
                app.emit(&plan, || print_table(&["Account", "Proxy"], &rows))?;
                return Ok(());
            }

            let report = service
                .auto_assign_proxies(&all, &proxies, app.concurrency())
                .await;
            if report.is_empty() {
                println!("No accounts without a proxy, or no active proxies");
                return Ok(());
            }
            for (phone, proxy) in report.succeeded() {
                println!("{} -> {}", phone, proxy);
            }
            print_bulk_report("Assigned", &report);
        }
        AccountsCommand::Import { path, dry_run } => {
            let parsed = AccountCsvImporter::new().parse_file(&path)?;
            print_parse_problems(parsed.rows_skipped, &parsed.errors);

            if dry_run {
                let shown: Vec<&Account> = parsed.rows.iter().collect();
                app.emit(&shown, || print_accounts(&shown))?;
                return Ok(());
            }

            let response = import_accounts(&service, &parsed.rows).await?;
            app.emit(&response, || print_bulk_response(&response))?;
        }
    }
    Ok(())
}

/// Interactive Telegram login: codes are read from stdin, `cancel` or
/// Ctrl-C stops the attempt
/// Background tasks that must not outlive the command that spawned them
#[derive(Default)]
struct AbortOnDrop(Vec<tokio::task::JoinHandle<()>>);

impl AbortOnDrop {
    fn push(&mut self, handle: tokio::task::JoinHandle<()>) {
        self.0.push(handle);
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

async fn login_account(app: &App, request: LoginStart) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::channel(8);
    let driver = LoginDriver::new(app.accounts(), app.config.login.policy()).with_events(event_tx);

    let stdin_tx = input_tx.clone();
    let mut input_tasks = AbortOnDrop::default();
    input_tasks.push(tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            let input = if line.eq_ignore_ascii_case("cancel") {
                LoginInput::Cancel
            } else {
                LoginInput::Code(line.to_string())
            };
            if stdin_tx.send(input).await.is_err() {
                break;
            }
        }
    }));
    input_tasks.push(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = input_tx.send(LoginInput::Cancel).await;
        }
    }));

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                LoginEvent::SessionStarted { session_id } => {
                    tracing::debug!(session_id = %session_id, "Login session started");
                }
                LoginEvent::CodeRequested { message } => {
                    println!(
                        "{}",
                        message.unwrap_or_else(|| "Verification code sent to Telegram".to_string())
                    );
                    print!("Enter code (or 'cancel'): ");
                    let _ = tokio::io::stdout().flush().await;
                }
                LoginEvent::Progress { message } => println!("{}", message),
                LoginEvent::Error { message } => eprintln!("{}", message),
                LoginEvent::Finished(_) => {}
            }
        }
    });

    let outcome = driver.run(request, input_rx).await;
    // Ctrl-C goes back to the default handler from here on
    drop(input_tasks);
    drop(driver);
    let _ = printer.await;

    if outcome.is_success() {
        println!("{}", outcome.message());
        if outcome.needs_refresh() {
            let all = app.accounts().list(None).await?;
            print_accounts(&all.iter().collect::<Vec<_>>());
        }
        Ok(())
    } else {
        bail!(outcome.message())
    }
}

// ============================================
// POSTS
// ============================================

async fn posts(app: &App, cmd: PostsCommand) -> Result<()> {
    app.require(Access::Authenticated).await?;
    let service = app.posts();

    match cmd {
        PostsCommand::List {
            post_id,
            chat_id,
            validated,
        } => {
            let filter = PostFilter {
                post_id,
                chat_id,
                validated_only: validated.then_some(true),
            };
            let posts = service.list(&filter).await?;
            app.emit(&posts, || {
                let rows: Vec<Vec<String>> = posts
                    .iter()
                    .map(|p| {
                        vec![
                            opt(&p.post_id),
                            p.message_link.clone(),
                            opt(&p.chat_id),
                            opt(&p.message_id),
                            yes_no(p.is_validated()).to_string(),
                        ]
                    })
                    .collect();
                print_table(&["ID", "Link", "Chat", "Message", "Validated"], &rows);
            })?;
        }
        PostsCommand::Get { post_id } => {
            let post = service.get(post_id).await?;
            app.emit(&post, || {
                println!("ID:        {}", opt(&post.post_id));
                println!("Link:      {}", post.message_link);
                println!("Chat:      {}", opt(&post.chat_id));
                println!("Message:   {}", opt(&post.message_id));
                println!("Validated: {}", yes_no(post.is_validated()));
            })?;
        }
        PostsCommand::Create { link } => {
            let created = service.create(&link).await?;
            app.message(&created, format!("Created post {}", created.post_id))?;
        }
        PostsCommand::Update {
            post_id,
            link,
            chat_id,
            message_id,
        } => {
            let update = PostUpdate {
                message_link: link,
                chat_id,
                message_id,
            };
            let response = service.update(post_id, &update).await?;
            app.message(&response, or_default(&response.message, "Post updated"))?;
        }
        PostsCommand::Delete { post_ids } => {
            if let [post_id] = post_ids[..] {
                let response = service.delete(post_id).await?;
                app.message(&response, or_default(&response.message, "Post deleted"))?;
            } else {
                let response = service.bulk_delete(&post_ids).await?;
                app.emit(&response, || print_bulk_response(&response))?;
            }
        }
        PostsCommand::Validate { post_id } => {
            let result = service.validate(post_id).await?;
            app.emit(&result, || {
                let text = result
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Post validated");
                println!("{}", text);
            })?;
        }
        PostsCommand::Import { path } => {
            let text = read_file(&path)?;
            let response = import_posts(&service, &text).await?;
            app.emit(&response, || print_bulk_response(&response))?;
        }
    }
    Ok(())
}

// ============================================
// TASKS
// ============================================

async fn tasks(app: &App, cmd: TasksCommand) -> Result<()> {
    app.require(Access::Authenticated).await?;
    let service = app.tasks();

    match cmd {
        TasksCommand::List { status, name } => {
            let tasks = service
                .list(&TaskFilter {
                    task_id: None,
                    status,
                    name,
                })
                .await?;
            app.emit(&tasks, || {
                let rows: Vec<Vec<String>> = tasks
                    .iter()
                    .map(|t| {
                        vec![
                            opt(&t.task_id),
                            t.name.clone(),
                            opt(&t.status),
                            t.action.to_string(),
                            t.post_ids.len().to_string(),
                            t.accounts.len().to_string(),
                        ]
                    })
                    .collect();
                print_table(&["ID", "Name", "Status", "Action", "Posts", "Accounts"], &rows);
            })?;
        }
        TasksCommand::Get { task_id } => {
            let task = service.get(task_id).await?;
            app.emit(&task, || {
                println!("ID:          {}", opt(&task.task_id));
                println!("Name:        {}", task.name);
                println!("Description: {}", opt(&task.description));
                println!("Status:      {}", opt(&task.status));
                println!("Action:      {}", task.action);
                println!("Posts:       {:?}", task.post_ids);
                println!("Accounts:    {}", task.accounts.join(", "));
                println!("Created:     {}", opt(&task.created_at));
            })?;
        }
        TasksCommand::Create(args) => create_task(app, args).await?,
        TasksCommand::Update {
            task_id,
            name,
            description,
        } => {
            let update = TaskUpdate {
                name,
                description,
                ..Default::default()
            };
            let response = service.update(task_id, &update).await?;
            app.message(&response, or_default(&response.message, "Task updated"))?;
        }
        TasksCommand::Delete { task_id } => {
            let response = service.delete(task_id).await?;
            app.message(&response, or_default(&response.message, "Task deleted"))?;
        }
        TasksCommand::Start { task_id } => {
            let response = service.start(task_id).await?;
            app.message(&response, or_default(&response.message, "Task started"))?;
        }
        TasksCommand::Pause { task_id } => {
            let response = service.pause(task_id).await?;
            app.message(&response, or_default(&response.message, "Task paused"))?;
        }
        TasksCommand::Resume { task_id } => {
            let response = service.resume(task_id).await?;
            app.message(&response, or_default(&response.message, "Task resumed"))?;
        }
        TasksCommand::Status { task_id } => {
            let status = service.status(task_id).await?;
            app.message(&status, format!("Task {}: {}", status.task_id, status.status))?;
        }
        TasksCommand::Runs { task_id } => {
            let runs = service.runs(task_id).await?;
            app.emit(&runs, || {
                println!("Task {}: {} runs", runs.task_id, runs.total_runs);
                let rows: Vec<Vec<String>> = runs
                    .runs
                    .iter()
                    .map(|r| {
                        vec![
                            r.run_id.clone(),
                            r.status.clone(),
                            opt(&r.started_at),
                            opt(&r.finished_at),
                            r.event_count.to_string(),
                        ]
                    })
                    .collect();
                print_table(&["Run", "Status", "Started", "Finished", "Events"], &rows);
            })?;
        }
        TasksCommand::DeleteRun { task_id, run_id } => {
            let deleted = service.delete_run(task_id, &run_id).await?;
            app.message(
                &deleted,
                format!("{} ({} events removed)", deleted.message, deleted.events_deleted),
            )?;
        }
        TasksCommand::DeleteRuns { task_id } => {
            let deleted = service.delete_all_runs(task_id).await?;
            app.message(
                &deleted,
                format!(
                    "Deleted {} runs and {} events",
                    deleted.runs_deleted, deleted.events_deleted
                ),
            )?;
        }
        TasksCommand::AllRuns => {
            let all = service.all_runs().await?;
            app.emit(&all, || {
                println!("{} tasks, {} runs", all.total_tasks, all.total_runs);
                let rows: Vec<Vec<String>> = all
                    .tasks
                    .iter()
                    .map(|t| {
                        vec![
                            t.get("task_id").map(|v| v.to_string()).unwrap_or_default(),
                            t.get("task_name")
                                .or_else(|| t.get("name"))
                                .and_then(|v| v.as_str())
                                .unwrap_or("-")
                                .to_string(),
                            t.get("runs")
                                .and_then(|v| v.as_array())
                                .map(|r| r.len().to_string())
                                .unwrap_or_else(|| "-".to_string()),
                        ]
                    })
                    .collect();
                print_table(&["Task", "Name", "Runs"], &rows);
            })?;
        }
        TasksCommand::Report(args) => report(app, args).await?,
    }
    Ok(())
}

async fn create_task(app: &App, args: CreateTaskArgs) -> Result<()> {
    let mut draft = TaskDraft::new();

    let action = match (args.react, args.comment) {
        (_, Some(content)) => TaskAction::Comment { content },
        (Some(palette), None) => TaskAction::React { palette },
        (None, None) => TaskAction::default(),
    };
    draft.set_details(&args.name, args.description.as_deref(), action);
    draft.proceed()?;

    let mut links = args.posts.join("\n");
    if let Some(path) = &args.posts_file {
        links.push('\n');
        links.push_str(&read_file(path)?);
    }
    let posts = app.posts();
    let added = draft.stage_posts_bulk(&posts, &links).await?;
    if let Some(message) = added.duplicate_message() {
        eprintln!("{}", message);
    }
    draft.proceed()?;

    draft.load_accounts(&app.accounts()).await?;
    match args.random {
        Some(count) => {
            draft.set_mode(SelectionMode::Count);
            let picked = draft.select_random(count, &mut rand::rng());
            if picked < count {
                eprintln!("Only {} ACTIVE accounts available", picked);
            }
        }
        None => {
            draft.set_mode(SelectionMode::Manual);
            for phone in &args.accounts {
                let phone = likebot::services::accounts::normalize_phone(phone)
                    .unwrap_or_else(|| phone.clone());
                draft.toggle_account(&phone)?;
            }
        }
    }
    draft.validate_accounts()?;

    let existing = draft.posts().iter().filter(|p| p.is_existing()).count();
    tracing::info!(
        posts = draft.posts().len(),
        existing,
        accounts = draft.selected_accounts().len(),
        "Submitting task"
    );

    let created = draft.submit(&posts, &app.tasks()).await?;
    app.message(&created, format!("Created task {}", created.task_id))
}

async fn report(app: &App, args: ReportArgs) -> Result<()> {
    let query = ReportQuery {
        report_type: args.report_type,
        run_id: args.run,
    };
    let report = app.tasks().report(args.task_id, &query).await?;

    let mut view = ReportView::new(report);
    view.set_filter(ReportFilter {
        client: args.client,
        palette: args.palette,
        has_error: match (args.errors, args.successes) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        start_date: args.from,
        end_date: args.to,
    });
    let direction = if args.asc {
        SortDirection::Asc
    } else {
        SortDirection::Desc
    };
    view.set_sort(args.sort, direction);
    if args.page > 1 && !view.go_to_page(args.page) {
        bail!("Page {} is out of range (1-{})", args.page, view.total_pages().max(1));
    }

    if app.format == OutputFormat::Json {
        let events: Vec<_> = view.filtered().collect();
        let body = serde_json::json!({
            "stats": view.stats(),
            "total": view.filtered_len(),
            "events": events,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let stats = view.stats();
    println!("Task {} report", args.task_id);
    println!("  Events:        {}", stats.total_events);
    println!("  Clients:       {}", stats.unique_clients);
    println!("  Positive:      {}", stats.positive_reactions);
    println!("  Negative:      {}", stats.negative_reactions);
    println!("  Errors:        {}", stats.error_count);
    println!("  Success rate:  {:.1}%", stats.success_rate);
    println!();

    if !view.filter().is_empty() {
        println!("{} of {} events match the filter", view.filtered_len(), stats.total_events);
    }
    let rows: Vec<Vec<String>> = view
        .page_events()
        .into_iter()
        .map(|e| {
            vec![
                format_timestamp(e.datetime),
                format_phone(&e.client),
                opt(&e.palette),
                e.error_text().unwrap_or_else(|| "ok".to_string()),
            ]
        })
        .collect();
    print_table(&["Time", "Client", "Palette", "Result"], &rows);

    if view.total_pages() > 1 {
        let pages: Vec<String> = view
            .visible_pages()
            .into_iter()
            .map(|p| {
                if p == view.page() {
                    format!("[{}]", p)
                } else {
                    p.to_string()
                }
            })
            .collect();
        println!();
        println!("Page {} of {}: {}", view.page(), view.total_pages(), pages.join(" "));
    }
    Ok(())
}

// ============================================
// CHANNELS
// ============================================

async fn channels(app: &App, cmd: ChannelsCommand) -> Result<()> {
    app.require(Access::Authenticated).await?;
    let service = ChannelsService::new(app.client.clone());

    match cmd {
        ChannelsCommand::List { chat_id, tag, name } => {
            let channels = service.list(&ChannelFilter { chat_id, tag, name }).await?;
            app.emit(&channels, || {
                let rows: Vec<Vec<String>> = channels
                    .iter()
                    .map(|c| {
                        vec![
                            c.chat_id.to_string(),
                            c.channel_name.clone(),
                            yes_no(c.is_private).to_string(),
                            yes_no(c.has_enabled_reactions).to_string(),
                            c.tags.join(","),
                        ]
                    })
                    .collect();
                print_table(&["Chat", "Name", "Private", "Reactions", "Tags"], &rows);
            })?;
        }
        ChannelsCommand::Get { chat_id } => {
            let channel = service.get(chat_id).await?;
            app.emit(&channel, || {
                println!("Chat:        {}", channel.chat_id);
                println!("Name:        {}", channel.channel_name);
                println!("Private:     {}", yes_no(channel.is_private));
                println!("Reactions:   {}", yes_no(channel.has_enabled_reactions));
                println!(
                    "Subscribers only: {}",
                    yes_no(channel.reactions_only_for_subscribers)
                );
                println!("Discussion:  {}", opt(&channel.discussion_chat_id));
                println!("Tags:        {}", channel.tags.join(", "));
            })?;
        }
        ChannelsCommand::Create { chat_id, fields } => {
            let response = service.create(chat_id, &fields.fields()).await?;
            app.message(&response, or_default(&response.message, "Channel created"))?;
        }
        ChannelsCommand::Update { chat_id, fields } => {
            let response = service.update(chat_id, &fields.fields()).await?;
            app.message(&response, or_default(&response.message, "Channel updated"))?;
        }
        ChannelsCommand::Delete { chat_id } => {
            let response = service.delete(chat_id).await?;
            app.message(&response, or_default(&response.message, "Channel deleted"))?;
        }
        ChannelsCommand::Stats => {
            let stats = service.stats().await?;
            app.emit(&stats, || {
                println!("Channels:      {}", stats.total_channels);
                println!("  Private:     {}", stats.private_channels);
                println!("  Public:      {}", stats.public_channels);
                println!("  Reactions:   {}", stats.channels_with_reactions);
                let mut tags: Vec<_> = stats.tag_distribution.iter().collect();
                tags.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
                for (tag, count) in tags {
                    println!("  #{}: {}", tag, count);
                }
            })?;
        }
        ChannelsCommand::PostCounts => {
            let counts = service.with_post_counts().await?;
            app.emit(&counts, || {
                let rows: Vec<Vec<String>> = counts
                    .iter()
                    .map(|c| {
                        vec![
                            c.channel.chat_id.to_string(),
                            c.channel.channel_name.clone(),
                            c.post_count.to_string(),
                        ]
                    })
                    .collect();
                print_table(&["Chat", "Name", "Posts"], &rows);
            })?;
        }
    }
    Ok(())
}

// ============================================
// PROXIES
// ============================================

async fn proxies(app: &App, cmd: ProxiesCommand) -> Result<()> {
    app.require(Access::Authenticated).await?;
    let service = app.proxies();

    match cmd {
        ProxiesCommand::List { name, active_only } => {
            let filter = ProxyFilter {
                proxy_name: name,
                active_only: active_only.then_some(true),
            };
            let proxies = service.list(&filter).await?;
            app.emit(&proxies, || {
                let rows: Vec<Vec<String>> = proxies
                    .iter()
                    .map(|p| {
                        vec![
                            p.proxy_name.clone(),
                            p.proxy_type.clone(),
                            format!("{}:{}", p.host, p.port),
                            yes_no(p.is_active).to_string(),
                            p.load().to_string(),
                        ]
                    })
                    .collect();
                print_table(&["Name", "Type", "Address", "Active", "Accounts"], &rows);
            })?;
        }
        ProxiesCommand::Get { name } => {
            let proxy = service.get(&name).await?;
            app.emit(&proxy, || {
                println!("Name:     {}", proxy.proxy_name);
                println!("Type:     {}", proxy.proxy_type);
                println!("Address:  {}:{}", proxy.host, proxy.port);
                println!("Username: {}", opt(&proxy.username));
                println!("Active:   {}", yes_no(proxy.is_active));
                println!("Accounts: {}", proxy.load());
                println!("Notes:    {}", opt(&proxy.notes));
            })?;
        }
        ProxiesCommand::Create {
            name,
            host,
            port,
            proxy_type,
            username,
            password,
            inactive,
            notes,
        } => {
            let proxy = NewProxy {
                proxy_name: name,
                proxy_type,
                host,
                port,
                username,
                password,
                is_active: Some(!inactive),
                notes,
            };
            let response = service.create(&proxy).await?;
            app.message(&response, or_default(&response.message, "Proxy created"))?;
        }
        ProxiesCommand::Update {
            name,
            proxy_type,
            host,
            port,
            username,
            password,
            active,
            notes,
        } => {
            let update = ProxyUpdate {
                proxy_type,
                host,
                port,
                username,
                password,
                is_active: active,
                notes,
            };
            let response = service.update(&name, &update).await?;
            app.message(&response, or_default(&response.message, "Proxy updated"))?;
        }
        ProxiesCommand::Delete { name } => {
            let response = service.delete(&name).await?;
            app.message(&response, or_default(&response.message, "Proxy deleted"))?;
        }
        ProxiesCommand::Stats => {
            let stats = service.stats().await?;
            app.emit(&stats, || {
                println!("Proxies:   {}", stats.total_proxies);
                println!("  Active:   {}", stats.active_proxies);
                println!("  Inactive: {}", stats.inactive_proxies);
                println!("Accounts:  {}", stats.total_connected_accounts);
                if let Some(least) = &stats.least_used_proxy {
                    println!("Least used: {} ({})", least.proxy_name, least.connected_accounts);
                }
                if let Some(most) = &stats.most_used_proxy {
                    println!("Most used:  {} ({})", most.proxy_name, most.connected_accounts);
                }
            })?;
        }
        ProxiesCommand::Test { name, url, timeout } => {
            let result = service.test(&name, url.as_deref(), timeout).await?;
            app.message(
                &result,
                format!(
                    "{} via {}: HTTP {} from {} in {:.0} ms",
                    result.proxy_name,
                    result.endpoint,
                    result.status_code,
                    result.target_url,
                    result.latency_ms
                ),
            )?;
        }
        ProxiesCommand::Import {
            path,
            proxy_type,
            base_name,
            dry_run,
        } => {
            let options = ProxyImportOptions {
                proxy_type,
                base_name,
                dry_run: Some(dry_run),
            };
            let result = service.import_file(&path, &options).await?;
            app.emit(&result, || {
                println!("{}", result.message);
                match result.imported {
                    Some(imported) => println!("Imported {} of {}", imported, result.total),
                    None => println!("{} proxies found", result.total),
                }
                for skipped in &result.skipped {
                    println!("  skipped {}: {}", skipped.proxy_name, skipped.reason);
                }
                for error in &result.errors {
                    eprintln!("  error: {}", error);
                }
            })?;
        }
        ProxiesCommand::ImportCsv {
            path,
            proxy_type,
            inactive,
            dry_run,
        } => {
            let parsed = ProxyCsvImporter::new()
                .with_default_type(&proxy_type)
                .with_active(!inactive)
                .parse_file(&path)?;
            print_parse_problems(parsed.rows_skipped, &parsed.errors);

            if dry_run {
                let rows: Vec<Vec<String>> = parsed
                    .rows
                    .iter()
                    .map(|p| {
                        vec![
                            p.proxy_name.clone(),
                            p.proxy_type.clone(),
                            format!("{}:{}", p.host, p.port),
                        ]
                    })
                    .collect();
                print_table(&["Name", "Type", "Address"], &rows);
                return Ok(());
            }

            let items = import_proxies(&service, parsed.rows, app.concurrency()).await;
            for item in items.iter().filter(|i| i.status != ImportStatus::Success) {
                eprintln!("  {}: {}", item.name, item.message);
            }
            println!(
                "Created {}, skipped {}, failed {}",
                count_status(&items, ImportStatus::Success),
                count_status(&items, ImportStatus::Skipped),
                count_status(&items, ImportStatus::Error)
            );
        }
    }
    Ok(())
}

// ============================================
// PALETTES
// ============================================

async fn palettes(app: &App, cmd: PalettesCommand) -> Result<()> {
    app.require(Access::Authenticated).await?;
    let service = PalettesService::new(app.client.clone());

    match cmd {
        PalettesCommand::List => {
            let palettes = service.list().await;
            app.emit(&palettes, || {
                let rows: Vec<Vec<String>> = palettes
                    .iter()
                    .map(|p| {
                        vec![
                            p.palette_name.clone(),
                            p.emojis.join(" "),
                            yes_no(p.ordered).to_string(),
                            opt(&p.description),
                        ]
                    })
                    .collect();
                print_table(&["Name", "Emojis", "Ordered", "Description"], &rows);
            })?;
        }
        PalettesCommand::Get { name } => {
            let palette = service.get(&name).await?;
            app.emit(&palette, || {
                println!("Name:        {}", palette.palette_name);
                println!("Emojis:      {}", palette.emojis.join(" "));
                println!("Ordered:     {}", yes_no(palette.ordered));
                println!("Description: {}", opt(&palette.description));
            })?;
        }
        PalettesCommand::Create {
            name,
            emojis,
            ordered,
            description,
        } => {
            let palette = Palette {
                palette_name: name,
                emojis,
                ordered,
                description,
                created_at: None,
                updated_at: None,
            };
            let response = service.create(&palette).await?;
            app.message(&response, or_default(&response.message, "Palette created"))?;
        }
        PalettesCommand::Update {
            name,
            emojis,
            ordered,
            description,
        } => {
            let update = PaletteUpdate {
                emojis: (!emojis.is_empty()).then_some(emojis),
                ordered,
                description,
            };
            let response = service.update(&name, &update).await?;
            app.message(&response, or_default(&response.message, "Palette updated"))?;
        }
        PalettesCommand::Delete { name } => {
            let response = service.delete(&name).await?;
            app.message(&response, or_default(&response.message, "Palette deleted"))?;
        }
    }
    Ok(())
}

// ============================================
// USERS
// ============================================

async fn users(app: &App, cmd: UsersCommand) -> Result<()> {
    app.require(Access::Admin).await?;
    let service = UsersService::new(app.client.clone());

    match cmd {
        UsersCommand::List => {
            let users = service.list().await?;
            app.emit(&users, || {
                let rows: Vec<Vec<String>> = users
                    .iter()
                    .map(|u| {
                        vec![
                            u.username.clone(),
                            u.role.to_string(),
                            yes_no(u.is_verified).to_string(),
                            opt(&u.created_at),
                        ]
                    })
                    .collect();
                print_table(&["Username", "Role", "Verified", "Created"], &rows);
            })?;
        }
        UsersCommand::SetRole { username, role } => {
            let result = service.set_role(&username, role).await?;
            app.message(&result, format!("{} is now {}", username, role))?;
        }
        UsersCommand::Verify { username, revoke } => {
            let result = service.set_verified(&username, !revoke).await?;
            let state = if revoke { "unverified" } else { "verified" };
            app.message(&result, format!("{} is now {}", username, state))?;
        }
        UsersCommand::Delete { username } => {
            let result = service.delete(&username).await?;
            app.message(&result, format!("Deleted {}", username))?;
        }
    }
    Ok(())
}

// ============================================
// STATS & LOGS
// ============================================

async fn stats(app: &App) -> Result<()> {
    app.require(Access::Authenticated).await?;
    let stats = StatsService::new(app.client.clone()).get().await?;

    app.emit(&stats, || {
        println!("LikeBot v{} at {}", env!("CARGO_PKG_VERSION"), app.client.base_url());
        println!();
        println!("Accounts: {}", stats.accounts.total);
        println!(
            "Posts:    {} ({} validated, {} pending)",
            stats.posts.total, stats.posts.validated, stats.posts.unvalidated
        );
        println!("Tasks:    {}", stats.tasks.total);
        let mut by_status: Vec<_> = stats.tasks.by_status.iter().collect();
        by_status.sort();
        for (status, count) in by_status {
            println!("  {:<10} {}", status, count);
        }
    })
}

async fn tail_logs(app: &App, cmd: LogsCommand) -> Result<()> {
    app.require(Access::Authenticated).await?;
    let LogsCommand::Tail { file, tail, buffer } = cmd;

    let base = logs::ws_base(&app.config.api.url, app.config.api.logs_ws_url.as_deref());
    let url = logs::stream_url(&base, file.as_deref(), tail)?;
    let mut stream = LogStream::connect(&url).await?;
    let mut lines = LogBuffer::new(buffer);
    let live = app.format == OutputFormat::Table;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = stream.next_event() => match event {
                Some(LogEvent::Open) => eprintln!("Connected to {}", url),
                Some(LogEvent::Line(line)) => {
                    if live {
                        println!("{}", line);
                    }
                    lines.push(line);
                }
                Some(LogEvent::Error(message)) => eprintln!("Log stream error: {}", message),
                Some(LogEvent::Close { code, reason }) => {
                    if reason.is_empty() {
                        eprintln!("Log stream closed ({})", code);
                    } else {
                        eprintln!("Log stream closed ({}): {}", code, reason);
                    }
                    break;
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                interrupted = true;
                break;
            }
        }
    }
    if interrupted {
        stream.close().await;
    }

    if !live {
        let collected: Vec<&str> = lines.lines().collect();
        println!("{}", serde_json::to_string_pretty(&collected)?);
    }
    Ok(())
}

// ============================================
// OUTPUT HELPERS
// ============================================

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("No results");
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    println!("{}", format_row(headers.iter().copied(), &widths));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 3 * (widths.len() - 1)));
    for row in rows {
        println!("{}", format_row(row.iter().map(String::as_str), &widths));
    }
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn print_accounts(accounts: &[&Account]) {
    let rows: Vec<Vec<String>> = accounts
        .iter()
        .map(|a| {
            vec![
                format_phone(&a.phone_number),
                opt(&a.status),
                opt(&a.session_name),
                a.proxy_names.join(","),
                opt(&a.notes),
            ]
        })
        .collect();
    print_table(&["Phone", "Status", "Session", "Proxies", "Notes"], &rows);
}

fn print_bulk_response(response: &BulkResponse) {
    if let Some(message) = &response.message {
        println!("{}", message);
    }
    let rows: Vec<Vec<String>> = response
        .results
        .iter()
        .map(|r| {
            let key = r
                .phone_number
                .clone()
                .or_else(|| r.post_id.map(|id| id.to_string()))
                .unwrap_or_else(|| "-".to_string());
            let detail = r.error.clone().or_else(|| r.message.clone()).unwrap_or_default();
            vec![key, r.status.clone(), detail]
        })
        .collect();
    print_table(&["Item", "Status", "Detail"], &rows);
}

fn print_bulk_report<T>(verb: &str, report: &BulkReport<String, T>) {
    for line in report.error_lines() {
        eprintln!("  {}", line);
    }
    println!(
        "{} {} of {}",
        verb,
        report.success_count(),
        report.items.len()
    );
}

fn print_parse_problems(skipped: usize, errors: &[String]) {
    for error in errors {
        eprintln!("  {}", error);
    }
    if skipped > 0 {
        eprintln!("Skipped {} rows", skipped);
    }
}

fn opt<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn or_default<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.is_empty() {
        fallback
    } else {
        message
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

async fn prompt(label: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        bail!("No input given");
    }
    Ok(value)
}
