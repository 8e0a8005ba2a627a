use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Args, Parser, Subcommand};
use taskdesk::config::{ClientConfig, ConfigError};
use taskdesk::forms::{FieldErrors, SignInForm, SignUpForm, TaskForm};
use taskdesk::net::types::Task;
use taskdesk::net::{ApiClient, ApiError};
use taskdesk::state::{
    FileTokenStore, Navigator, NullTokenStore, Route, SessionController, SessionError, TaskList, TokenStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Invalid(#[from] FieldErrors),
    #[error("not signed in; run `taskdesk signin` first")]
    NotSignedIn,
    #[error("cannot reach the backend at {0}; stored session kept, try again later")]
    Unreachable(String),
}

#[derive(Parser, Debug)]
#[command(name = "taskdesk", about = "Task manager client")]
struct Cli {
    /// Backend base URL. Overrides `TASKDESK_API_URL`.
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and sign in.
    Signup(SignUpArgs),
    /// Sign in with an existing account.
    Signin(CredentialArgs),
    /// Forget the stored session.
    Signout,
    /// Show the signed-in user.
    Whoami,
    Tasks(TasksCommand),
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(long)]
    email: String,

    #[arg(long, env = "TASKDESK_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct SignUpArgs {
    #[command(flatten)]
    credentials: CredentialArgs,

    /// Defaults to `--password`.
    #[arg(long)]
    confirm_password: Option<String>,
}

#[derive(Args, Debug)]
struct TasksCommand {
    #[command(subcommand)]
    command: TasksSubcommand,
}

#[derive(Subcommand, Debug)]
enum TasksSubcommand {
    List {
        #[arg(long, conflicts_with = "done")]
        open: bool,
        #[arg(long)]
        done: bool,
    },
    Show {
        id: i64,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Delete {
        id: i64,
    },
    /// Mark a task completed.
    Done {
        id: i64,
    },
    /// Mark a task not completed.
    Undo {
        id: i64,
    },
}

/// Remembers where the session last sent the user.
#[derive(Default)]
struct CliNavigator {
    last: Mutex<Option<Route>>,
}

impl CliNavigator {
    fn last(&self) -> Option<Route> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for CliNavigator {
    fn navigate(&self, route: Route) {
        tracing::debug!(?route, "navigate");
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(route);
    }
}

struct Runtime {
    api_url: String,
    session: Arc<SessionController>,
    tasks: TaskList,
    navigator: Arc<CliNavigator>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskdesk=warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_url(url)?;
    }
    let rt = connect(&config).await?;

    match cli.command {
        Command::Signup(args) => {
            let form = SignUpForm {
                confirm_password: args
                    .confirm_password
                    .unwrap_or_else(|| args.credentials.password.clone()),
                email: args.credentials.email,
                password: args.credentials.password,
            };
            let user = rt.session.sign_up(&form.validate()?).await?;
            println!("Account created. Signed in as {}", user.email);
            Ok(())
        }
        Command::Signin(args) => {
            let form = SignInForm { email: args.email, password: args.password };
            let user = rt.session.sign_in(&form.validate()?).await?;
            println!("Signed in as {}", user.email);
            Ok(())
        }
        Command::Signout => {
            rt.session.sign_out();
            println!("Signed out");
            Ok(())
        }
        Command::Whoami => {
            rt.require_reachable()?;
            let session = rt.session.snapshot();
            match session.current_user() {
                Some(user) => println!("{} ({}) since {}", user.email, user.id, user.created_at.format("%Y-%m-%d")),
                None => println!("not signed in"),
            }
            Ok(())
        }
        Command::Tasks(tasks) => {
            let result = run_tasks(&rt, tasks).await;
            if result.is_err() && rt.navigator.last() == Some(Route::SignIn) {
                eprintln!("session expired; run `taskdesk signin`");
            }
            result
        }
    }
}

async fn connect(config: &ClientConfig) -> Result<Runtime, CliError> {
    let tokens: Arc<dyn TokenStore> = match &config.token_path {
        Some(path) => Arc::new(FileTokenStore::new(path)),
        None => {
            tracing::warn!("no config directory; session will not be remembered");
            Arc::new(NullTokenStore)
        }
    };
    let client = Arc::new(ApiClient::new(config, tokens.clone())?);
    let navigator = Arc::new(CliNavigator::default());
    let session = Arc::new(SessionController::start(client.clone(), tokens, navigator.clone()).await);
    let tasks = TaskList::new(client, session.clone());
    Ok(Runtime { api_url: config.api_url.clone(), session, tasks, navigator })
}

impl Runtime {
    /// Bootstrap could not verify the stored token.
    fn require_reachable(&self) -> Result<(), CliError> {
        if self.session.has_unverified_token() {
            return Err(CliError::Unreachable(self.api_url.clone()));
        }
        Ok(())
    }
}

async fn run_tasks(rt: &Runtime, cmd: TasksCommand) -> Result<(), CliError> {
    rt.require_reachable()?;
    if !rt.session.snapshot().is_authenticated() {
        return Err(CliError::NotSignedIn);
    }

    match cmd.command {
        TasksSubcommand::List { open, done } => {
            rt.tasks.refresh().await?;
            let state = rt.tasks.snapshot();
            let shown: Vec<&Task> = state
                .tasks
                .iter()
                .filter(|t| (!open || !t.completed) && (!done || t.completed))
                .collect();
            if shown.is_empty() {
                println!("no tasks");
            }
            for task in shown {
                print_task_line(task);
            }
            println!("{} open, {} completed", state.open_count(), state.completed_count());
        }
        TasksSubcommand::Show { id } => {
            let task = rt.tasks.get(id).await?;
            print_task_line(&task);
            if let Some(description) = &task.description {
                println!("    {description}");
            }
            println!("    created {}  updated {}", task.created_at.to_rfc3339(), task.updated_at.to_rfc3339());
        }
        TasksSubcommand::Create { title, description } => {
            let draft = TaskForm { title, description }.validate()?;
            let task = rt.tasks.create(&draft).await?;
            print_task_line(&task);
        }
        TasksSubcommand::Update { id, title, description } => {
            let draft = TaskForm { title, description }.validate()?;
            let task = rt.tasks.update(id, &draft).await?;
            print_task_line(&task);
        }
        TasksSubcommand::Delete { id } => {
            rt.tasks.delete(id).await?;
            println!("deleted task {id}");
        }
        TasksSubcommand::Done { id } => {
            let task = rt.tasks.set_completed(id, true).await?;
            print_task_line(&task);
        }
        TasksSubcommand::Undo { id } => {
            let task = rt.tasks.set_completed(id, false).await?;
            print_task_line(&task);
        }
    }
    Ok(())
}

fn print_task_line(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    println!("[{mark}] {:>4}  {}", task.id, task.title);
}
