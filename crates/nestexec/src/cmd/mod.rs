use clap::{Args, Subcommand};
use nestexec_client::{Session, SessionConfig, DEFAULT_ADDR};

use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

pub mod attach;
pub mod exec;
pub mod list;
pub mod serve;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch a command under a container id and attach to it.
    Exec(ExecArgs),
    /// Attach to an already launched container.
    Attach(AttachArgs),
    /// List live container ids.
    List(ListArgs),
    /// Run a server on 0.0.0.0:8888.
    Serve(ServeArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Exec(args) => exec::run(args),
        Command::Attach(args) => attach::run(args),
        Command::List(args) => list::run(args),
        Command::Serve(args) => serve::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Server address.
    #[arg(long, env = "NESTEXEC_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,
}

impl ClientArgs {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::with_addr(self.addr.clone())
    }
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Allocate terminal semantics: raw local input and resize forwarding.
    #[arg(long, short = 't')]
    pub tty: bool,
    /// Forward local stdin to the process.
    #[arg(long, short = 'i')]
    pub interactive: bool,
    #[command(flatten)]
    pub client: ClientArgs,
    /// Id to register the process under.
    pub container_id: String,
    /// Program to run.
    pub cmd: String,
    /// Arguments passed to the program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AttachArgs {
    #[arg(long, short = 't')]
    pub tty: bool,
    #[arg(long, short = 'i')]
    pub interactive: bool,
    #[command(flatten)]
    pub client: ClientArgs,
    /// Container to attach to.
    pub container_id: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    /// Output format. Default: table on a terminal, json otherwise.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {}

/// Run a session to completion, turning Ctrl-C into an interrupted outcome.
pub(crate) fn run_session(session: Session, context: &str) -> CliResult<i32> {
    let interrupt = session.interrupt_handle();
    ctrlc::set_handler(move || {
        interrupt.interrupt();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    session.run().map_err(|err| client_error(context, err))?;
    Ok(SUCCESS)
}
