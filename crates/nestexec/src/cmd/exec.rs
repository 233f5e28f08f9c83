use nestexec_client::{Session, SessionOptions};
use tracing::debug;

use crate::cmd::{run_session, ExecArgs};
use crate::exit::CliResult;

pub fn run(args: ExecArgs) -> CliResult<i32> {
    debug!(
        container_id = %args.container_id,
        cmd = %args.cmd,
        tty = args.tty,
        interactive = args.interactive,
        "exec"
    );
    let options = SessionOptions::exec(args.container_id, args.cmd, args.args)
        .with_tty(args.tty)
        .with_interactive(args.interactive);
    let session = Session::new(args.client.session_config(), options);
    run_session(session, "exec failed")
}
