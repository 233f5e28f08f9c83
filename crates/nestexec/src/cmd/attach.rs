use nestexec_client::{Session, SessionOptions};

use crate::cmd::{run_session, AttachArgs};
use crate::exit::CliResult;

pub fn run(args: AttachArgs) -> CliResult<i32> {
    let options = SessionOptions::attach(args.container_id)
        .with_tty(args.tty)
        .with_interactive(args.interactive);
    let session = Session::new(args.client.session_config(), options);
    run_session(session, "attach failed")
}
