use nestexec_server::{Server, ServerConfig};

use crate::cmd::ServeArgs;
use crate::exit::{server_error, CliResult, SUCCESS};

pub fn run(_args: ServeArgs) -> CliResult<i32> {
    let server =
        Server::bind(ServerConfig::default()).map_err(|err| server_error("bind failed", err))?;
    eprintln!("nestexec listening on {}", server.local_addr());
    server.serve().map_err(|err| server_error("serve failed", err))?;
    Ok(SUCCESS)
}
