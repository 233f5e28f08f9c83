use nestexec_client::list_containers;

use crate::cmd::ListArgs;
use crate::exit::{client_error, io_error, CliResult, SUCCESS};
use crate::output::{print_containers, OutputFormat};

pub fn run(args: ListArgs) -> CliResult<i32> {
    let ids = list_containers(&args.client.addr).map_err(|err| client_error("list failed", err))?;
    let format = args.format.unwrap_or_else(OutputFormat::default_for_stdout);
    print_containers(&ids, format).map_err(|err| io_error("write failed", err))?;
    Ok(SUCCESS)
}
