//! Start a server in-process, run one command through it, and print the
//! container's output.
//!
//! Run with:
//!   cargo run --example exec-once --features server,client -- uname -a

use nestexec::client::{Session, SessionConfig, SessionOptions};
use nestexec::server::{Server, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let cmd = argv.next().unwrap_or_else(|| "echo".to_string());
    let args: Vec<String> = argv.collect();

    let server = Server::bind(ServerConfig::with_addr("127.0.0.1:0"))?;
    let addr = server.local_addr().to_string();
    eprintln!("Serving on {addr}");
    server.spawn()?;

    let options = SessionOptions::exec(format!("example-{}", std::process::id()), cmd, args);
    Session::new(SessionConfig::with_addr(addr), options).run()?;
    Ok(())
}
