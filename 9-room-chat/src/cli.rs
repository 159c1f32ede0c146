use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::server::ChatConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat relay, accepting TCP connections.
    Server(ServerArgs),
    /// Connect to a relay and chat from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:12344")]
    pub listen: SocketAddr,

    /// Refuse connections whose id is already online instead of replacing the
    /// earlier connection's registration.
    #[arg(long)]
    pub reject_duplicate_ids: bool,
}

impl ServerArgs {
    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            reject_duplicate_ids: self.reject_duplicate_ids,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Id announced to the relay as the first line.
    #[arg(long)]
    pub id: String,

    /// Address of the relay to connect to.
    #[arg(long, default_value = "127.0.0.1:12344")]
    pub server: SocketAddr,
}
