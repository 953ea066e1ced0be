pub mod serve;
pub mod token;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tourwow-api")]
#[command(about = "Schema-validated query API over the TourWow databases")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve {
        #[arg(long, env = "PORT", default_value_t = 3000, help = "Port to listen on")]
        port: u16,
        #[arg(long, default_value = "0.0.0.0", help = "Address to bind")]
        bind: String,
    },

    #[command(about = "Mint an HS256 token with the configured secret")]
    Token {
        #[arg(long, help = "Subject claim")]
        sub: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long, default_value_t = 24, help = "Lifetime in hours")]
        ttl_hours: i64,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, bind } => serve::run(&bind, port).await,
        Commands::Token { sub, username, role, ttl_hours } => token::run(sub, username, role, ttl_hours),
    }
}
