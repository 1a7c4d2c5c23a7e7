use std::time::Duration;

use clap::Parser;
use log::error;

use sourcequery::{Client, ClientOptions, EngineGeneration, SourceQueryError};

/// Query a Source or GoldSource game server.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address, `host[:port]`
    address: String,
    /// Per-packet timeout in milliseconds
    #[clap(short, long, default_value = "3000")]
    timeout: u64,
    /// The server runs a GoldSource engine
    #[clap(long)]
    goldsource: bool,
    /// Steam app ID of the game
    #[clap(long)]
    app_id: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), SourceQueryError> {
    env_logger::init();
    let args = Args::parse();

    let options = ClientOptions {
        timeout: Duration::from_millis(args.timeout),
        engine_generation: if args.goldsource {
            EngineGeneration::GoldSource
        } else {
            EngineGeneration::Source
        },
        app_id: args.app_id,
        ..Default::default()
    };
    let mut client = Client::new(&args.address, options).await?;

    println!("ping: {}", client.ping().await?);
    println!("{:#?}", client.info().await?);

    match client.players().await {
        Ok(players) => {
            for player in players.players {
                println!("{:>5} {:>8.0}s  {}", player.score, player.duration, player.name);
            }
        }
        Err(e) => error!("players query failed: {}", e),
    }

    match client.rules().await {
        Ok(rules) => {
            let mut rules: Vec<_> = rules.rules.into_iter().collect();
            rules.sort();
            for (name, value) in rules {
                println!("{} = {}", name, value);
            }
        }
        Err(e) => error!("rules query failed: {}", e),
    }

    client.close();
    Ok(())
}
