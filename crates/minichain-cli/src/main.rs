use anyhow::Result;
use clap::{Parser, Subcommand};
use minichain_core::chain::Chain;
use minichain_core::constants::DEFAULT_DIFFICULTY;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "minichain-cli")]
#[command(about = "CLI client for the minimal proof-of-work chain")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine a couple of blocks locally, then demonstrate tamper evidence
    Demo {
        /// Leading zero hex characters required of every mined block hash
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: usize,
    },
    /// Submit a JSON payload to a node for mining
    Append {
        /// Node base URL (e.g. http://127.0.0.1:8080)
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        /// Payload as a JSON document
        #[arg(long)]
        data: String,
    },
    /// Print the node's chain head
    Head {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
    /// Print every block held by the node
    Show {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
    /// Ask the node whether its chain validates
    Validate {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
}

fn print_block(block: &minichain_core::Block) {
    println!("Block {}", block.index);
    println!("  timestamp:     {}", block.timestamp);
    println!("  data:          {}", block.data);
    println!("  previous hash: {}", block.previous_hash);
    println!("  nonce:         {}", block.nonce);
    println!("  hash:          {}", block.hash);
}

fn run_demo(difficulty: usize) -> Result<()> {
    let mut chain = Chain::with_difficulty(difficulty);

    println!("Mining block 1...");
    chain.append(json!({ "from": "Alice", "to": "Bob", "amount": 10 }))?;
    println!("Mining block 2...");
    chain.append(json!({ "from": "Bob", "to": "Charlie", "amount": 5 }))?;

    println!();
    for block in &chain.blocks {
        print_block(block);
        println!("{}", "-".repeat(40));
    }

    println!("chain valid: {}", chain.validate());

    // Tamper with a sealed payload; validation must notice.
    chain.blocks[1].data["amount"] = json!(999);
    println!("chain valid after tampering: {}", chain.validate());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo { difficulty } => run_demo(difficulty)?,
        Command::Append { node, data } => {
            let payload: Value = serde_json::from_str(&data)?;
            let client = reqwest::Client::new();
            let res = client
                .post(format!("{node}/blocks"))
                .json(&payload)
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await?;
            println!("status: {}", status);
            println!("{body}");
        }
        Command::Head { node } => {
            let body = reqwest::get(format!("{node}/chain/head")).await?.text().await?;
            println!("{body}");
        }
        Command::Show { node } => {
            let blocks: Vec<minichain_core::Block> =
                reqwest::get(format!("{node}/chain")).await?.json().await?;
            for block in &blocks {
                print_block(block);
                println!("{}", "-".repeat(40));
            }
        }
        Command::Validate { node } => {
            let body = reqwest::get(format!("{node}/chain/valid")).await?.text().await?;
            println!("{body}");
        }
    }
    Ok(())
}
