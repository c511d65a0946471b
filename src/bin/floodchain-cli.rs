#![forbid(unsafe_code)]
//! Command-line client for a FloodChain node.

use clap::{Parser, Subcommand};
use colored::*;
use floodchain::config::parse_host_port;
use floodchain::network::{send_message, Message, Peer, Reply};
use floodchain::transaction::{Amount, Transaction};
use floodchain::wallet::Wallet;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node to talk to, as host:port
    #[arg(long, global = true, default_value = "127.0.0.1:8333")]
    node: String,
    /// Seconds to wait for the node's reply
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates a wallet file
    NewWallet {
        /// Where to write the wallet
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Prints the address held in a wallet file
    Address { wallet: PathBuf },
    /// Queries the confirmed balance of an address
    Balance { address: String },
    /// Signs a transfer and submits it to the node
    Transact {
        /// Recipient address
        receiver: String,
        amount: Amount,
        #[arg(long, default_value = "0")]
        fee: Amount,
        #[arg(long, default_value = "")]
        message: String,
        /// Wallet of the sender
        #[arg(long)]
        wallet: PathBuf,
    },
    /// Tells the node about a peer
    Join { peer: String },
    /// Downloads the node's chain and prints a summary
    Clone,
    /// Asks the node to adopt a peer's chain if it is longer
    CloneFrom { peer: String },
    StartMining,
    StopMining,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout);

    let message = match cli.command {
        Commands::NewWallet { path, name } => {
            if path.exists() {
                return Err(format!("{} already exists", path.display()).into());
            }
            let wallet = Wallet::new(name);
            wallet.save(&path)?;
            println!("{}", "Wallet created".bright_green().bold());
            println!("  Address: {}", wallet.address.bright_yellow());
            println!("  File:    {}", path.display());
            return Ok(());
        }
        Commands::Address { wallet } => {
            println!("{}", Wallet::load(&wallet)?.address);
            return Ok(());
        }
        Commands::Balance { address } => Message::GetBalance(address),
        Commands::Transact {
            receiver,
            amount,
            fee,
            message,
            wallet,
        } => {
            let wallet = Wallet::load(&wallet)?;
            let mut tx = Transaction::new(wallet.address.clone(), receiver, amount, fee, message);
            tx.sign(&wallet)?;
            tx.validate()?;
            println!("Transaction {}", tx.hash().bright_cyan());
            Message::DoTransact(tx)
        }
        Commands::Join { peer } => Message::JoinNetwork(parse_peer(&peer)?),
        Commands::Clone => Message::CloneBlockchain,
        Commands::CloneFrom { peer } => Message::GetCloneChainFrom(parse_peer(&peer)?),
        Commands::StartMining => Message::StartMining,
        Commands::StopMining => Message::StopMining,
    };

    let reply = send_message(&cli.node, &message, timeout).await?;
    print_reply(&reply);
    if matches!(reply, Reply::Error(_)) {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_peer(value: &str) -> Result<Peer, Box<dyn std::error::Error>> {
    let (host, port) = parse_host_port(value)?;
    Ok(Peer::new(host, port))
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Ok => println!("{}", "Ok".bright_green()),
        Reply::Dup => println!("{}", "Dup (already known)".yellow()),
        Reply::Error(reason) => println!("{} {}", "Error:".bright_red().bold(), reason),
        Reply::Balance(amount) => println!("Balance: {}", amount.to_string().bright_green()),
        Reply::Chain(snapshot) => {
            println!("{}", "Blockchain".bright_cyan().bold());
            println!("  Height:     {}", snapshot.blocks.len());
            println!("  Difficulty: {}", snapshot.difficulty);
            if let Some(tip) = snapshot.blocks.last() {
                println!("  Tip:        {}", tip.hash.bright_yellow());
            }
            println!("  Peers:      {}", snapshot.peers.len());
            for peer in &snapshot.peers {
                println!("    {}", peer);
            }
            for (height, block) in snapshot.blocks.iter().enumerate() {
                println!(
                    "  #{:<4} {}  txs={} miner={}",
                    height,
                    block.hash.dimmed(),
                    block.transactions.len(),
                    block.miner
                );
            }
        }
    }
}
