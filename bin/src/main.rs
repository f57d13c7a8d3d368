//! The citrine ordering node binary.

use color_eyre::eyre;
use rand::RngCore;
use tracing::info;

use citrine_app::node::Node;
use citrine_app::transport::OrderingClient;
use citrine_cli::args::{Args, Commands};
use citrine_cli::cmd::submit::SubmitCmd;
use citrine_cli::config::{load_config, LoggingConfig};
use citrine_cli::logging;
use citrine_types::Transaction;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::new();
    let home_dir = args.get_home_dir()?;
    let config_file = args.get_config_file()?;

    match &args.command {
        Commands::Init(cmd) => {
            logging::init(&LoggingConfig::default())?;
            cmd.run(&home_dir, &config_file)?;
        }

        Commands::Start(_) => {
            let mut config = load_config(&config_file, None)?;

            if let Some(level) = &args.log_level {
                config.logging.log_level = level.clone();
            }
            if let Some(format) = args.log_format {
                config.logging.log_format = format;
            }

            let _guard = logging::init(&config.logging)?;
            Node::new(config, home_dir).run().await?;
        }

        Commands::Submit(cmd) => {
            logging::init(&LoggingConfig::default())?;
            submit(cmd, &config_file).await?;
        }
    }

    Ok(())
}

async fn submit(cmd: &SubmitCmd, config_file: &std::path::Path) -> eyre::Result<()> {
    let addr = match cmd.addr {
        Some(addr) => addr,
        None => load_config(config_file, None)?.transport.listen_addr,
    };

    // Submission signs nothing itself; verification is the validation
    // library's concern upstream. A random signature keeps every copy of the
    // payload a distinct transaction.
    let mut rng = rand::thread_rng();
    let txs: Vec<Transaction> = (0..cmd.count)
        .map(|_| {
            let mut signature = [0u8; 64];
            rng.fill_bytes(&mut signature);
            Transaction::new(cmd.payload.clone().into_bytes(), signature.to_vec())
        })
        .collect();

    let mut client = OrderingClient::connect(addr).await?;

    let count = txs.len();
    if count == 1 {
        for tx in txs {
            info!(hash = %tx.hash(), "Submitting transaction");
            client.submit_transaction(tx).await?;
        }
    } else {
        client.submit_batch(txs).await?;
    }

    info!(%addr, count, "Submission acknowledged");
    Ok(())
}
