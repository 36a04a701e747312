use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;

use tvlp::cli::{Cli, Command};
use tvlp::config::Config;
use tvlp::i18n::{FilePreferences, Lang, LanguageStore, Translations};
use tvlp::market::{self, Asset, SimulatedFeed, TransactionFeed};
use tvlp::notify::{ConnectionNotifier, NoopNotifier, RelayClient};
use tvlp::tron::TronGridProvider;
use tvlp::utils::TokioSleeper;
use tvlp::wallet::{
    ApprovalOutcome, AutoConfirmer, ConnectOutcome, Confirmer, ConsoleConfirmer, TerminalClipboard,
    WalletManager,
};
use tvlp::web::{ApiState, WebServer};

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(Path::new(DEFAULT_CONFIG_PATH)),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

fn language_store(config: &Config) -> Result<Arc<LanguageStore>> {
    let translations = Translations::embedded().context("Failed to load embedded translations")?;
    let prefs = FilePreferences::new(config.i18n.preferences_path.clone());
    Ok(Arc::new(LanguageStore::open(translations, Box::new(prefs))))
}

fn wallet_manager(config: &Config, yes: bool, address: Option<String>) -> Result<WalletManager> {
    let mut tron = config.tron.clone();
    if address.is_some() {
        tron.watch_address = address;
    }
    let provider = TronGridProvider::from_config(&tron).context("Failed to set up the Tron node client")?;

    let confirmer: Arc<dyn Confirmer> = if yes {
        Arc::new(AutoConfirmer)
    } else {
        Arc::new(ConsoleConfirmer)
    };
    let notifier: Arc<dyn ConnectionNotifier> = if config.notify.enabled {
        Arc::new(RelayClient::from_config(&config.notify)?)
    } else {
        Arc::new(NoopNotifier)
    };

    let manager = WalletManager::new(
        config.wallet.clone(),
        &config.notify.user_agent,
        confirmer,
        notifier,
        language_store(config)?,
    )?
    .with_provider(Arc::new(provider))
    .with_clipboard(Arc::new(TerminalClipboard));
    Ok(manager)
}

/// Connects and reports; `false` when no connection was made.
async fn connect(manager: &WalletManager) -> Result<bool> {
    match manager.connect_wallet().await? {
        ConnectOutcome::Connected(connection) => {
            info!(
                "Connected {} ({:.4} TRX)",
                connection.address, connection.balance
            );
            Ok(true)
        }
        ConnectOutcome::Declined => {
            info!("Connection declined");
            Ok(false)
        }
        ConnectOutcome::NoProvider => {
            warn!("No wallet available; set [tron] watch_address or pass --address");
            Ok(false)
        }
    }
}

async fn serve(config: &Config, host: Option<String>, port: Option<u16>, reduced_motion: bool) -> Result<()> {
    if let Err(e) = tvlp::metrics::init() {
        warn!("Failed to register metrics: {}", e);
    }

    let transactions = TransactionFeed::new();
    let _ticker = transactions.spawn(Arc::new(TokioSleeper), reduced_motion);
    let state = ApiState {
        market: Arc::new(SimulatedFeed),
        transactions,
        translations: Arc::new(Translations::embedded()?),
    };

    let server = WebServer::from_config(config, state)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    server.start(&host, port).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {:?}: {}", cli.config, e);
            return Err(anyhow::anyhow!("Configuration loading failed: {}", e));
        }
    };

    tvlp::logging::init(config.logging.file.as_deref(), cli.debug)?;
    info!("Configuration loaded successfully.");

    match cli.command {
        Command::Serve {
            host,
            port,
            reduced_motion,
        } => serve(&config, host, port, reduced_motion).await?,

        Command::Connect { address } => {
            let manager = wallet_manager(&config, cli.yes, address)?;
            if connect(&manager).await? {
                let report = manager.test_wallet_capabilities().await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                if manager.copy_address().await? {
                    info!("Address copied to the clipboard");
                }
            }
        }

        Command::Approve { address, amount } => {
            let manager = wallet_manager(&config, cli.yes, address)?;
            if connect(&manager).await? {
                match manager.request_fund_management(amount).await {
                    Ok(ApprovalOutcome::Approved(report)) => {
                        info!(
                            "Allowance {:?}: {} -> {} ({} transaction(s))",
                            report.status,
                            report.previous,
                            report.current,
                            report.transactions.len()
                        );
                    }
                    Ok(ApprovalOutcome::Declined) => info!("Approval declined"),
                    Err(e) => {
                        error!("Approval failed: {}", e);
                        return Err(e.into());
                    }
                }
            }
        }

        Command::Allowance { owner } => {
            let manager = wallet_manager(&config, cli.yes, owner)?;
            if connect(&manager).await? {
                if let Some(probe) = manager.test_token_approve().await? {
                    println!("{}", serde_json::to_string_pretty(&probe)?);
                }
            }
        }

        Command::Quote { from, to, amount } => {
            let from: Asset = from.parse()?;
            let to: Asset = to.parse()?;
            let quote = market::quote(from, to, amount)?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }

        Command::Lang { code, key } => {
            let store = language_store(&config)?;
            if let Some(code) = code {
                let lang: Lang = code.parse()?;
                store.change_language(lang);
            }
            let current = store.current_language();
            println!("{} ({})", current.name(), current.code());
            if let Some(key) = key {
                println!("{}", store.t(&key));
            }
        }
    }

    Ok(())
}
