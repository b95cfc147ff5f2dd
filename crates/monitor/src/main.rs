use carta_monitor::MonitorResources;
use carta_monitor::api::start_webserver;
use carta_monitor::checks::{self, CheckName};
use carta_monitor::config::load_config_or_panic;
use carta_monitor::scheduler::spawn_check_loops;
use carta_monitor::secrets::{SecretCache, SecretKey};
use color_eyre::eyre::{WrapErr, eyre};
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::{ConnectOptions, Database};
use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "carta_monitor=info,hyper=warn,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

/// `carta-monitor` serves the API and runs every enabled loop.
/// `carta-monitor run <check>` runs one invocation and exits non-zero on failure.
enum Mode {
    Serve,
    RunOnce(CheckName),
}

fn parse_mode() -> color_eyre::Result<Mode> {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(Mode::Serve),
        [cmd, check] if cmd == "run" => Ok(Mode::RunOnce(check.parse()?)),
        _ => Err(eyre!(
            "usage: carta-monitor [run <check>]; checks: {}",
            CheckName::ALL.map(|c| c.as_str()).join(", ")
        )),
    }
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    let _ = dotenvy::dotenv();

    initialize_standard_tracing();

    let mode = parse_mode()?;

    // Load config
    let config = load_config_or_panic();

    // sqlx pulls in both rustls providers; pick one explicitly.
    if CryptoProvider::get_default().is_none() {
        CryptoProvider::install_default(crypto::aws_lc_rs::default_provider())
            .map_err(|_| eyre!("Failed to install crypto provider"))?;
    }

    let secrets = Arc::new(SecretCache::from_config(&config)?);
    secrets
        .preload(&SecretKey::ALL)
        .wrap_err("Failed to load secrets")?;

    let database_url = if config.database_url_needs_password() {
        let password = secrets.get(SecretKey::DatabasePassword)?;
        config.database_url_with_password(&password)
    } else {
        config.database_url.clone()
    };
    let mut options = ConnectOptions::new(database_url);
    options.sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .wrap_err("Failed to connect to database")?;

    tracing::info!(
        stage = %config.stage,
        production = config.is_production(),
        local = config.is_local,
        "monitor configuration"
    );

    let resources = MonitorResources::new(db, config, secrets);

    match mode {
        Mode::RunOnce(check) => {
            let outcome = checks::invoke(&resources, check).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
        Mode::Serve => {
            let _loops = spawn_check_loops(resources.clone());
            start_webserver(resources).await?;
            Ok(())
        }
    }
}
