use clap::Parser;
use log::{debug, error, info};

use timecaps::{App, CapsuleBackend, CapsuleStore, Cli, Config, LocalBackend, RemoteBackend};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    debug!("Logger initialized");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    initialize_logger(cli.verbose);
    info!("timecaps starting up");

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> timecaps::Result<()> {
    // Resolve configuration, letting CLI flags override file values
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(api_url) = cli.api_url {
        config.api_url = Some(api_url);
    }

    // Select the persistence backend
    let backend: Box<dyn CapsuleBackend> = match config.api_url.as_deref() {
        Some(api_url) => {
            debug!("Using remote backend at {}", api_url);
            Box::new(RemoteBackend::new(api_url)?)
        }
        None => {
            debug!("Using local backend in {}", config.data_dir.display());
            Box::new(LocalBackend::new(config.clone()))
        }
    };

    let store = CapsuleStore::load(backend).await;

    let mut app = App::new(store, config, cli.verbose);
    app.run(cli.command).await
}
