use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use txcert::{
    bootstrap, shutdown, to_json, CertificateSummary, ChaincodeRequest, LocalSession, RootConfig,
    RootError,
};

/// txcert: sign ledger transactions with single-use transaction certificates
#[derive(Parser, Debug)]
#[command(name = "txcert", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ChaincodeArgs {
    /// Chaincode name
    #[arg(long)]
    name: String,

    /// Chaincode path
    #[arg(long, default_value = "")]
    path: String,

    /// Function to call
    #[arg(long, default_value = "init")]
    function: String,

    /// Function argument (repeatable)
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Transaction uuid
    #[arg(long)]
    uuid: String,

    /// Attribute the TCert is scoped to (repeatable)
    #[arg(long = "attr")]
    attributes: Vec<String>,

    /// Seal the payload to the chain key
    #[arg(long)]
    confidential: bool,
}

impl ChaincodeArgs {
    fn request(&self) -> ChaincodeRequest {
        ChaincodeRequest {
            name: self.name.clone(),
            path: self.path.clone(),
            function: self.function.clone(),
            args: self.args.clone(),
            confidential: self.confidential,
        }
    }

    fn attribute_refs(&self) -> Vec<&str> {
        self.attributes.iter().map(String::as_str).collect()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Draw unused transaction certificates
    Tcerts {
        /// Number of TCerts to draw
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Attribute the TCerts are scoped to (repeatable)
        #[arg(long = "attr")]
        attributes: Vec<String>,
    },

    /// Build and sign a deploy transaction
    Deploy(ChaincodeArgs),

    /// Build and sign an invoke transaction
    Invoke(ChaincodeArgs),

    /// Build and sign a query transaction
    Query(ChaincodeArgs),

    /// Show the enrollment certificate
    Ecert,

    /// Write a default configuration file
    InitConfig,
}

fn init_tracing(verbose: bool, config_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("txcert=debug,txcert_client=debug,txcert_node=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_filter))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn config_path(path: Option<&PathBuf>) -> PathBuf {
    path.cloned().unwrap_or_else(RootConfig::default_config_path)
}

fn main() {
    let cli = Cli::parse();

    let config = match RootConfig::load(&config_path(cli.config.as_ref())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    init_tracing(cli.verbose, &config.logging.filter);

    if let Err(e) = run(cli, config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: RootConfig) -> Result<(), RootError> {
    match cli.command {
        Commands::InitConfig => cmd_init_config(cli.config.as_ref(), &config),
        Commands::Tcerts { count, attributes } => with_session(config, |session| {
            let attrs: Vec<&str> = attributes.iter().map(String::as_str).collect();
            let tcerts = session.client.get_next_tcerts(count, &attrs)?;
            let summaries: Vec<CertificateSummary> = tcerts
                .iter()
                .map(|t| CertificateSummary::from(&t.certificate))
                .collect();
            println!("{}", to_json(&summaries)?);
            Ok(())
        }),
        Commands::Deploy(args) => with_session(config, |session| {
            let tx = session.client.new_deploy_transaction(
                &args.request().deployment_spec(),
                args.uuid.as_str(),
                &args.attribute_refs(),
            )?;
            println!("{}", to_json(&tx)?);
            Ok(())
        }),
        Commands::Invoke(args) => with_session(config, |session| {
            let tx = session.client.new_invoke_transaction(
                &args.request().invocation_spec(),
                args.uuid.as_str(),
                &args.attribute_refs(),
            )?;
            println!("{}", to_json(&tx)?);
            Ok(())
        }),
        Commands::Query(args) => with_session(config, |session| {
            let tx = session.client.new_query_transaction(
                &args.request().invocation_spec(),
                args.uuid.as_str(),
                &args.attribute_refs(),
            )?;
            println!("{}", to_json(&tx)?);
            Ok(())
        }),
        Commands::Ecert => with_session(config, |session| {
            let ecert = session.client.enrollment_certificate()?;
            println!("{}", to_json(&CertificateSummary::from(&ecert))?);
            Ok(())
        }),
    }
}

/// Run `command` against a fresh local session and always close it.
fn with_session(
    config: RootConfig,
    command: impl FnOnce(&LocalSession) -> Result<(), RootError>,
) -> Result<(), RootError> {
    let session = bootstrap(config)?;
    let result = command(&session);
    let closed = shutdown(session);
    result.and(closed)
}

fn cmd_init_config(path: Option<&PathBuf>, config: &RootConfig) -> Result<(), RootError> {
    let save_path = config_path(path);
    config.save(&save_path)?;
    info!(path = %save_path.display(), "configuration written");
    println!("Configuration written to {}", save_path.display());
    Ok(())
}
