mod events;
mod global_opts;
mod license;
pub(crate) mod license_enforcement;
mod sdk;

use std::{env, time::Duration};

use anyhow::{Context as _, anyhow};
use clap::Parser;
use events::{EventReconciler, KubernetesEventStore};
use global_opts::GlobalOpts;
use license::{LicenseVerifier, TrustAnchor};
use license_enforcement::{DEFAULT_RECHECK_INTERVAL, LicenseEnforcer, monitor};
use sdk::SdkClient;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIME: &str = env!("LICENSE_ENFORCER_BUILD_TIME");
const GIT_SHA: &str = env!("LICENSE_ENFORCER_GIT_SHA");

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global_opts: GlobalOpts,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Check the license once, retrying transient failures
    ///
    /// Exits 0 if the license is valid and 1 if it has expired or could not
    /// be verified.
    Check,

    /// Check the license now and then on an interval until stopped
    Monitor {
        /// Interval between license checks (e.g. `1h`, `30m`)
        #[arg(
            long,
            env = "LICENSE_RECHECK_INTERVAL",
            value_parser = humantime::parse_duration,
            default_value = humantime::format_duration(DEFAULT_RECHECK_INTERVAL).to_string(),
        )]
        recheck: Duration,
    },
}

fn setup_logging() {
    use std::io::IsTerminal;
    use tracing_subscriber::{
        filter::{EnvFilter, LevelFilter},
        fmt,
    };

    let color = std::io::stdout().is_terminal()
        && (match env::var("COLORTERM") {
            Ok(value) => value == "truecolor" || value == "24bit",
            _ => false,
        } || match env::var("TERM") {
            Ok(value) => value == "direct" || value == "truecolor",
            _ => false,
        });

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let fmt = fmt().with_env_filter(env_filter);

    if color {
        fmt.event_format(fmt::format().pretty())
            .with_file(false)
            .with_line_number(false)
            .with_ansi(color)
            .init();
    } else {
        fmt.with_file(false)
            .with_line_number(false)
            .with_ansi(false)
            .init();
    }
}

async fn build_enforcer(
    opts: &GlobalOpts,
) -> anyhow::Result<LicenseEnforcer<LicenseVerifier<SdkClient>, KubernetesEventStore>> {
    let trust_anchor = TrustAnchor::load(opts.license_public_key.as_deref())?;

    let sdk = SdkClient::new(opts.sdk_endpoint.clone(), opts.request_timeout);
    info!(endpoint = %sdk.endpoint(), "Using Replicated SDK");

    let pod = opts.pod();
    let store = KubernetesEventStore::connect(&pod.namespace)
        .await
        .context("Failed to connect to Kubernetes")?;

    Ok(LicenseEnforcer::new(
        LicenseVerifier::new(sdk, trust_anchor),
        EventReconciler::new(store, pod),
        opts.backoff(),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Cli::parse();

    setup_logging();

    info!(version = VERSION, build_time = BUILD_TIME, git_sha = GIT_SHA, "License enforcer");

    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install AWS LC crypto provider"))?;

    let enforcer = build_enforcer(&opts.global_opts).await?;

    match opts.command {
        Commands::Check => {
            let status = enforcer.validate().await?;
            println!(
                "License for {} is valid, expires {}.",
                status.application, status.expiration
            );
        }
        Commands::Monitor { recheck } => {
            monitor(&enforcer, recheck).await?;
        }
    }

    Ok(())
}
