use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drapps::api::ApiClient;
use drapps::cli::{create, environment, logs, ls, publish, share, terminate};
use drapps::config::{self, ConfigFile};
use drapps::error::{exit_code, INTERRUPTED_EXIT_CODE};
use drapps::upload::CpuSize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pass API token for authorization
    #[arg(short = 't', long, global = true, env = "DATAROBOT_API_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Pass API endpoint (defaults to $DATAROBOT_HOST/api/v2)
    #[arg(short = 'E', long, global = true, env = "DATAROBOT_ENDPOINT")]
    endpoint: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new custom application from a docker image or a project folder
    ///
    /// A `.dr_apps_ignore` file in the project folder uses .gitignore syntax to
    /// leave files out of the upload.
    Create {
        /// Name or ID of the execution environment
        #[arg(short = 'e', long)]
        base_env: Option<String>,
        /// Path to the folder with files that should be uploaded
        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
        /// Path to a tar archive with the custom application docker image
        #[arg(short = 'i', long)]
        image: Option<PathBuf>,
        /// Number of replicas to be created
        #[arg(long, default_value_t = 1)]
        replicas: u32,
        /// Container size: 2xsmall (1 CPU, 128 MB) up to 2xlarge (2 CPUs, 3 GB)
        #[arg(long, value_enum, default_value_t = CpuSize::Small)]
        cpu_size: CpuSize,
        /// Route requests from one client to the same replica
        #[arg(long)]
        use_session_affinity: bool,
        /// Serve web requests and health checks on `/` instead of `/apps/<id>/`
        #[arg(long)]
        service_requests_on_root_path: bool,
        /// String runtime parameter in the format KEY=VALUE
        #[arg(long = "stringEnvVar", value_parser = parse_key_val::<String, String>)]
        string_env_var: Vec<(String, String)>,
        /// Numeric runtime parameter in the format KEY=VALUE
        #[arg(long = "numericEnvVar", value_parser = parse_key_val::<String, String>)]
        numeric_env_var: Vec<(String, String)>,
        /// Do not wait for ready status
        #[arg(long)]
        skip_wait: bool,
        /// Name of the new application
        application_name: String,
    },
    /// List custom applications or execution environments
    Ls {
        #[arg(value_enum)]
        entity: ls::Entity,
        /// Output only ids
        #[arg(long)]
        id_only: bool,
    },
    /// Show logs of a custom application
    Logs {
        /// Output appended data as new log records appear
        #[arg(short = 'f', long)]
        follow: bool,
        /// Application name or ID
        application_id_or_name: String,
    },
    /// Stop custom applications and remove them from the list
    ///
    /// Reads names or IDs from stdin, one per line, when none are given.
    Terminate {
        /// Application names or IDs
        application_id_or_name: Vec<String>,
    },
    /// Rename an application or publish another application's source into it
    Publish {
        /// Name or ID of the application to update
        #[arg(short = 'i', long)]
        application_to_be_updated: String,
        /// New name for the application
        #[arg(short = 'n', long)]
        name: Option<String>,
        /// Name or ID of the application to copy the source version from
        #[arg(short = 's', long)]
        source_application: Option<String>,
        /// Do not wait for ready status
        #[arg(long)]
        skip_wait: bool,
    },
    /// Roll an application back to an earlier published source version
    RevertPublish {
        /// Name or ID of the application to update
        #[arg(short = 'i', long)]
        application_to_be_updated: String,
        /// How many versions back to go
        #[arg(short = 'b', long)]
        by: usize,
        /// Do not wait for ready status
        #[arg(long)]
        skip_wait: bool,
    },
    /// Manage external sharing of an application
    ExternalShare {
        /// Application name or ID
        application_name: String,
        /// Enable or disable external sharing
        #[arg(long)]
        set_external_sharing: Option<bool>,
        /// Share with this user (repeatable)
        #[arg(long)]
        add_external_user: Vec<String>,
        /// Stop sharing with this user (repeatable)
        #[arg(long)]
        remove_external_user: Vec<String>,
    },
    /// Create an execution environment and build its first version
    CreateEnv {
        /// Name of the execution environment
        #[arg(short = 'n', long)]
        name: String,
        /// Path to a tar archive containing a Dockerfile
        #[arg(short = 'i', long)]
        dockerfilezip: PathBuf,
        /// Description of the execution environment
        #[arg(short = 'd', long)]
        description: Option<String>,
    },
}

/// Parse a single key-value pair
fn parse_key_val<T, U>(
    s: &str,
) -> Result<(T, U), Box<dyn std::error::Error + Send + Sync + 'static>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    U: std::str::FromStr,
    U::Err: std::error::Error + Send + Sync + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Environment variables must be in the format KEY=VALUE, got `{s}`"))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout only carries command output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let code = tokio::select! {
        result = run(cli) => match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                exit_code(&e)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nAborted!");
            INTERRUPTED_EXIT_CODE
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let file = ConfigFile::load()?;
    let credentials = config::resolve_credentials(
        cli.token.as_deref(),
        cli.endpoint.as_deref(),
        config::env_var_non_empty,
        &file,
    )?;
    let client = ApiClient::new(&credentials.endpoint, &credentials.token)?;
    let polling = file.polling;

    match &cli.command {
        Commands::Create {
            base_env,
            path,
            image,
            replicas,
            cpu_size,
            use_session_affinity,
            service_requests_on_root_path,
            string_env_var,
            numeric_env_var,
            skip_wait,
            application_name,
        } => {
            create::create_app(
                &client,
                file.upload,
                polling,
                create::CreateOptions {
                    name: application_name,
                    base_env: base_env.as_deref(),
                    path: path.as_deref(),
                    image: image.as_deref(),
                    replicas: *replicas,
                    cpu_size: *cpu_size,
                    use_session_affinity: *use_session_affinity,
                    service_requests_on_root_path: *service_requests_on_root_path,
                    string_env_vars: string_env_var,
                    numeric_env_vars: numeric_env_var,
                    skip_wait: *skip_wait,
                },
            )
            .await?;
        }
        Commands::Ls { entity, id_only } => {
            ls::list(&client, *entity, *id_only).await?;
        }
        Commands::Logs {
            follow,
            application_id_or_name,
        } => {
            logs::show_logs(
                &client,
                application_id_or_name,
                *follow,
                polling.log_follow_interval(),
            )
            .await?;
        }
        Commands::Terminate {
            application_id_or_name,
        } => {
            let targets = terminate::collect_targets(application_id_or_name.clone())?;
            terminate::terminate(&client, &targets).await?;
        }
        Commands::Publish {
            application_to_be_updated,
            name,
            source_application,
            skip_wait,
        } => {
            publish::publish(
                &client,
                application_to_be_updated,
                name.as_deref(),
                source_application.as_deref(),
                *skip_wait,
                polling.app_start_interval(),
            )
            .await?;
        }
        Commands::RevertPublish {
            application_to_be_updated,
            by,
            skip_wait,
        } => {
            publish::revert_publish(
                &client,
                application_to_be_updated,
                *by,
                *skip_wait,
                polling.app_start_interval(),
            )
            .await?;
        }
        Commands::ExternalShare {
            application_name,
            set_external_sharing,
            add_external_user,
            remove_external_user,
        } => {
            share::external_share(
                &client,
                application_name,
                *set_external_sharing,
                add_external_user,
                remove_external_user,
            )
            .await?;
        }
        Commands::CreateEnv {
            name,
            dockerfilezip,
            description,
        } => {
            environment::create_env(
                &client,
                name,
                dockerfilezip,
                description.as_deref(),
                polling.image_build_interval(),
            )
            .await?;
        }
    }

    Ok(())
}
