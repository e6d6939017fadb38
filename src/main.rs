use slimdiff_backend::api::server::{serve, shutdown_signal};
use slimdiff_backend::config::{resolve_service_config, ConfigOverrides};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    if cli_args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_usage();
        return Ok(());
    }

    let flags = parse_cli_args(cli_args.as_slice())?;
    let config = resolve_service_config(&flags)?;
    serve(config, shutdown_signal()).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

fn parse_cli_args(args: &[String]) -> Result<ConfigOverrides, Box<dyn std::error::Error>> {
    let mut flags = ConfigOverrides::default();
    let mut i = 0usize;
    while i < args.len() {
        let flag = args[i].as_str();
        let needs_value = |idx: usize| -> Result<String, Box<dyn std::error::Error>> {
            let Some(value) = args.get(idx + 1) else {
                return Err(std::io::Error::other(format!("Missing value for {flag}")).into());
            };
            Ok(value.clone())
        };

        match flag {
            "--socket" => {
                flags.socket_path = Some(needs_value(i)?);
                i += 2;
            }
            "--analyzer" => {
                flags.analyzer_program = Some(needs_value(i)?);
                i += 2;
            }
            "--artifact-dir" => {
                flags.artifact_dir = Some(needs_value(i)?);
                i += 2;
            }
            "--timeout-secs" => {
                flags.timeout_secs = Some(needs_value(i)?);
                i += 2;
            }
            unknown => {
                return Err(std::io::Error::other(format!(
                    "Unknown argument: {unknown}\n\nUse --help for usage."
                ))
                .into());
            }
        }
    }
    Ok(flags)
}

fn print_usage() {
    eprintln!(
        concat!(
            "Usage:\n",
            "  slimdiff-backend [--socket PATH] [--analyzer PROGRAM] [--artifact-dir PATH] ",
            "[--timeout-secs N]\n\n",
            "Defaults:\n",
            "  --socket        /run/guest-services/backend.sock (env SLIMDIFF_SOCKET)\n",
            "  --analyzer      slim (env SLIMDIFF_ANALYZER)\n",
            "  --artifact-dir  system temp dir (env SLIMDIFF_ARTIFACT_DIR)\n",
            "  --timeout-secs  300 (env SLIMDIFF_TIMEOUT_SECS)\n"
        )
    );
}
