mod cmd;
mod util;

use argp::FromArgs;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use typed_path::Utf8NativePathBuf;

use crate::util::native_path;

#[derive(FromArgs, PartialEq, Debug)]
/// Member activity refresh tools.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
    #[argp(
        option,
        short = 'c',
        default = "Utf8NativePathBuf::from(\"config.yml\")",
        from_str_fn(native_path)
    )]
    /// configuration file (default: config.yml)
    config: Utf8NativePathBuf,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Refresh(cmd::refresh::Args),
    Stats(cmd::stats::Args),
    Member(cmd::member::Args),
    Schedule(cmd::schedule::Args),
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let config = match util::load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed: {e:?}");
            std::process::exit(1);
        }
    };
    let result = match args.command {
        SubCommand::Refresh(c_args) => cmd::refresh::run(c_args, &config).await,
        SubCommand::Stats(c_args) => cmd::stats::run(c_args, &config).await,
        SubCommand::Member(c_args) => cmd::member::run(c_args, &config).await,
        SubCommand::Schedule(c_args) => cmd::schedule::run(c_args, &config).await,
    };
    if let Err(e) = result {
        eprintln!("Failed: {e:?}");
        std::process::exit(1);
    }
}
