use anyhow::Context;
use pull_request_resource::{
    BuildEnvironment, CheckRequest, GetRequest, GithubClient, PutRequest, Source, Step, check,
    get, parse_args, put, read_request,
};
use serde::Serialize;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

// stdout carries the response JSON, so logs go to stderr.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn client_for(source: &Source) -> anyhow::Result<GithubClient> {
    source.validate().context("invalid source configuration")?;
    GithubClient::new(source, BuildEnvironment::from_env()).context("failed to create GitHub client")
}

fn emit<T: Serialize>(response: &T) -> anyhow::Result<()> {
    serde_json::to_writer(std::io::stdout().lock(), response)?;
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = match parse_args(std::env::args()) {
        Ok(cli) => cli,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let stdin = tokio::io::stdin();
    match cli.step {
        Step::Check => {
            let request: CheckRequest = read_request(stdin).await?;
            let github = client_for(&request.source)?;
            emit(&check(&request, &github).await?)
        }
        Step::Get { destination } => {
            let request: GetRequest = read_request(stdin).await?;
            let github = client_for(&request.source)?;
            emit(&get(&request, &github, &destination).await?)
        }
        Step::Put { sources } => {
            let request: PutRequest = read_request(stdin).await?;
            let github = client_for(&request.source)?;
            emit(&put(&request, &github, &sources).await?)
        }
    }
}
