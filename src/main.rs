//! CERN SSO - fetch resources behind CERN single sign-on

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use reqwest::Method;
use tracing::{error, info};
use url::Url;

use cern_sso::{
    ClientCertificate, SsoClient,
    cli::{Cli, Command, FetchArgs},
    config::Config,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Fetch(args) => run_fetch(config, args).await,
        Command::CheckUri { uri } => {
            let detector = config.detector.detector();
            if detector.is_auth_uri(&uri) {
                println!("{uri}: login endpoint ({})", detector.prefix());
            } else {
                println!("{uri}: not a login endpoint");
            }
            ExitCode::SUCCESS
        }
    }
}

/// Run the fetch command
async fn run_fetch(config: Config, args: FetchArgs) -> ExitCode {
    let url = match Url::parse(&args.url) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("❌ Invalid URL '{}': {e}", args.url);
            return ExitCode::FAILURE;
        }
    };
    let method = match Method::from_bytes(args.method.to_ascii_uppercase().as_bytes()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("❌ Invalid method '{}': {e}", args.method);
            return ExitCode::FAILURE;
        }
    };

    let mut sso = SsoClient::new(config);
    if let Some(user_agent) = args.user_agent {
        sso.set_user_agent(user_agent);
    }

    if let Some(cert_path) = &args.cert {
        let loaded = match &args.key {
            Some(key_path) => ClientCertificate::from_pem_files(cert_path, key_path),
            None => std::fs::read(cert_path)
                .map_err(cern_sso::Error::from)
                .and_then(ClientCertificate::from_pem),
        };
        match loaded {
            Ok(cert) => sso.load_certificate(cert),
            Err(e) => {
                eprintln!("❌ Failed to load certificate: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if let Some(username) = args.username {
        let password = args.password.unwrap_or_default();
        if let Err(e) = sso.load_username_password(username, password) {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    }

    info!(url = %url, method = %method, credential = sso.credential().kind(), "Fetching");

    let response = match sso.get_web_response(&url, method).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(status = response.status.as_u16(), final_uri = %response.uri, "Fetched");

    let written = match &args.output {
        Some(path) => std::fs::write(path, &response.body),
        None => std::io::stdout().lock().write_all(&response.body),
    };
    if let Err(e) = written {
        eprintln!("❌ Failed to write response: {e}");
        return ExitCode::FAILURE;
    }

    if response.status.is_success() {
        ExitCode::SUCCESS
    } else {
        eprintln!("❌ {} returned {}", response.uri, response.status);
        ExitCode::FAILURE
    }
}
