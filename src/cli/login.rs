//! Login mode CLI logic
//!
//! Performs a single login from the terminal and prints the resulting
//! cookie jar as JSON on stdout. Logs go to stderr.

use anyhow::Result;
use tracing::{debug, info};

use crate::{
    SessionManager,
    error::format_error,
    session::CookieJar,
    types::{ApiResponse, Principal},
};

/// Arguments for login mode
#[derive(Debug)]
pub struct LoginArgs {
    pub name: String,
    pub password: String,
    pub lab: bool,
    pub force: bool,
    pub config: Option<String>,
    pub verbose: bool,
}

/// Run login mode with the given arguments
pub async fn run_login_mode(args: LoginArgs) -> Result<()> {
    let settings = super::load_settings(args.config.as_deref())?;
    super::init_logging(&settings, args.verbose, true);

    let principal = Principal::new(&args.name, &args.password);

    debug!(
        "Starting login for {} (lab={}, force={})",
        principal.id, args.lab, args.force
    );

    let session_manager = SessionManager::from_settings(&settings).await?;

    let outcome = if args.lab {
        session_manager.lab_login(&principal).await
    } else {
        session_manager.login(&principal, args.force).await
    };

    match outcome {
        Ok(jar) => {
            println!("{}", render_jar(&jar)?);
            info!("Login succeeded for {} ({} cookies)", principal.id, jar.len());
        }
        Err(e) => {
            eprintln!("Login failed: {}", format_error(&e));
            println!("{}", serde_json::to_string(&ApiResponse::from(&e))?);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn render_jar(jar: &CookieJar) -> Result<String> {
    Ok(serde_json::to_string(jar)?)
}
