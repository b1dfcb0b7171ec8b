//! Command-line and environment configuration
//!
//! Every flag falls back to an environment variable so the service can be
//! configured the usual container way (`PORT`, `AUTH_TOKEN`, ...).

use crate::browser::BrowserConfig;
use crate::error::Result;
use crate::security::AuthConfig;
use clap::Parser;
use std::net::SocketAddr;

/// Render API server
#[derive(Parser, Debug, Clone)]
#[command(name = "render-api")]
#[command(version)]
#[command(about = "Returns the rendered HTML of a page after its scripts have run")]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bearer token required on every route (unset = open)
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Path to Chrome/Chromium executable
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<String>,

    /// Run in headless mode
    #[arg(long, env = "HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    /// Address to bind the listener to
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Browser launch settings derived from the flags
    pub fn browser_config(&self) -> BrowserConfig {
        let builder = BrowserConfig::builder().headless(self.headless);
        match self.chrome_path {
            Some(ref path) => builder.chrome_path(path).build(),
            None => builder.build(),
        }
    }

    /// Authentication settings derived from the flags
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.auth_token.clone())
    }

    /// Default `tracing` filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
