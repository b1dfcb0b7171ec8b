//! Browser lifecycle management
//!
//! This module handles browser launch and the per-request session identity.
//! Every [`BrowserController::open`] launches its own Chromium process; nothing
//! is pooled.

use super::session::BrowserSession;
use super::RenderEngine;
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetScriptExecutionDisabledParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Desktop Chrome on Windows
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Identity every render context is created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    /// User agent string
    pub user_agent: String,
    /// Locale, also sent as Accept-Language
    pub locale: String,
    /// IANA timezone
    pub timezone: String,
    /// Viewport width
    pub width: u32,
    /// Viewport height
    pub height: u32,
    /// Run page scripts (default: true)
    pub javascript_enabled: bool,
    /// Render sites with invalid or self-signed certificates (default: true)
    pub ignore_https_errors: bool,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            locale: "en-US".to_string(),
            timezone: "America/Chicago".to_string(),
            width: 1366,
            height: 768,
            javascript_enabled: true,
            ignore_https_errors: true,
        }
    }
}

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Enable sandbox (default: false; most container hosts cannot provide one)
    pub sandbox: bool,
    /// Upper bound for a single CDP command (default: 120s)
    pub request_timeout: Duration,
    /// Path to Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<String>,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
    /// Identity applied to each context
    pub profile: SessionProfile,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            request_timeout: Duration::from_secs(120),
            chrome_path: None,
            extra_args: Vec::new(),
            profile: SessionProfile::default(),
        }
    }
}

impl BrowserConfig {
    /// Create a new config builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set viewport dimensions
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.profile.width = width;
        self.config.profile.height = height;
        self
    }

    /// Enable/disable sandbox
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.config.sandbox = sandbox;
        self
    }

    /// Set user agent
    pub fn user_agent<S: Into<String>>(mut self, ua: S) -> Self {
        self.config.profile.user_agent = ua.into();
        self
    }

    /// Set locale
    pub fn locale<S: Into<String>>(mut self, locale: S) -> Self {
        self.config.profile.locale = locale.into();
        self
    }

    /// Set timezone
    pub fn timezone<S: Into<String>>(mut self, timezone: S) -> Self {
        self.config.profile.timezone = timezone.into();
        self
    }

    /// Set the CDP command timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set Chrome path
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Add extra Chrome argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Build the config
    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// Launches one browser per render session
#[derive(Debug, Clone, Default)]
pub struct BrowserController {
    config: BrowserConfig,
}

impl BrowserController {
    /// Create a controller with custom config
    pub fn with_config(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Get the browser configuration
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    fn cdp_config(&self) -> Result<CdpBrowserConfig, BrowserError> {
        let config = &self.config;
        let profile = &config.profile;

        let mut builder = CdpBrowserConfig::builder()
            .viewport(Viewport {
                width: profile.width,
                height: profile.height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(profile.width, profile.height)
            .request_timeout(config.request_timeout);

        if !config.headless {
            builder = builder.with_head();
        }

        if !config.sandbox {
            builder = builder
                .arg("--no-sandbox")
                .arg("--disable-setuid-sandbox");
        }

        if !profile.ignore_https_errors {
            builder = builder.respect_https_errors();
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        for arg in &config.extra_args {
            builder = builder.arg(arg);
        }

        builder.build().map_err(BrowserError::ConfigError)
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>), BrowserError> {
        let cdp_config = self.cdp_config()?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // Spawn handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        Ok((browser, handler_task))
    }

    async fn isolate(&self, browser: &Browser) -> Result<(BrowserContextId, Page), BrowserError> {
        let context_id = browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(|e| BrowserError::ContextCreationFailed(e.to_string()))?;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(BrowserError::ConfigError)?;

        let page = browser
            .new_page(target)
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        apply_profile(&page, &self.config.profile).await?;

        Ok((context_id, page))
    }
}

#[async_trait]
impl RenderEngine for BrowserController {
    type Session = BrowserSession;

    #[instrument(skip(self))]
    async fn open(&self) -> Result<BrowserSession, BrowserError> {
        info!(
            "Launching browser with config: headless={}",
            self.config.headless
        );

        // `close` on the failure path needs the browser mutably
        let (mut browser, handler) = self.launch().await?;

        match self.isolate(&browser).await {
            Ok((context_id, page)) => {
                info!("Browser launched successfully");
                Ok(BrowserSession::start(browser, handler, context_id, page).await)
            }
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!("Failed to close half-open browser: {}", close_err);
                }
                handler.abort();
                Err(e)
            }
        }
    }
}

/// Apply user agent, locale, timezone and script policy to a fresh page
async fn apply_profile(page: &Page, profile: &SessionProfile) -> Result<(), BrowserError> {
    let failed = |e: chromiumoxide::error::CdpError| BrowserError::PageCreationFailed(e.to_string());

    let user_agent = SetUserAgentOverrideParams::builder()
        .user_agent(&profile.user_agent)
        .accept_language(&profile.locale)
        .build()
        .map_err(BrowserError::ConfigError)?;
    page.set_user_agent(user_agent).await.map_err(failed)?;

    page.execute(
        SetLocaleOverrideParams::builder()
            .locale(&profile.locale)
            .build(),
    )
    .await
    .map_err(failed)?;

    page.execute(SetTimezoneOverrideParams::new(&profile.timezone))
        .await
        .map_err(failed)?;

    page.execute(SetScriptExecutionDisabledParams::new(
        !profile.javascript_enabled,
    ))
    .await
    .map_err(failed)?;

    debug!("Applied session profile");
    Ok(())
}
