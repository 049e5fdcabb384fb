//! # Application State
//!
//! Shared state for the Axum application: the reconciler that both
//! confirmation entry points share, the payment provider used for checkout,
//! the product catalog and file store, and configuration.

use deliver_core::{
    BoxedFileStore, BoxedNotificationGateway, BoxedPaymentProvider, BoxedProcessedStore,
    CheckoutUrls, DirectoryFileStore, EmailBranding, FulfillmentDispatcher,
    InMemoryProcessedStore, PaymentReconciler, ProductCatalog,
};
use deliver_mail::ResendGateway;
use deliver_mercadopago::{MercadoPagoConfig, MercadoPagoProvider, WebhookVerifier};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Storefront URL the provider redirects customers back to
    pub frontend_url: String,
    /// Public URL of this service, used for the notification URL
    pub backend_url: Option<String>,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Directory holding the deliverable files
    pub files_dir: PathBuf,
    /// Product catalog file; the built-in catalog is used when unset
    pub products_file: Option<PathBuf>,
    /// Store name shown in delivery emails
    pub store_name: String,
    /// Bound on a provider payment lookup
    pub provider_timeout: Duration,
    /// Bound on a single email send
    pub email_send_timeout: Duration,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: env_or("HOST", "127.0.0.1"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            frontend_url: env_or("FRONTEND_URL", "http://localhost:3000"),
            backend_url: non_empty_var("BACKEND_URL"),
            environment: env_or("ENVIRONMENT", "development"),
            files_dir: PathBuf::from(env_or("FILES_DIR", "files")),
            products_file: non_empty_var("PRODUCTS_FILE").map(PathBuf::from),
            store_name: env_or("STORE_NAME", "Datos con Alex"),
            provider_timeout: secs_var("PROVIDER_TIMEOUT_SECS", 10),
            email_send_timeout: secs_var("EMAIL_SEND_TIMEOUT_SECS", 30),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Where the provider should post payment notifications
    pub fn notification_url(&self) -> Option<String> {
        self.backend_url
            .as_ref()
            .map(|base| format!("{}/api/payments/webhook/", base.trim_end_matches('/')))
    }

    /// Return URLs sent with every checkout
    pub fn checkout_urls(&self) -> CheckoutUrls {
        let urls = CheckoutUrls::new(&self.frontend_url);
        match self.notification_url() {
            Some(url) => urls.with_notification_url(url),
            None => urls,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            frontend_url: "http://localhost:3000".to_string(),
            backend_url: None,
            environment: "development".to_string(),
            files_dir: PathBuf::from("files"),
            products_file: None,
            store_name: "Datos con Alex".to_string(),
            provider_timeout: Duration::from_secs(10),
            email_send_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration presence report; never carries secret values
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvironmentReport {
    pub environment: String,
    pub mp_access_token_set: bool,
    pub mp_test_mode: bool,
    pub mp_webhook_secret_set: bool,
    pub resend_api_key_set: bool,
    pub from_email: Option<String>,
    pub reply_to: Option<String>,
    pub frontend_url: String,
    pub backend_url: Option<String>,
    pub notification_url: Option<String>,
    pub files_dir: String,
    pub products_source: String,
}

impl EnvironmentReport {
    fn from_config(config: &AppConfig, products_source: impl Into<String>) -> Self {
        Self {
            environment: config.environment.clone(),
            frontend_url: config.frontend_url.clone(),
            backend_url: config.backend_url.clone(),
            notification_url: config.notification_url(),
            files_dir: config.files_dir.display().to_string(),
            products_source: products_source.into(),
            ..Default::default()
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Confirms payments and fulfills each approved one once
    pub reconciler: Arc<PaymentReconciler>,
    /// Payment provider used for checkout creation
    pub provider: BoxedPaymentProvider,
    /// Product catalog
    pub catalog: Arc<ProductCatalog>,
    /// Deliverable files
    pub files: BoxedFileStore,
    /// Checkout return and notification URLs
    pub urls: CheckoutUrls,
    /// Notification signature check, when a secret is configured
    pub webhook_verifier: Option<WebhookVerifier>,
    /// Configuration presence for the env-check endpoint
    pub environment: EnvironmentReport,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create the state from environment variables with the Mercado Pago
    /// provider and the Resend gateway.
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let (catalog, products_source) = load_product_catalog(&config)?;

        let mp_config = MercadoPagoConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Mercado Pago: {}", e))?;
        let verifier = mp_config.webhook_secret.clone().map(WebhookVerifier::new);

        let mut report = EnvironmentReport::from_config(&config, products_source);
        report.mp_access_token_set = true;
        report.mp_test_mode = mp_config.is_test_mode();
        report.mp_webhook_secret_set = verifier.is_some();

        let provider = MercadoPagoProvider::new(mp_config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize Mercado Pago: {}", e))?;

        let gateway = ResendGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Resend: {}", e))?;
        report.resend_api_key_set = true;
        report.from_email = Some(gateway.config().from_header());
        report.reply_to = gateway.config().reply_to.clone();

        let files: BoxedFileStore = Arc::new(DirectoryFileStore::new(&config.files_dir));

        let state = Self::from_parts(
            config,
            catalog,
            files,
            Arc::new(provider),
            Arc::new(gateway),
            Arc::new(InMemoryProcessedStore::new()),
        )
        .with_environment(report);

        Ok(match verifier {
            Some(verifier) => state.with_webhook_verifier(verifier),
            None => state,
        })
    }

    /// Assemble the state from already-built components
    pub fn from_parts(
        config: AppConfig,
        catalog: ProductCatalog,
        files: BoxedFileStore,
        provider: BoxedPaymentProvider,
        gateway: BoxedNotificationGateway,
        store: BoxedProcessedStore,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let branding =
            EmailBranding::new(&config.store_name).with_link("Website", &config.frontend_url);

        let dispatcher = FulfillmentDispatcher::new(catalog.clone(), files.clone(), gateway)
            .with_branding(branding)
            .with_send_timeout(config.email_send_timeout);

        let reconciler = PaymentReconciler::new(provider.clone(), Arc::new(dispatcher), store)
            .with_provider_timeout(config.provider_timeout);

        Self {
            reconciler: Arc::new(reconciler),
            provider,
            catalog,
            files,
            urls: config.checkout_urls(),
            webhook_verifier: None,
            environment: EnvironmentReport::from_config(&config, "in-memory"),
            config,
        }
    }

    /// Builder: verify notification signatures
    pub fn with_webhook_verifier(mut self, verifier: WebhookVerifier) -> Self {
        self.environment.mp_webhook_secret_set = true;
        self.webhook_verifier = Some(verifier);
        self
    }

    /// Builder: replace the configuration report
    pub fn with_environment(mut self, report: EnvironmentReport) -> Self {
        self.environment = report;
        self
    }
}

/// Load the product catalog: `PRODUCTS_FILE`, then `config/products.toml`,
/// then the built-in catalog. Returns the catalog and where it came from.
fn load_product_catalog(config: &AppConfig) -> anyhow::Result<(ProductCatalog, String)> {
    if let Some(ref path) = config.products_file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let catalog = ProductCatalog::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        tracing::info!("Loaded {} products from {}", catalog.products.len(), path.display());
        return Ok((catalog, path.display().to_string()));
    }

    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ProductCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok((catalog, path.to_string()));
        }
    }

    tracing::warn!("No product catalog file found, using built-in catalog");
    Ok((ProductCatalog::builtin(), "built-in".to_string()))
}

fn env_or(key: &str, default: &str) -> String {
    non_empty_var(key).unwrap_or_else(|| default.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs_var(key: &str, default: u64) -> Duration {
    let secs = match non_empty_var(key).map(|v| v.parse::<u64>()) {
        Some(Ok(secs)) => secs,
        Some(Err(_)) => {
            tracing::warn!("{} is not a whole number of seconds, using {}", key, default);
            default
        }
        None => default,
    };
    Duration::from_secs(secs)
}
