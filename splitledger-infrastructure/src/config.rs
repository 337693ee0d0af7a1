use splitledger_domain::CurrencyContext;
use std::env;

const CURRENCY_SCALE_VAR: &str = "SPLITLEDGER_CURRENCY_SCALE";

/// Runtime configuration for an embedding application.
pub struct AppConfig {
    pub currency: CurrencyContext,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let currency = env::var(CURRENCY_SCALE_VAR)
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
            .map(|scale| CurrencyContext { scale })
            .unwrap_or_else(CurrencyContext::paise_default);

        Self { currency }
    }
}

/// Initialize logging and tracing.
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
