//! Runtime configuration.
//!
//! Every setting comes from a command-line flag with an `ORDERFLOW_*` environment
//! fallback; [`Settings`] is the validated form handed to the wiring code.

use crate::application::orchestrator::PaymentDefaults;
use crate::context::RequestContext;
use crate::domain::payment::PaymentChannel;
use crate::error::{OrderError, Result};
use crate::infrastructure::gateway::GatewayBehavior;
use std::path::PathBuf;
use std::time::Duration;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, clap::Args)]
pub struct GlobalArgs {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "ORDERFLOW_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Product catalog CSV (`product_id,name,price,status`). Without it every product
    /// is accepted at the quoted price.
    #[arg(long, env = "ORDERFLOW_CATALOG", global = true)]
    pub catalog: Option<PathBuf>,

    /// ISO currency code for new payments.
    #[arg(long, env = "ORDERFLOW_CURRENCY", default_value = "CNY", global = true)]
    pub currency: String,

    /// Payment channel for new payments.
    #[arg(long, env = "ORDERFLOW_CHANNEL", default_value = "alipay", global = true)]
    pub channel: PaymentChannel,

    /// Behavior of the simulated payment gateway.
    #[arg(
        long,
        env = "ORDERFLOW_GATEWAY",
        value_enum,
        default_value_t = GatewayBehavior::Approve,
        global = true
    )]
    pub gateway: GatewayBehavior,

    /// Deadline for the whole operation, in milliseconds.
    #[arg(long, env = "ORDERFLOW_TIMEOUT_MS", global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db_path: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub payment: PaymentDefaults,
    pub gateway: GatewayBehavior,
    pub timeout: Option<Duration>,
}

impl Settings {
    /// A fresh context carrying the configured deadline, if any.
    pub fn request_context(&self) -> RequestContext {
        match self.timeout {
            Some(timeout) => RequestContext::with_timeout(timeout),
            None => RequestContext::new(),
        }
    }
}

impl TryFrom<GlobalArgs> for Settings {
    type Error = OrderError;

    fn try_from(args: GlobalArgs) -> Result<Self> {
        let currency = args.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OrderError::ValidationError(format!(
                "Currency '{}' is not a three-letter ISO code",
                args.currency
            )));
        }
        let timeout = match args.timeout_ms {
            Some(0) => {
                return Err(OrderError::ValidationError(
                    "Timeout must be greater than zero".to_string(),
                ));
            }
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        Ok(Self {
            db_path: args.db_path,
            catalog: args.catalog,
            payment: PaymentDefaults {
                currency,
                channel: args.channel,
            },
            gateway: args.gateway,
            timeout,
        })
    }
}
