use clap::{Parser, Subcommand};
use orderflow::application::orchestrator::{NewOrder, OrderOrchestrator};
use orderflow::config::{GlobalArgs, Settings};
use orderflow::context::RequestContext;
use orderflow::domain::order::{OrderId, OrderStatus};
use orderflow::domain::ports::{
    OrderRepositoryBox, PaymentGatewayBox, PaymentRepositoryBox, ProductValidatorBox,
};
use orderflow::error::{OrderError, Result};
use orderflow::infrastructure::catalog::InMemoryCatalog;
use orderflow::infrastructure::gateway::SimulatedGateway;
use orderflow::infrastructure::in_memory::{InMemoryOrderRepository, InMemoryPaymentRepository};
#[cfg(feature = "storage-rocksdb")]
use orderflow::infrastructure::rocksdb::RocksDBStore;
use orderflow::interfaces::csv::catalog_reader::CatalogReader;
use orderflow::interfaces::csv::line_item_reader::LineItemReader;
use orderflow::interfaces::view::{CreatedView, OrderView, ReceiptView};
use serde::Serialize;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an order from a line-item CSV file
    Create {
        #[arg(long)]
        customer: String,
        /// Line items CSV (`product_id,quantity,unit_price`)
        #[arg(long)]
        items: PathBuf,
        /// Makes the request replayable: the same key always yields the same order
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Create an order, pay it and confirm the payment in one run
    Checkout {
        #[arg(long)]
        customer: String,
        #[arg(long)]
        items: PathBuf,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Start or retry the payment of an order
    Pay { order_id: String },
    /// Mark a pending order paid once its payment is confirmed
    Confirm { order_id: String },
    /// Cancel an order
    Cancel { order_id: String },
    /// Mark a paid order shipped
    Ship { order_id: String },
    /// Complete a shipped order
    Complete { order_id: String },
    /// Print an order and its current payment
    Show { order_id: String },
    /// Replace the line items of an order that has not entered payment
    Update {
        order_id: String,
        #[arg(long)]
        items: PathBuf,
        /// Version the caller last read; a stale version is rejected
        #[arg(long)]
        version: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::try_from(cli.global)?;
    let orchestrator = build_orchestrator(&settings)?;

    let shutdown = CancellationToken::new();
    let ctx = settings.request_context().with_cancellation(shutdown.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling the current operation");
            shutdown.cancel();
        }
    });

    match cli.command {
        Command::Create {
            customer,
            items,
            idempotency_key,
        } => {
            let request = new_order(customer, &items, idempotency_key)?;
            let order_id = orchestrator.create_order(&ctx, request).await?;
            print_json(&CreatedView {
                order_id: order_id.to_string(),
            })
        }
        Command::Checkout {
            customer,
            items,
            idempotency_key,
        } => {
            let request = new_order(customer, &items, idempotency_key)?;
            let order_id = orchestrator.create_order(&ctx, request).await?;
            match orchestrator.pay_order(&ctx, &order_id).await {
                Ok(_) | Err(OrderError::PaymentAlreadySettled { .. }) => {}
                Err(err) => return Err(err),
            }
            let order = orchestrator.get_order(&ctx, &order_id).await?;
            if order.status == OrderStatus::Pending {
                orchestrator.confirm_payment(&ctx, &order_id).await?;
            }
            show(&orchestrator, &ctx, &order_id).await
        }
        Command::Pay { order_id } => {
            let order_id = OrderId::new(order_id);
            match orchestrator.pay_order(&ctx, &order_id).await {
                Ok(receipt) => print_json(&ReceiptView::from(&receipt)),
                Err(OrderError::PaymentAlreadySettled {
                    order_id,
                    payment_id,
                }) => {
                    tracing::info!(%order_id, %payment_id, "Order already settled; nothing to charge");
                    print_json(&ReceiptView {
                        order_id,
                        payment_id,
                        status: "completed".to_string(),
                        reused: true,
                    })
                }
                Err(err) => Err(err),
            }
        }
        Command::Confirm { order_id } => {
            let order = orchestrator
                .confirm_payment(&ctx, &OrderId::new(order_id))
                .await?;
            show(&orchestrator, &ctx, &order.id).await
        }
        Command::Cancel { order_id } => {
            let order = orchestrator
                .cancel_order(&ctx, &OrderId::new(order_id))
                .await?;
            print_json(&OrderView::new(&order, None))
        }
        Command::Ship { order_id } => {
            let order = orchestrator
                .ship_order(&ctx, &OrderId::new(order_id))
                .await?;
            print_json(&OrderView::new(&order, None))
        }
        Command::Complete { order_id } => {
            let order = orchestrator
                .complete_order(&ctx, &OrderId::new(order_id))
                .await?;
            print_json(&OrderView::new(&order, None))
        }
        Command::Show { order_id } => show(&orchestrator, &ctx, &OrderId::new(order_id)).await,
        Command::Update {
            order_id,
            items,
            version,
        } => {
            let lines = LineItemReader::new(File::open(&items)?).read_all()?;
            let order = orchestrator
                .replace_items(&ctx, &OrderId::new(order_id), version, &lines)
                .await?;
            print_json(&OrderView::new(&order, None))
        }
    }
}

fn build_orchestrator(settings: &Settings) -> Result<OrderOrchestrator> {
    let (order_repo, payment_repo): (OrderRepositoryBox, PaymentRepositoryBox) =
        match &settings.db_path {
            #[cfg(feature = "storage-rocksdb")]
            Some(db_path) => {
                let store = RocksDBStore::open(db_path)?;
                (Box::new(store.clone()), Box::new(store))
            }
            #[cfg(not(feature = "storage-rocksdb"))]
            Some(_) => {
                tracing::warn!(
                    "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
                );
                in_memory_repositories()
            }
            None => in_memory_repositories(),
        };

    let products: ProductValidatorBox = match &settings.catalog {
        Some(path) => Box::new(load_catalog(path)?),
        None => Box::new(InMemoryCatalog::open()),
    };
    let gateway: PaymentGatewayBox = Box::new(SimulatedGateway::new(settings.gateway));

    Ok(OrderOrchestrator::new(
        order_repo,
        payment_repo,
        products,
        gateway,
        settings.payment.clone(),
    ))
}

fn in_memory_repositories() -> (OrderRepositoryBox, PaymentRepositoryBox) {
    (
        Box::new(InMemoryOrderRepository::new()),
        Box::new(InMemoryPaymentRepository::new()),
    )
}

fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let products = CatalogReader::new(File::open(path)?).read_all()?;
    tracing::debug!(count = products.len(), "Catalog loaded");
    Ok(InMemoryCatalog::closed(products))
}

fn new_order(customer_id: String, items: &Path, idempotency_key: Option<String>) -> Result<NewOrder> {
    let lines = LineItemReader::new(File::open(items)?).read_all()?;
    Ok(NewOrder {
        customer_id,
        lines,
        idempotency_key,
    })
}

async fn show(orchestrator: &OrderOrchestrator, ctx: &RequestContext, order_id: &OrderId) -> Result<()> {
    let order = orchestrator.get_order(ctx, order_id).await?;
    let payment = match orchestrator.get_payment(ctx, order_id).await {
        Ok(payment) => Some(payment),
        Err(OrderError::PaymentNotFound(_)) => None,
        Err(err) => return Err(err),
    };
    print_json(&OrderView::new(&order, payment.as_ref()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
