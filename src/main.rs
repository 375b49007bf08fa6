use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;

use escrowd::config::Config;
use escrowd::db::{create_pool, init_db, queries, AppState};
use escrowd::gateway::GatewayClient;
use escrowd::handlers;
use escrowd::models::{CreateItem, CreatePayment, CreateUser, UserRole};
use escrowd::notify::Notifier;

/// Default platform fee when no rule matches: 5%.
const DEFAULT_FEE_BPS: i64 = 500;

#[derive(Parser, Debug)]
#[command(name = "escrowd")]
#[command(about = "Escrow payment and dispute resolution engine")]
struct Cli {
    /// Seed the database with dev data (admin, buyer, seller, item, fee rules)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for manual testing.
/// Creates: admin, buyer, seller, one item, tiered fee rules, and an
/// INITIATED payment ready for a simulated charge webhook.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .expect("Failed to count users");
    if existing > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let admin_key = queries::generate_api_key();
    let admin = queries::create_user(
        &conn,
        &CreateUser {
            name: "Dev Admin".to_string(),
            role: UserRole::Admin,
        },
        &admin_key,
    )
    .expect("Failed to create dev admin");
    tracing::info!("Admin: {} (id: {})", admin.name, admin.id);

    let buyer_key = queries::generate_api_key();
    let buyer = queries::create_user(
        &conn,
        &CreateUser {
            name: "Dev Buyer".to_string(),
            role: UserRole::Buyer,
        },
        &buyer_key,
    )
    .expect("Failed to create dev buyer");
    tracing::info!("Buyer: {} (id: {})", buyer.name, buyer.id);

    let seller_key = queries::generate_api_key();
    let seller = queries::create_user(
        &conn,
        &CreateUser {
            name: "Dev Seller".to_string(),
            role: UserRole::Seller,
        },
        &seller_key,
    )
    .expect("Failed to create dev seller");
    tracing::info!("Seller: {} (id: {})", seller.name, seller.id);

    let item = queries::create_item(
        &conn,
        &CreateItem {
            seller_id: seller.id.clone(),
            title: "Vintage Camera".to_string(),
            price_cents: 200_000,
            quantity: 1,
        },
    )
    .expect("Failed to create dev item");
    tracing::info!("Item: {} (id: {})", item.title, item.id);

    // Tiered fees: 5% below 500.00, 8% from 500.00 up.
    queries::create_fee_rule(&conn, 0, Some(50_000), 500, 0)
        .expect("Failed to create low-tier fee rule");
    queries::create_fee_rule(&conn, 50_000, None, 800, 1)
        .expect("Failed to create high-tier fee rule");
    tracing::info!("Fee rules: 5% below 500.00, 8% above");

    let payment = queries::create_payment(
        &conn,
        &CreatePayment {
            item_id: item.id.clone(),
            buyer_id: buyer.id.clone(),
            seller_id: seller.id.clone(),
            amount_cents: item.price_cents,
            currency: "USD".to_string(),
            gateway: "devgateway".to_string(),
        },
    )
    .expect("Failed to create dev payment");
    tracing::info!("Payment: {} (INITIATED, {} cents)", payment.id, payment.amount_cents);

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");

    // Copy-paste friendly output, no log formatting.
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  admin_api_key: {}", admin_key);
    println!("  buyer_api_key: {}", buyer_key);
    println!("  seller_api_key: {}", seller_key);
    println!("  item_id: {}", item.id);
    println!("  payment_id: {}", payment.id);
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "escrowd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");

    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
        queries::ensure_platform_settings(&conn, DEFAULT_FEE_BPS)
            .expect("Failed to initialize platform settings");
    }

    let state = AppState {
        db: db_pool,
        webhook_secret: config.gateway_webhook_secret.clone(),
        gateway: Arc::new(GatewayClient::new(
            &config.gateway_base_url,
            &config.gateway_webhook_secret,
        )),
        notifier: Arc::new(Notifier::new(config.notify_webhook_url.clone())),
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set ESCROWD_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = handlers::router(state).layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Escrowd server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
