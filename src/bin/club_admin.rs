use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use uuid::Uuid;

use beach_club_api::{
    config::{self, AppConfig},
    db,
    lifecycle::PaymentMethod,
    services::invoices::CloseOutcome,
    AppState,
};

#[derive(Parser)]
#[command(name = "club-admin", about = "Maintenance commands for the beach club back office", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Print an argon2 hash suitable for APP__OPERATOR_PASSWORD_HASH
    HashPassword { password: String },
    /// Print the receipt of a client's open orders without closing them
    Receipt(ClientArgs),
    /// Close every open order of a client with one payment method
    Close(CloseArgs),
}

#[derive(Args)]
struct ClientArgs {
    client_id: Uuid,
}

#[derive(Args)]
struct CloseArgs {
    client_id: Uuid,
    #[arg(long, value_enum)]
    payment: PaymentArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum PaymentArg {
    Debit,
    Credit,
    Pix,
}

impl From<PaymentArg> for PaymentMethod {
    fn from(arg: PaymentArg) -> Self {
        match arg {
            PaymentArg::Debit => PaymentMethod::Debit,
            PaymentArg::Credit => PaymentMethod::Credit,
            PaymentArg::Pix => PaymentMethod::Pix,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::HashPassword { password } = &cli.command {
        let hash = beach_club_api::auth::hash_password(password).context("failed to hash password")?;
        println!("{hash}");
        return Ok(());
    }

    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    match cli.command {
        Commands::Migrate => migrate(&config).await?,
        Commands::Receipt(args) => receipt(config, args, cli.json).await?,
        Commands::Close(args) => close(config, args, cli.json).await?,
        Commands::HashPassword { .. } => {}
    }

    Ok(())
}

async fn migrate(config: &AppConfig) -> Result<()> {
    let conn = db::establish_connection(&db::DbConfig::from(config))
        .await
        .context("failed to connect to database")?;
    db::run_migrations(&conn)
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied");
    Ok(())
}

async fn receipt(config: AppConfig, args: ClientArgs, json: bool) -> Result<()> {
    let state = AppState::new(config);
    let preview = state
        .services
        .invoices
        .preview(args.client_id)
        .await
        .context("failed to build invoice")?;

    if json {
        print_json(&preview)?;
    } else {
        print!("{}", preview.receipt);
    }
    Ok(())
}

async fn close(config: AppConfig, args: CloseArgs, json: bool) -> Result<()> {
    let state = AppState::new(config);
    let outcome = state
        .services
        .invoices
        .close(args.client_id, args.payment.into())
        .await
        .context("failed to close invoice")?;

    if json {
        return print_json(&outcome);
    }
    match outcome {
        CloseOutcome::Closed {
            orders_closed,
            status,
            receipt,
            ..
        } => {
            print!("{receipt}");
            println!("{orders_closed} order(s) closed as {status}");
        }
        CloseOutcome::NothingToClose { client_id } => {
            println!("Client {client_id} has no open orders");
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
