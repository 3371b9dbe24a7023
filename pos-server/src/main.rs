use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use pos_server::db::repository::{audit, expense, order, product, report, setting};
use pos_server::{ApiResponse, AppError, AppResult, Config, ErrorCode, ServerState, init_logger_with_file};
use serde::Serialize;
use serde_json::Value;
use shared::models::{
    BackupKind, CartRequest, ExpenseCreate, Product, ProductCreate, ProductUpdate, SettingKey,
    StockAdjustmentCreate, UserCreate, UserRole,
};

#[derive(Parser)]
#[command(name = "pos-server", version, about = "Point-of-sale store: orders, backups, restore")]
struct Cli {
    /// Working directory (database, backups, logs)
    #[arg(long, env = "WORK_DIR", global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Backup catalog and restore
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Commit and inspect orders
    #[command(subcommand)]
    Order(OrderCommand),
    /// Product catalog and stock
    #[command(subcommand)]
    Product(ProductCommand),
    /// Store expenses
    #[command(subcommand)]
    Expense(ExpenseCommand),
    /// Staff accounts
    #[command(subcommand)]
    User(UserCommand),
    /// Audit trail
    #[command(subcommand)]
    Audit(AuditCommand),
    /// Store settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Sales and profit reports
    #[command(subcommand)]
    Report(ReportCommand),
    /// Keep running with auto backup until Ctrl-C
    Run,
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Take a manual backup
    Create,
    /// List cataloged backups, newest first
    List,
    /// Recompute one backup's checksum
    Verify { name: String },
    /// Restore a backup by name or archive path
    Restore { target: String },
    /// Copy a backup archive to a file or directory
    Export { name: String, destination: PathBuf },
    /// Apply the retention policy now
    Prune,
}

#[derive(Subcommand)]
enum OrderCommand {
    /// Price and commit a cart read from a JSON file
    Commit { cart: PathBuf },
    /// Show one order with items and payments
    Show { order_number: String },
    /// List recent orders
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Subcommand)]
enum ProductCommand {
    /// Add a product
    Add {
        #[arg(long)]
        sku: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        cost_price: Option<f64>,
        /// Percent, 0-100
        #[arg(long)]
        tax_rate: Option<f64>,
        #[arg(long)]
        stock: Option<i64>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change fields of a product; omitted fields are kept
    Update {
        sku: String,
        #[arg(long)]
        new_sku: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        cost_price: Option<f64>,
        #[arg(long)]
        tax_rate: Option<f64>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Deactivate a product
    Delete { sku: String },
    /// Add (or with a negative delta, remove) stock
    Adjust {
        sku: String,
        #[arg(allow_hyphen_values = true)]
        delta: i64,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List active products, optionally filtered
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Active products at or below a stock threshold
    LowStock {
        #[arg(long, default_value_t = 5)]
        threshold: i64,
    },
}

#[derive(Subcommand)]
enum ExpenseCommand {
    /// Record an expense dated now
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Expenses in a recent window
    List(RangeArgs),
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create an account
    Add {
        username: String,
        #[arg(long, env = "POS_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        display_name: Option<String>,
        /// admin, manager or cashier
        #[arg(long, value_parser = parse_role)]
        role: Option<UserRole>,
    },
    /// List all accounts
    List,
    /// Check a username and password
    Login {
        username: String,
        #[arg(long, env = "POS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Disable an account
    Disable { username: String },
    /// Re-enable an account
    Enable { username: String },
}

#[derive(Subcommand)]
enum AuditCommand {
    /// Most recent entries
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        /// e.g. order.commit, backup.restore
        #[arg(long)]
        action: Option<String>,
    },
}

fn parse_role(value: &str) -> Result<UserRole, String> {
    UserRole::parse(value).ok_or_else(|| format!("unknown role '{value}'"))
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Show typed store settings
    Show,
    /// Set one known setting
    Set { key: String, value: String },
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Order totals and top products
    Sales(RangeArgs),
    /// Revenue minus cost of goods and expenses
    Profit(RangeArgs),
}

#[derive(Args)]
struct RangeArgs {
    /// Number of days back from now
    #[arg(long, default_value_t = 1)]
    days: i64,
}

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

impl RangeArgs {
    fn range(&self) -> (i64, i64) {
        range_ending_at(shared::util::now_millis() + 1, self.days)
    }
}

/// `[end - days, end)`, clamped to the representable range
fn range_ending_at(end: i64, days: i64) -> (i64, i64) {
    let span = days.max(0).saturating_mul(DAY_MILLIS);
    (end.saturating_sub(span), end)
}

fn to_json<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::internal(e.to_string()))
}

async fn run_backup(state: &ServerState, command: BackupCommand) -> AppResult<Value> {
    let backups = &state.backups;
    match command {
        BackupCommand::Create => to_json(backups.create_backup(BackupKind::Manual).await?),
        BackupCommand::List => to_json(backups.list_backups().await?),
        BackupCommand::Verify { name } => to_json(backups.verify_backup(&name).await?),
        BackupCommand::Restore { target } => {
            let as_path = Path::new(&target);
            let path = if as_path.is_file() {
                as_path.to_path_buf()
            } else {
                backups.archive_path(&target)?
            };
            to_json(backups.restore_backup(&path).await?)
        }
        BackupCommand::Export { name, destination } => {
            let written = backups.export_backup(&name, &destination).await?;
            to_json(written.display().to_string())
        }
        BackupCommand::Prune => to_json(backups.clean_old_backups().await?),
    }
}

async fn read_cart(path: &Path) -> AppResult<CartRequest> {
    let raw = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::validation(format!("Invalid cart file {}: {e}", path.display()))
    })
}

async fn run_order(state: &ServerState, command: OrderCommand) -> AppResult<Value> {
    match command {
        OrderCommand::Commit { cart } => {
            let request = read_cart(&cart).await?;
            to_json(state.orders.commit_request(request).await?)
        }
        OrderCommand::Show { order_number } => {
            let pool = state.db.pool().await?;
            let detail = order::find_by_number(&pool, &order_number)
                .await?
                .ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::OrderNotFound,
                        format!("Order {order_number} not found"),
                    )
                })?;
            to_json(detail)
        }
        OrderCommand::List { limit, offset } => {
            let pool = state.db.pool().await?;
            to_json(order::find_all(&pool, limit, offset).await?)
        }
    }
}

async fn product_by_sku(pool: &sqlx::SqlitePool, sku: &str) -> AppResult<Product> {
    product::find_by_sku(pool, sku).await?.ok_or_else(|| {
        AppError::with_message(ErrorCode::ProductNotFound, format!("No product with SKU '{sku}'"))
    })
}

async fn run_product(state: &ServerState, command: ProductCommand) -> AppResult<Value> {
    let pool = state.db.pool().await?;
    match command {
        ProductCommand::Add {
            sku,
            name,
            price,
            cost_price,
            tax_rate,
            stock,
            unit,
            category,
            description,
        } => {
            let data = ProductCreate {
                sku,
                name,
                description,
                price,
                cost_price,
                tax_rate,
                stock_quantity: stock,
                unit,
                category,
            };
            to_json(product::create(&pool, data).await?)
        }
        ProductCommand::Update {
            sku,
            new_sku,
            name,
            price,
            cost_price,
            tax_rate,
            unit,
            category,
            description,
        } => {
            let existing = product_by_sku(&pool, &sku).await?;
            let data = ProductUpdate {
                sku: new_sku,
                name,
                description,
                price,
                cost_price,
                tax_rate,
                unit,
                category,
                is_active: None,
            };
            to_json(product::update(&pool, existing.id, data).await?)
        }
        ProductCommand::Delete { sku } => {
            let existing = product_by_sku(&pool, &sku).await?;
            product::soft_delete(&pool, existing.id).await?;
            to_json(existing.id)
        }
        ProductCommand::Adjust {
            sku,
            delta,
            reason,
            notes,
        } => {
            let existing = product_by_sku(&pool, &sku).await?;
            let data = StockAdjustmentCreate {
                product_id: existing.id,
                quantity_change: delta,
                reason,
                notes,
            };
            to_json(product::adjust_stock(&pool, data).await?)
        }
        ProductCommand::List { search } => match search {
            Some(query) => to_json(product::search(&pool, &query).await?),
            None => to_json(product::find_all(&pool).await?),
        },
        ProductCommand::LowStock { threshold } => {
            to_json(product::find_low_stock(&pool, threshold).await?)
        }
    }
}

async fn run_expense(state: &ServerState, command: ExpenseCommand) -> AppResult<Value> {
    let pool = state.db.pool().await?;
    match command {
        ExpenseCommand::Add {
            title,
            amount,
            category,
            notes,
        } => {
            let data = ExpenseCreate {
                title,
                amount,
                category,
                notes,
                expense_date: None,
            };
            to_json(expense::create(&pool, data).await?)
        }
        ExpenseCommand::List(args) => {
            let (start, end) = args.range();
            to_json(expense::find_by_range(&pool, start, end).await?)
        }
    }
}

async fn run_user(state: &ServerState, command: UserCommand) -> AppResult<Value> {
    let auth = &state.auth;
    match command {
        UserCommand::Add {
            username,
            password,
            display_name,
            role,
        } => {
            let data = UserCreate {
                username,
                password,
                display_name,
                role,
            };
            to_json(auth.create_user(data).await?)
        }
        UserCommand::List => to_json(auth.list_users().await?),
        UserCommand::Login { username, password } => {
            to_json(auth.login(&username, &password).await?)
        }
        UserCommand::Disable { username } => to_json(auth.set_active(&username, false).await?),
        UserCommand::Enable { username } => to_json(auth.set_active(&username, true).await?),
    }
}

async fn run_audit(state: &ServerState, command: AuditCommand) -> AppResult<Value> {
    let pool = state.db.pool().await?;
    match command {
        AuditCommand::List { limit, action } => match action {
            Some(action) => to_json(audit::find_by_action(&pool, &action).await?),
            None => to_json(audit::find_recent(&pool, limit).await?),
        },
    }
}

async fn run_settings(state: &ServerState, command: SettingsCommand) -> AppResult<Value> {
    let pool = state.db.pool().await?;
    match command {
        SettingsCommand::Show => to_json(setting::load(&pool).await?),
        SettingsCommand::Set { key, value } => {
            let known = SettingKey::parse(&key).ok_or_else(|| {
                AppError::validation(format!("Unknown setting: {key}"))
                    .with_detail("known", SettingKey::ALL.map(|k| k.as_str()).to_vec())
            })?;
            setting::set_known(&pool, known, &value).await?;
            to_json(setting::load(&pool).await?)
        }
    }
}

async fn run_report(state: &ServerState, command: ReportCommand) -> AppResult<Value> {
    let pool = state.db.pool().await?;
    match command {
        ReportCommand::Sales(args) => {
            let (start, end) = args.range();
            to_json(report::sales(&pool, start, end).await?)
        }
        ReportCommand::Profit(args) => {
            let (start, end) = args.range();
            to_json(report::profit(&pool, start, end).await?)
        }
    }
}

async fn run_until_ctrl_c(state: &ServerState) -> AppResult<Value> {
    let period = state.auto_backup.start().await;
    tracing::info!(period_minutes = period.as_secs() / 60, "Running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    state.auto_backup.stop().await;
    to_json("stopped")
}

async fn dispatch(state: &ServerState, command: Command) -> AppResult<Value> {
    match command {
        Command::Backup(c) => run_backup(state, c).await,
        Command::Order(c) => run_order(state, c).await,
        Command::Product(c) => run_product(state, c).await,
        Command::Expense(c) => run_expense(state, c).await,
        Command::User(c) => run_user(state, c).await,
        Command::Audit(c) => run_audit(state, c).await,
        Command::Settings(c) => run_settings(state, c).await,
        Command::Report(c) => run_report(state, c).await,
        Command::Run => run_until_ctrl_c(state).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 工作目录, 日志)
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // 2. 加载配置
    let mut config = Config::from_env();
    if let Some(dir) = cli.work_dir {
        config.work_dir = dir;
    }
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    // 3. 初始化服务状态
    let state = ServerState::initialize(&config).await?;

    // 4. 执行命令
    let result = dispatch(&state, cli.command).await;
    if let Err(e) = state.shutdown().await {
        tracing::warn!(error = %e, "Shutdown did not complete cleanly");
    }

    let failed = result.is_err();
    let response = ApiResponse::from_result(result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_spans_whole_days() {
        let (start, end) = range_ending_at(10 * DAY_MILLIS, 3);
        assert_eq!(end - start, 3 * DAY_MILLIS);
        assert_eq!(range_ending_at(1_000, -4), (1_000, 1_000));
    }

    #[test]
    fn test_huge_day_count_saturates() {
        let end = shared::util::now_millis() + 1;
        let (start, got_end) = range_ending_at(end, i64::MAX);
        assert_eq!(got_end, end);
        assert_eq!(start, end - i64::MAX);
        assert!(start <= end);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "pos-server", "product", "adjust", "COF-001", "-3", "--reason", "breakage",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Product(ProductCommand::Adjust { delta: -3, .. })
        ));

        let cli = Cli::try_parse_from([
            "pos-server", "report", "sales", "--days", "9223372036854775807",
        ])
        .unwrap();
        let Command::Report(ReportCommand::Sales(args)) = cli.command else {
            panic!("expected report sales");
        };
        let (start, end) = args.range();
        assert!(start <= end);

        let bad_role = Cli::try_parse_from([
            "pos-server", "user", "add", "x", "--password", "p", "--role", "owner",
        ]);
        assert!(bad_role.is_err());
    }
}
