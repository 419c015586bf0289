//! SQLite order ledger
//!
//! Orders are merged, never replaced: an incoming `NULL` keeps whatever was
//! stored before. Derived analytics columns are recomputed from the merged
//! row right after every upsert.

use crate::error::LedgerError;
use crate::models::{
    AccountSettings, AlertTags, InstrumentSpec, Order, OutcomeStatus, ProcessedAlertKey, Reality,
    Side, TradingMode, WebhookOutcome,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS orders (
        order_id TEXT PRIMARY KEY,
        login TEXT NOT NULL,
        symbol TEXT,
        side TEXT,
        volume REAL,
        reality TEXT NOT NULL,
        open_price REAL,
        close_price REAL,
        take_profit REAL,
        stop_loss REAL,
        open_time INTEGER,
        close_time INTEGER,
        profit REAL,
        swap REAL,
        commission REAL,
        leverage REAL,
        margin REAL,
        margin_rate REAL,
        request_id TEXT,
        is_fifo INTEGER,
        reference_price REAL,
        consider_reference INTEGER,
        bid_at_open REAL,
        ask_at_open REAL,
        spread_at_open REAL,
        real_tp_pips REAL,
        real_sl_pips REAL,
        reference_deviation_pips REAL,
        duration_minutes INTEGER,
        max_size REAL,
        alert_id TEXT,
        max_reference_age TEXT,
        timeframe TEXT,
        exchange TEXT,
        tag_ft TEXT,
        tag_ff TEXT,
        tag_fd TEXT,
        tag_lh TEXT,
        tag_fr TEXT,
        last_update_time INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_orders_login_open ON orders (login, open_time DESC)",
    "CREATE INDEX IF NOT EXISTS idx_orders_alert ON orders (alert_id, login)",
    r#"CREATE TABLE IF NOT EXISTS webhook_outcomes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account TEXT NOT NULL,
        alert_id TEXT,
        status TEXT NOT NULL,
        message TEXT NOT NULL,
        symbol TEXT,
        action TEXT,
        size REAL,
        order_id TEXT,
        timestamp INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_outcomes_account ON webhook_outcomes (account, timestamp DESC)",
    r#"CREATE TABLE IF NOT EXISTS processed_alert_ids (
        alert_id TEXT NOT NULL,
        account TEXT NOT NULL,
        processed_at INTEGER NOT NULL,
        PRIMARY KEY (alert_id, account)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS account_settings (
        account TEXT PRIMARY KEY,
        trading_mode TEXT NOT NULL DEFAULT 'NORMAL',
        asia_session INTEGER NOT NULL DEFAULT 1,
        london_session INTEGER NOT NULL DEFAULT 1,
        new_york_session INTEGER NOT NULL DEFAULT 1,
        overlap_session INTEGER NOT NULL DEFAULT 1,
        exclusive_mode INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL
    )"#,
];

const UPSERT_ORDER: &str = r#"
INSERT INTO orders (
    order_id, login, symbol, side, volume, reality,
    open_price, close_price, take_profit, stop_loss, open_time, close_time,
    profit, swap, commission, leverage, margin, margin_rate, request_id, is_fifo,
    reference_price, consider_reference, bid_at_open, ask_at_open, spread_at_open,
    real_tp_pips, real_sl_pips, reference_deviation_pips, duration_minutes, max_size,
    alert_id, max_reference_age, timeframe, exchange,
    tag_ft, tag_ff, tag_fd, tag_lh, tag_fr, last_update_time
) VALUES (
    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
)
ON CONFLICT(order_id) DO UPDATE SET
    login = COALESCE(excluded.login, orders.login),
    symbol = COALESCE(excluded.symbol, orders.symbol),
    side = COALESCE(excluded.side, orders.side),
    volume = COALESCE(excluded.volume, orders.volume),
    reality = excluded.reality,
    open_price = COALESCE(excluded.open_price, orders.open_price),
    close_price = COALESCE(excluded.close_price, orders.close_price),
    take_profit = COALESCE(excluded.take_profit, orders.take_profit),
    stop_loss = COALESCE(excluded.stop_loss, orders.stop_loss),
    open_time = COALESCE(excluded.open_time, orders.open_time),
    close_time = COALESCE(excluded.close_time, orders.close_time),
    profit = COALESCE(excluded.profit, orders.profit),
    swap = COALESCE(excluded.swap, orders.swap),
    commission = COALESCE(excluded.commission, orders.commission),
    leverage = COALESCE(excluded.leverage, orders.leverage),
    margin = COALESCE(excluded.margin, orders.margin),
    margin_rate = COALESCE(excluded.margin_rate, orders.margin_rate),
    request_id = COALESCE(excluded.request_id, orders.request_id),
    is_fifo = COALESCE(excluded.is_fifo, orders.is_fifo),
    reference_price = COALESCE(excluded.reference_price, orders.reference_price),
    consider_reference = COALESCE(excluded.consider_reference, orders.consider_reference),
    bid_at_open = COALESCE(excluded.bid_at_open, orders.bid_at_open),
    ask_at_open = COALESCE(excluded.ask_at_open, orders.ask_at_open),
    spread_at_open = COALESCE(excluded.spread_at_open, orders.spread_at_open),
    real_tp_pips = COALESCE(excluded.real_tp_pips, orders.real_tp_pips),
    real_sl_pips = COALESCE(excluded.real_sl_pips, orders.real_sl_pips),
    reference_deviation_pips = COALESCE(excluded.reference_deviation_pips, orders.reference_deviation_pips),
    duration_minutes = COALESCE(excluded.duration_minutes, orders.duration_minutes),
    max_size = COALESCE(excluded.max_size, orders.max_size),
    alert_id = COALESCE(excluded.alert_id, orders.alert_id),
    max_reference_age = COALESCE(excluded.max_reference_age, orders.max_reference_age),
    timeframe = COALESCE(excluded.timeframe, orders.timeframe),
    exchange = COALESCE(excluded.exchange, orders.exchange),
    tag_ft = COALESCE(excluded.tag_ft, orders.tag_ft),
    tag_ff = COALESCE(excluded.tag_ff, orders.tag_ff),
    tag_fd = COALESCE(excluded.tag_fd, orders.tag_fd),
    tag_lh = COALESCE(excluded.tag_lh, orders.tag_lh),
    tag_fr = COALESCE(excluded.tag_fr, orders.tag_fr),
    last_update_time = excluded.last_update_time
"#;

/// Recompute analytics columns from the stored row; `?1` is the pip value,
/// NULL while the symbol is unknown
const DERIVE_ORDER: &str = r#"
UPDATE orders SET
    duration_minutes = CASE
        WHEN open_time IS NOT NULL AND close_time IS NOT NULL AND close_time > open_time
        THEN CAST(ROUND((close_time - open_time) / 60000.0) AS INTEGER)
        ELSE duration_minutes END,
    real_tp_pips = CASE
        WHEN ?1 IS NOT NULL AND take_profit IS NOT NULL AND open_price IS NOT NULL
        THEN ROUND(ABS(take_profit - open_price) / ?1, 2)
        ELSE real_tp_pips END,
    real_sl_pips = CASE
        WHEN ?1 IS NOT NULL AND stop_loss IS NOT NULL AND open_price IS NOT NULL
        THEN ROUND(ABS(stop_loss - open_price) / ?1, 2)
        ELSE real_sl_pips END,
    reference_deviation_pips = CASE
        WHEN ?1 IS NOT NULL AND reference_price IS NOT NULL AND open_price IS NOT NULL
        THEN ROUND(ABS(open_price - reference_price) / ?1, 2)
        ELSE reference_deviation_pips END
WHERE order_id = ?2
"#;

const ORDER_COLUMNS: &str = "order_id, login, symbol, side, volume, reality, \
    open_price, close_price, take_profit, stop_loss, open_time, close_time, \
    profit, swap, commission, leverage, margin, margin_rate, request_id, is_fifo, \
    reference_price, consider_reference, bid_at_open, ask_at_open, spread_at_open, \
    real_tp_pips, real_sl_pips, reference_deviation_pips, duration_minutes, max_size, \
    alert_id, max_reference_age, timeframe, exchange, \
    tag_ft, tag_ff, tag_fd, tag_lh, tag_fr";

#[derive(Debug, FromRow)]
struct OrderRow {
    order_id: String,
    login: String,
    symbol: Option<String>,
    side: Option<String>,
    volume: Option<f64>,
    reality: String,
    open_price: Option<f64>,
    close_price: Option<f64>,
    take_profit: Option<f64>,
    stop_loss: Option<f64>,
    open_time: Option<i64>,
    close_time: Option<i64>,
    profit: Option<f64>,
    swap: Option<f64>,
    commission: Option<f64>,
    leverage: Option<f64>,
    margin: Option<f64>,
    margin_rate: Option<f64>,
    request_id: Option<String>,
    is_fifo: Option<bool>,
    reference_price: Option<f64>,
    consider_reference: Option<bool>,
    bid_at_open: Option<f64>,
    ask_at_open: Option<f64>,
    spread_at_open: Option<f64>,
    real_tp_pips: Option<f64>,
    real_sl_pips: Option<f64>,
    reference_deviation_pips: Option<f64>,
    duration_minutes: Option<i64>,
    max_size: Option<f64>,
    alert_id: Option<String>,
    max_reference_age: Option<String>,
    timeframe: Option<String>,
    exchange: Option<String>,
    tag_ft: Option<String>,
    tag_ff: Option<String>,
    tag_fd: Option<String>,
    tag_lh: Option<String>,
    tag_fr: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = LedgerError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let side = row
            .side
            .as_deref()
            .map(|side| {
                Side::from_str(side).map_err(|_| LedgerError::InvalidValue {
                    column: "side",
                    value: side.to_string(),
                })
            })
            .transpose()?;
        let reality = Reality::from_str(&row.reality).map_err(|_| LedgerError::InvalidValue {
            column: "reality",
            value: row.reality.clone(),
        })?;

        let mut order = Order::partial(row.order_id, row.login, reality);
        order.symbol = row.symbol;
        order.side = side;
        order.volume = row.volume;
        order.open_price = row.open_price;
        order.close_price = row.close_price;
        order.take_profit = row.take_profit;
        order.stop_loss = row.stop_loss;
        order.open_time = row.open_time;
        order.close_time = row.close_time;
        order.profit = row.profit;
        order.swap = row.swap;
        order.commission = row.commission;
        order.leverage = row.leverage;
        order.margin = row.margin;
        order.margin_rate = row.margin_rate;
        order.request_id = row.request_id;
        order.is_fifo = row.is_fifo;
        order.reference_price = row.reference_price;
        order.consider_reference = row.consider_reference;
        order.bid_at_open = row.bid_at_open;
        order.ask_at_open = row.ask_at_open;
        order.spread_at_open = row.spread_at_open;
        order.real_tp_pips = row.real_tp_pips;
        order.real_sl_pips = row.real_sl_pips;
        order.reference_deviation_pips = row.reference_deviation_pips;
        order.duration_minutes = row.duration_minutes;
        order.max_size = row.max_size;
        order.alert_id = row.alert_id;
        order.max_reference_age = row.max_reference_age;
        order.timeframe = row.timeframe;
        order.exchange = row.exchange;
        order.tags = AlertTags {
            ft: row.tag_ft,
            ff: row.tag_ff,
            fd: row.tag_fd,
            lh: row.tag_lh,
            fr: row.tag_fr,
        };
        Ok(order)
    }
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    trading_mode: String,
    asia_session: bool,
    london_session: bool,
    new_york_session: bool,
    overlap_session: bool,
    exclusive_mode: bool,
}

#[derive(Debug, FromRow)]
struct OutcomeRow {
    account: String,
    alert_id: Option<String>,
    status: String,
    message: String,
    symbol: Option<String>,
    action: Option<String>,
    size: Option<f64>,
    order_id: Option<String>,
    timestamp: i64,
}

impl TryFrom<OutcomeRow> for WebhookOutcome {
    type Error = LedgerError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        let status = OutcomeStatus::parse(&row.status).ok_or_else(|| LedgerError::InvalidValue {
            column: "status",
            value: row.status.clone(),
        })?;
        Ok(WebhookOutcome {
            account: row.account,
            alert_id: row.alert_id,
            status,
            message: row.message,
            symbol: row.symbol,
            action: row.action,
            size: row.size,
            order_id: row.order_id,
            timestamp: row.timestamp,
        })
    }
}

/// Durable store of orders, outcomes, processed alert keys and account settings
#[derive(Clone)]
pub struct OrderLedger {
    pool: SqlitePool,
}

impl OrderLedger {
    /// Open (creating if missing) the database at `url` with a bounded pool
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.init_schema().await?;
        info!(url = %url, max_connections = max_connections, "OrderLedger: connected");
        Ok(ledger)
    }

    /// Private in-memory database; one pinned connection keeps it alive
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.init_schema().await?;
        Ok(ledger)
    }

    async fn init_schema(&self) -> Result<(), LedgerError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("OrderLedger: schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert or merge an order, then refresh its derived columns.
    ///
    /// Both statements run in one transaction, so a merged row never keeps
    /// analytics computed from its previous values.
    pub async fn upsert_order(&self, order: &Order) -> Result<(), LedgerError> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query(UPSERT_ORDER)
            .bind(&order.order_id)
            .bind(&order.login)
            .bind(&order.symbol)
            .bind(order.side.map(|side| side.as_str()))
            .bind(order.volume)
            .bind(order.reality.as_str())
            .bind(order.open_price)
            .bind(order.close_price)
            .bind(order.take_profit)
            .bind(order.stop_loss)
            .bind(order.open_time)
            .bind(order.close_time)
            .bind(order.profit)
            .bind(order.swap)
            .bind(order.commission)
            .bind(order.leverage)
            .bind(order.margin)
            .bind(order.margin_rate)
            .bind(&order.request_id)
            .bind(order.is_fifo)
            .bind(order.reference_price)
            .bind(order.consider_reference)
            .bind(order.bid_at_open)
            .bind(order.ask_at_open)
            .bind(order.spread_at_open)
            .bind(order.real_tp_pips)
            .bind(order.real_sl_pips)
            .bind(order.reference_deviation_pips)
            .bind(order.duration_minutes)
            .bind(order.max_size)
            .bind(&order.alert_id)
            .bind(&order.max_reference_age)
            .bind(&order.timeframe)
            .bind(&order.exchange)
            .bind(&order.tags.ft)
            .bind(&order.tags.ff)
            .bind(&order.tags.fd)
            .bind(&order.tags.lh)
            .bind(&order.tags.fr)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        // Pip size follows the merged symbol, which a partial update may omit.
        let (symbol,): (Option<String>,) =
            sqlx::query_as("SELECT symbol FROM orders WHERE order_id = ?")
                .bind(&order.order_id)
                .fetch_one(&mut *tx)
                .await?;
        let pip_value = symbol.map(|s| InstrumentSpec::lookup(&s).pip_value);
        sqlx::query(DERIVE_ORDER)
            .bind(pip_value)
            .bind(&order.order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(order_id = %order.order_id, login = %order.login, "OrderLedger: order upserted");
        Ok(())
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, LedgerError> {
        let sql = format!("SELECT {} FROM orders WHERE order_id = ?", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    /// Whether an order placed from this alert is already recorded for the account
    pub async fn order_exists(&self, alert_id: &str, account: &str) -> Result<bool, LedgerError> {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM orders WHERE alert_id = ? AND login = ? LIMIT 1")
                .bind(alert_id)
                .bind(account)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Newest orders first
    pub async fn get_recent_orders(
        &self,
        account: &str,
        limit: u32,
    ) -> Result<Vec<Order>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE login = ? ORDER BY open_time DESC LIMIT ?",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(account)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    pub async fn get_orders_for_account(&self, account: &str) -> Result<Vec<Order>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE login = ? ORDER BY open_time DESC",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(account)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    pub async fn get_orders_for_symbol(
        &self,
        account: &str,
        symbol: &str,
    ) -> Result<Vec<Order>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE login = ? AND symbol = ? ORDER BY open_time ASC",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(account)
            .bind(symbol)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    /// Stamp the account's latest exposure limit on all its stored orders
    pub async fn update_max_size(&self, account: &str, max_size: f64) -> Result<u64, LedgerError> {
        let result = sqlx::query("UPDATE orders SET max_size = ? WHERE login = ?")
            .bind(max_size)
            .bind(account)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Settings for the account, or the defaults when none are stored
    pub async fn get_account_settings(&self, account: &str) -> Result<AccountSettings, LedgerError> {
        let row: Option<SettingsRow> = sqlx::query_as(
            "SELECT trading_mode, asia_session, london_session, new_york_session, \
             overlap_session, exclusive_mode FROM account_settings WHERE account = ?",
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(AccountSettings::default());
        };

        let trading_mode =
            TradingMode::from_str(&row.trading_mode).map_err(|_| LedgerError::InvalidValue {
                column: "trading_mode",
                value: row.trading_mode.clone(),
            })?;

        Ok(AccountSettings {
            trading_mode,
            asia_session: row.asia_session,
            london_session: row.london_session,
            new_york_session: row.new_york_session,
            overlap_session: row.overlap_session,
            exclusive_mode: row.exclusive_mode,
        })
    }

    /// Administrative write; the pipeline itself only reads settings
    pub async fn save_account_settings(
        &self,
        account: &str,
        settings: &AccountSettings,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r#"INSERT INTO account_settings (
                account, trading_mode, asia_session, london_session, new_york_session,
                overlap_session, exclusive_mode, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account) DO UPDATE SET
                trading_mode = excluded.trading_mode,
                asia_session = excluded.asia_session,
                london_session = excluded.london_session,
                new_york_session = excluded.new_york_session,
                overlap_session = excluded.overlap_session,
                exclusive_mode = excluded.exclusive_mode,
                updated_at = excluded.updated_at"#,
        )
        .bind(account)
        .bind(settings.trading_mode.as_str())
        .bind(settings.asia_session)
        .bind(settings.london_session)
        .bind(settings.new_york_session)
        .bind(settings.overlap_session)
        .bind(settings.exclusive_mode)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_webhook_outcome(&self, outcome: &WebhookOutcome) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO webhook_outcomes \
             (account, alert_id, status, message, symbol, action, size, order_id, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&outcome.account)
        .bind(&outcome.alert_id)
        .bind(outcome.status.as_str())
        .bind(&outcome.message)
        .bind(&outcome.symbol)
        .bind(&outcome.action)
        .bind(outcome.size)
        .bind(&outcome.order_id)
        .bind(outcome.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest outcomes first for one account
    pub async fn get_webhook_outcomes(
        &self,
        account: &str,
        limit: u32,
    ) -> Result<Vec<WebhookOutcome>, LedgerError> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            "SELECT account, alert_id, status, message, symbol, action, size, order_id, timestamp \
             FROM webhook_outcomes WHERE account = ? ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(account)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WebhookOutcome::try_from).collect()
    }

    /// Newest outcomes first across all accounts
    pub async fn get_recent_log_entries(&self, limit: u32) -> Result<Vec<WebhookOutcome>, LedgerError> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            "SELECT account, alert_id, status, message, symbol, action, size, order_id, timestamp \
             FROM webhook_outcomes ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WebhookOutcome::try_from).collect()
    }

    pub async fn mark_processed(&self, key: &ProcessedAlertKey) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT OR IGNORE INTO processed_alert_ids (alert_id, account, processed_at) \
             VALUES (?, ?, ?)",
        )
        .bind(&key.alert_id)
        .bind(&key.account)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_processed_keys(&self) -> Result<HashSet<ProcessedAlertKey>, LedgerError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT alert_id, account FROM processed_alert_ids")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(alert_id, account)| ProcessedAlertKey { alert_id, account })
            .collect())
    }
}
