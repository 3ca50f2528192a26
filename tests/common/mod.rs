use std::time::Duration;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, MutexGuard};

use crypto_pipeline::config::CoinGeckoSettings;

/// Coin detail payload with every market field populated
#[allow(dead_code)]
pub const BITCOIN_DETAIL: &str = r#"{
    "id": "bitcoin",
    "symbol": "btc",
    "name": "Bitcoin",
    "market_data": {
        "current_price": {"usd": 104000.5},
        "market_cap": {"usd": 2065000000000},
        "total_volume": {"usd": 31000000000},
        "price_change_24h": 850.25,
        "price_change_percentage_24h": 0.82,
        "circulating_supply": 19875000,
        "total_supply": 21000000,
        "ath": {"usd": 111814},
        "ath_date": {"usd": "2025-05-22T18:41:28.492Z"},
        "atl": {"usd": 67.81},
        "atl_date": {"usd": "2013-07-06T00:00:00.000Z"}
    }
}"#;

static DB_LOCK: Mutex<()> = Mutex::const_new(());

/// Tests in one binary share the database; hold this for the whole test
#[allow(dead_code)]
pub async fn lock_db() -> MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

/// Set up test database connection from TEST_DATABASE_URL.
/// Returns None when the variable is unset so the caller can skip.
#[allow(dead_code)]
pub async fn setup_test_db() -> Option<DatabaseConnection> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    match Database::connect(&database_url).await {
        Ok(db) => Some(db),
        Err(e) => panic!("TEST_DATABASE_URL is set but connecting failed: {}", e),
    }
}

/// Start every test from an absent price table
#[allow(dead_code)]
pub async fn drop_price_table(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared("DROP TABLE IF EXISTS crypto_prices").await?;
    Ok(())
}

/// A canned HTTP response for the stub server
#[allow(dead_code)]
#[derive(Clone)]
pub struct StubResponse {
    pub path_prefix: &'static str,
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

#[allow(dead_code)]
impl StubResponse {
    pub fn ok(path_prefix: &'static str, body: impl Into<String>) -> Self {
        Self {
            path_prefix,
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(path_prefix: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            ..Self::ok(path_prefix, body)
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Minimal one-request-per-connection HTTP server.
///
/// Requests are matched against `routes` by path prefix (first match wins,
/// 404 otherwise). The raw request head of every request is sent on the
/// returned channel.
#[allow(dead_code)]
pub async fn start_stub_server(
    routes: Vec<StubResponse>,
) -> (CoinGeckoSettings, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let routes = routes.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let _ = tx.send(head);

                let route = routes.iter().find(|r| path.starts_with(r.path_prefix));
                let (status, body, delay) = match route {
                    Some(r) => (r.status, r.body.clone(), r.delay),
                    None => (404, r#"{"error":"not found"}"#.to_string(), Duration::ZERO),
                };
                tokio::time::sleep(delay).await;

                let response = format!(
                    "HTTP/1.1 {} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    let settings = CoinGeckoSettings {
        base_url: format!("http://{}/api/v3", addr),
        api_key: Some("test-key".to_string()),
        ..CoinGeckoSettings::default()
    };

    (settings, rx)
}
