//! Integration tests for the quote stream against a local websocket server

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wingbot::models::Quote;
use wingbot::services::market_data::QuoteSource;
use wingbot::services::simplefx::{FeedConfig, FeedState, FnObserver, QuoteFeed, QuoteObserver};
use wingbot::services::websocket::QuoteFeedService;

/// Accepts one connection per entry in `sessions`: reads the subscription
/// requests, pushes the session's messages, then closes. The last session
/// stays open until the client goes away.
async fn quote_server(
    sessions: Vec<Vec<String>>,
    requests_per_session: usize,
) -> (String, mpsc::UnboundedReceiver<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let total = sessions.len();
        for (index, outgoing) in sessions.into_iter().enumerate() {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let mut ws = accept_async(stream).await.unwrap();

            let mut received = Vec::new();
            while received.len() < requests_per_session {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        received.push(serde_json::from_str::<Value>(&text).unwrap())
                    }
                    Some(Ok(_)) => continue,
                    _ => break,
                }
            }
            let _ = tx.send(received);

            for message in outgoing {
                ws.send(Message::Text(message)).await.unwrap();
            }

            if index + 1 == total {
                while let Some(Ok(_)) = ws.next().await {}
            } else {
                let _ = ws.close(None).await;
            }
        }
    });

    (format!("ws://{}", addr), rx)
}

fn quotes_message(path: &str, quotes: &[(&str, f64, f64)]) -> String {
    let data: Vec<Value> = quotes
        .iter()
        .map(|(s, b, a)| json!({ "s": s, "b": b, "a": a, "t": 1_700_000_000_000i64 }))
        .collect();
    json!({ "p": path, "d": data }).to_string()
}

fn feed(url: &str, symbols: &[&str]) -> Arc<QuoteFeed> {
    let mut config = FeedConfig::new(url, symbols.iter().map(|s| s.to_string()).collect());
    config.reconnect_delay = Duration::from_millis(50);
    Arc::new(QuoteFeed::new(config))
}

async fn wait_for_quote(feed: &QuoteFeed, symbol: &str, bid: f64) -> bool {
    for _ in 0..200 {
        if let Some(quote) = feed.get_quote(symbol).await {
            if (quote.bid - bid).abs() < 1e-9 {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn subscribes_every_symbol_and_applies_quotes() {
    let (url, mut requests) = quote_server(
        vec![vec![quotes_message(
            "/quotes/subscribed",
            &[("EURUSD", 1.1000, 1.1002), ("US100", 18000.0, 18000.5)],
        )]],
        4,
    )
    .await;

    let feed = feed(&url, &["EURUSD", "US100"]);
    let service = QuoteFeedService::new(feed.clone());
    service.start().await;
    assert!(service.wait_ready(Duration::from_secs(2)).await);

    let sent = requests.recv().await.unwrap();
    let paths: Vec<&str> = sent.iter().map(|r| r["p"].as_str().unwrap()).collect();
    assert_eq!(
        paths,
        vec![
            "/subscribe/addList",
            "/lastprices/list",
            "/subscribe/addList",
            "/lastprices/list"
        ]
    );
    assert_eq!(sent[0]["d"], json!(["EURUSD"]));
    assert_eq!(sent[2]["d"], json!(["US100"]));
    let ids: Vec<u64> = sent.iter().map(|r| r["i"].as_u64().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    assert!(wait_for_quote(&feed, "EURUSD", 1.1000).await);
    assert!(wait_for_quote(&feed, "US100", 18000.0).await);
    let quote = feed.get_quote("EURUSD").await.unwrap();
    assert!((quote.spread() - 0.0002).abs() < 1e-9);
    assert_eq!(quote.timestamp, 1_700_000_000_000);

    service.stop().await;
    assert_eq!(feed.state().await, FeedState::Disconnected);
    assert!(!service.is_running().await);
}

#[tokio::test]
async fn reconnects_and_resubscribes_after_server_drop() {
    let (url, mut requests) = quote_server(
        vec![
            vec![quotes_message("/quotes/subscribed", &[("EURUSD", 1.1000, 1.1002)])],
            vec![quotes_message("/quotes/subscribed", &[("EURUSD", 1.2000, 1.2002)])],
        ],
        2,
    )
    .await;

    let feed = feed(&url, &["EURUSD"]);
    let service = QuoteFeedService::new(feed.clone());
    service.start().await;

    let first = tokio::time::timeout(Duration::from_secs(2), requests.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(second[0]["p"], "/subscribe/addList");
    assert_eq!(second[0]["d"], json!(["EURUSD"]));

    assert!(wait_for_quote(&feed, "EURUSD", 1.2000).await);
    assert!(feed.wait_for_connection(Duration::from_secs(1)).await);

    service.stop().await;
}

#[tokio::test]
async fn unreachable_server_leaves_feed_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let feed = feed(&url, &["EURUSD"]);
    let service = QuoteFeedService::new(feed.clone());
    service.start().await;
    service.start().await;

    assert!(!service.wait_ready(Duration::from_millis(200)).await);
    assert!(feed.get_quote("EURUSD").await.is_none());
    service.stop().await;
}

#[tokio::test]
async fn apply_message_filters_paths_and_bad_entries() {
    let feed = feed("ws://127.0.0.1:1", &["EURUSD"]);

    let snapshot = quotes_message("/lastprices/list", &[("EURUSD", 1.1, 1.1002)]);
    assert_eq!(feed.apply_message(&snapshot).await, 1);

    let other = quotes_message("/subscribe/addList", &[("GBPUSD", 1.3, 1.3002)]);
    assert_eq!(feed.apply_message(&other).await, 0);
    assert!(feed.get_quote("GBPUSD").await.is_none());

    assert_eq!(feed.apply_message("not json").await, 0);

    let mixed = json!({
        "p": "/quotes/subscribed",
        "d": [ { "s": "USDJPY" }, { "s": "USDJPY", "b": 150.1, "a": 150.12 } ]
    })
    .to_string();
    assert_eq!(feed.apply_message(&mixed).await, 1);
    let quote = feed.get_quote("USDJPY").await.unwrap();
    assert!(quote.timestamp > 0);
}

#[tokio::test]
async fn observers_and_subscribers_see_every_update() {
    let feed = feed("ws://127.0.0.1:1", &["EURUSD"]);
    let mut events = feed.subscribe();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let observer = feed.add_observer(Arc::new(FnObserver(move |_quote: &Quote| {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    feed.apply_message(&quotes_message(
        "/quotes/subscribed",
        &[("EURUSD", 1.1, 1.1002), ("USDJPY", 150.0, 150.02)],
    ))
    .await;

    let first = events.recv().await.unwrap();
    assert_eq!(first.symbol, "EURUSD");
    assert_eq!(events.recv().await.unwrap().symbol, "USDJPY");

    for _ in 0..100 {
        if seen.load(Ordering::SeqCst) == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    observer.abort();
}

/// Forwards quotes into a bounded channel, waiting whenever it is full
struct ForwardingObserver(mpsc::Sender<Quote>);

#[async_trait]
impl QuoteObserver for ForwardingObserver {
    async fn on_quote(&self, quote: &Quote) {
        let _ = self.0.send(quote.clone()).await;
    }
}

#[tokio::test]
async fn async_observer_receives_quotes_in_order() {
    let feed = feed("ws://127.0.0.1:1", &["EURUSD"]);
    let (tx, mut rx) = mpsc::channel(1);
    let observer = feed.add_observer(Arc::new(ForwardingObserver(tx)));

    let updated = feed
        .apply_message(&quotes_message(
            "/quotes/subscribed",
            &[
                ("EURUSD", 1.1, 1.1002),
                ("USDJPY", 150.0, 150.02),
                ("US100", 18000.0, 18001.5),
            ],
        ))
        .await;
    assert_eq!(updated, 3);

    // The channel holds one quote, so the observer is parked in `send` until we read.
    let mut symbols = Vec::new();
    for _ in 0..3 {
        let quote = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        symbols.push(quote.symbol);
    }
    assert_eq!(symbols, ["EURUSD", "USDJPY", "US100"]);
    observer.abort();
}
