use quotefeed::aggregator::CandleUpdate;
use quotefeed::config::fetch_config;
use quotefeed::history::HttpHistoryProvider;
use quotefeed::websocket::WsConnector;
use quotefeed::{FeedError, StreamClient, StreamEvent};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), FeedError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;

    let mut symbols: Vec<String> = std::env::args().skip(1).collect();
    if symbols.is_empty() {
        symbols.push("RELIANCE-EQ".to_string());
    }

    let history = HttpHistoryProvider::from_config(&app_config.relay)?;
    let mut client = StreamClient::from_config(&app_config.relay, WsConnector);

    let mut subscriptions = Vec::new();
    for symbol in &symbols {
        subscriptions.push(client.subscribe(symbol, |tick| {
            info!(symbol = %tick.symbol, ltp = %tick.last_traded_price, "Quote");
        }));

        let chart = client
            .attach_chart(&history, symbol, app_config.chart.bucket_secs, |update| {
                let (kind, candle) = match update {
                    CandleUpdate::Opened(candle) => ("opened", candle),
                    CandleUpdate::Updated(candle) => ("updated", candle),
                };
                info!(
                    kind,
                    time = candle.bucket_start,
                    open = %candle.open,
                    high = %candle.high,
                    low = %candle.low,
                    close = %candle.close,
                    "Candle"
                );
            })
            .await;
        info!(symbol = %symbol, candles = chart.history.len(), "Chart attached");
        subscriptions.push(chart.subscription);
    }

    if let Err(e) = client.connect().await {
        warn!("Initial connect failed, retrying in the background: {e}");
    }

    loop {
        tokio::select! {
            event = client.pump() => {
                if event == StreamEvent::Idle {
                    warn!("Stream disconnected");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    for subscription in subscriptions {
        client.unsubscribe(subscription);
    }
    client.disconnect();

    Ok(())
}
