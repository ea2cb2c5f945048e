// =============================================================================
// MOEX ISS REST client
// =============================================================================
//
// Public, unauthenticated JSON endpoints:
//   candles   /iss/engines/stock/markets/{market}/securities/{sec}/candles.json
//   snapshot  /iss/engines/stock/markets/shares/boards/TQBR/securities/{sec}.json
//             /iss/engines/stock/markets/index/securities/{sec}.json
//
// Every ISS block is a column/data table; columns are looked up by name.
// Candle `begin` values are exchange-local wall-clock strings.
// Candle pages hold at most 500 rows and are walked with `start=`.
// =============================================================================

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::market_data::{Bar, MarketDataProvider};
use crate::types::Timeframe;

const ISS_BASE: &str = "https://iss.moex.com/iss";
const SHARES_BOARD: &str = "TQBR";
const CANDLE_PAGE_ROWS: usize = 500;
/// Upper bound on candle pages per request, about a year of H1 bars.
const MAX_CANDLE_PAGES: usize = 8;

#[derive(Clone)]
pub struct MoexClient {
    base_url: String,
    index_symbol: String,
    tz: Tz,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl MoexClient {
    /// `index_symbol` is routed to the index market; everything else is a
    /// share on the main board.
    pub fn new(index_symbol: impl Into<String>, tz: Tz, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build reqwest client");

        debug!("MoexClient initialised (base_url={ISS_BASE})");

        Self {
            base_url: ISS_BASE.to_string(),
            index_symbol: index_symbol.into(),
            tz,
            timeout_secs,
            client,
        }
    }

    /// Point the client at another ISS host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn is_index(&self, symbol: &str) -> bool {
        symbol.eq_ignore_ascii_case(&self.index_symbol)
    }

    fn market(&self, symbol: &str) -> &'static str {
        if self.is_index(symbol) {
            "index"
        } else {
            "shares"
        }
    }

    /// GET `url` and decode the JSON body.
    async fn get_json(&self, symbol: &str, url: &str) -> Result<Value, FetchError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    symbol: symbol.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                FetchError::Transport {
                    symbol: symbol.to_string(),
                    source: e,
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        resp.json::<Value>().await.map_err(|e| FetchError::Malformed {
            symbol: symbol.to_string(),
            detail: format!("body is not JSON: {e}"),
        })
    }

    /// Candles for `symbol` starting at local date `from`, oldest first.
    #[instrument(skip(self), name = "moex::fetch_candles")]
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from: NaiveDate,
    ) -> Result<Vec<Bar>, FetchError> {
        let mut bars = Vec::new();
        // Offsets count raw rows, including rows dropped while parsing.
        let mut start = 0;
        for page in 0..MAX_CANDLE_PAGES {
            let url = format!(
                "{}/engines/stock/markets/{}/securities/{}/candles.json?interval={}&from={}&start={}&iss.meta=off",
                self.base_url,
                self.market(symbol),
                symbol,
                timeframe.iss_interval(),
                from.format("%Y-%m-%d"),
                start,
            );
            let body = self.get_json(symbol, &url).await?;
            let page_rows = parse_candles(symbol, &body, self.tz)?;
            start += page_rows.rows;
            bars.extend(page_rows.bars);
            if page_rows.rows < CANDLE_PAGE_ROWS {
                break;
            }
            if page + 1 == MAX_CANDLE_PAGES {
                warn!(symbol, %timeframe, rows = start, "candle page limit reached");
            }
        }

        debug!(symbol, %timeframe, count = bars.len(), "candles fetched");
        Ok(bars)
    }

    /// Last trade (or current index value).
    #[instrument(skip(self), name = "moex::fetch_last_price")]
    pub async fn fetch_last_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let url = if self.is_index(symbol) {
            format!(
                "{}/engines/stock/markets/index/securities/{}.json?iss.meta=off&iss.only=marketdata",
                self.base_url, symbol
            )
        } else {
            format!(
                "{}/engines/stock/markets/shares/boards/{}/securities/{}.json?iss.meta=off&iss.only=marketdata",
                self.base_url, SHARES_BOARD, symbol
            )
        };
        let body = self.get_json(symbol, &url).await?;
        parse_last_price(symbol, &body)
    }
}

#[async_trait]
impl MarketDataProvider for MoexClient {
    async fn get_bars(&self, symbol: &str, timeframe: Timeframe, lookback_days: u32) -> Vec<Bar> {
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        let from = today - chrono::Duration::days(i64::from(lookback_days));
        match self.fetch_candles(symbol, timeframe, from).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol, %timeframe, error = %e, transient = e.is_transient(), "candle fetch failed");
                Vec::new()
            }
        }
    }

    async fn get_last_price(&self, symbol: &str) -> Option<f64> {
        match self.fetch_last_price(symbol).await {
            Ok(price) => Some(price),
            Err(e) => {
                debug!(symbol, error = %e, "last price unavailable");
                None
            }
        }
    }
}

impl std::fmt::Debug for MoexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoexClient")
            .field("base_url", &self.base_url)
            .field("index_symbol", &self.index_symbol)
            .field("tz", &self.tz)
            .finish()
    }
}

// =============================================================================
// Response parsing
// =============================================================================

/// An ISS column/data block.
struct IssTable<'a> {
    columns: Vec<&'a str>,
    rows: &'a [Value],
}

impl<'a> IssTable<'a> {
    fn from_block(symbol: &str, body: &'a Value, block: &str) -> Result<Self, FetchError> {
        let malformed = |detail: String| FetchError::Malformed {
            symbol: symbol.to_string(),
            detail,
        };
        let block_value = body
            .get(block)
            .ok_or_else(|| malformed(format!("missing '{block}' block")))?;
        let columns = block_value["columns"]
            .as_array()
            .ok_or_else(|| malformed(format!("'{block}' has no columns")))?
            .iter()
            .map(|c| c.as_str().unwrap_or_default())
            .collect();
        let rows = block_value["data"]
            .as_array()
            .ok_or_else(|| malformed(format!("'{block}' has no data")))?;
        Ok(Self {
            columns,
            rows: rows.as_slice(),
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    fn require(&self, symbol: &str, name: &str) -> Result<usize, FetchError> {
        self.column(name).ok_or_else(|| FetchError::Malformed {
            symbol: symbol.to_string(),
            detail: format!("missing column '{name}'"),
        })
    }
}

/// A numeric cell; ISS sends numbers, but strings are tolerated.
fn cell_f64(val: &Value) -> Option<f64> {
    match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// One page of candles: the usable bars and the number of rows served.
#[derive(Debug)]
struct CandlePage {
    bars: Vec<Bar>,
    rows: usize,
}

fn parse_candles(symbol: &str, body: &Value, tz: Tz) -> Result<CandlePage, FetchError> {
    let table = IssTable::from_block(symbol, body, "candles")?;
    let open = table.require(symbol, "open")?;
    let high = table.require(symbol, "high")?;
    let low = table.require(symbol, "low")?;
    let close = table.require(symbol, "close")?;
    let volume = table.require(symbol, "volume")?;
    let begin = table.require(symbol, "begin")?;

    let mut bars = Vec::with_capacity(table.rows.len());
    for row in table.rows {
        let Some(cells) = row.as_array() else {
            continue;
        };
        let cell = |i: usize| cells.get(i).and_then(cell_f64);
        let open_time = cells
            .get(begin)
            .and_then(Value::as_str)
            .and_then(|s| local_millis(s, tz));

        match (open_time, cell(open), cell(high), cell(low), cell(close), cell(volume)) {
            (Some(t), Some(o), Some(h), Some(l), Some(c), Some(v)) => {
                bars.push(Bar::new(t, o, h, l, c, v));
            }
            _ => debug!(symbol, row = %row, "skipping incomplete candle row"),
        }
    }
    Ok(CandlePage {
        bars,
        rows: table.rows.len(),
    })
}

/// Milliseconds since the epoch for an exchange-local "YYYY-MM-DD HH:MM:SS".
fn local_millis(raw: &str, tz: Tz) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

fn parse_last_price(symbol: &str, body: &Value) -> Result<f64, FetchError> {
    let table = IssTable::from_block(symbol, body, "marketdata")?;
    let candidates: Vec<usize> = ["LAST", "CURRENTVALUE", "LASTVALUE"]
        .iter()
        .filter_map(|name| table.column(name))
        .collect();
    if candidates.is_empty() {
        return Err(FetchError::Malformed {
            symbol: symbol.to_string(),
            detail: "marketdata has no price column".to_string(),
        });
    }

    table
        .rows
        .iter()
        .filter_map(Value::as_array)
        .flat_map(|cells| candidates.iter().filter_map(|i| cells.get(*i).and_then(cell_f64)))
        .find(|p| *p > 0.0)
        .ok_or_else(|| FetchError::NoPrice {
            symbol: symbol.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Moscow;
    use serde_json::json;

    fn candles_body() -> Value {
        json!({
            "candles": {
                "columns": ["open", "close", "high", "low", "value", "volume", "begin", "end"],
                "data": [
                    [300.1, 301.0, 301.5, 299.8, 1.2e9, 4_000_000, "2024-03-12 10:00:00", "2024-03-12 10:59:59"],
                    [301.0, 300.2, 301.2, 300.0, 9.0e8, 3_000_000, "2024-03-12 11:00:00", "2024-03-12 11:59:59"],
                    [null, 300.2, 301.2, 300.0, 9.0e8, 3_000_000, "2024-03-12 12:00:00", "2024-03-12 12:59:59"]
                ]
            }
        })
    }

    #[test]
    fn candles_are_parsed_by_column_name() {
        let page = parse_candles("SBER", &candles_body(), Moscow).unwrap();
        assert_eq!(page.rows, 3);
        let bars = page.bars;
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 300.1);
        assert_eq!(bars[0].close, 301.0);
        assert_eq!(bars[0].high, 301.5);
        assert_eq!(bars[0].low, 299.8);
        assert_eq!(bars[0].volume, 4_000_000.0);
        // 10:00 MSK is 07:00 UTC.
        let expected = Utc.with_ymd_and_hms(2024, 3, 12, 7, 0, 0).unwrap().timestamp_millis();
        assert_eq!(bars[0].open_time, expected);
        assert_eq!(bars[1].open_time - bars[0].open_time, 3_600_000);
    }

    /// `n` hourly candle rows starting `first` hours after 2024-01-01 00:00.
    fn hourly_rows(first: usize, n: usize) -> Vec<Value> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        (first..first + n)
            .map(|h| {
                let begin = base + chrono::Duration::hours(h as i64);
                json!([100.0, 100.5, 101.0, 99.5, 1.0e6, 10_000, begin.format("%Y-%m-%d %H:%M:%S").to_string()])
            })
            .collect()
    }

    fn candle_page(rows: Vec<Value>) -> String {
        json!({
            "candles": {
                "columns": ["open", "close", "high", "low", "value", "volume", "begin"],
                "data": rows
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn pages_advance_by_rows_served_not_bars_kept() {
        let mut server = mockito::Server::new_async().await;
        let path = "/engines/stock/markets/shares/securities/SBER/candles.json";

        let mut first = hourly_rows(0, CANDLE_PAGE_ROWS);
        first[0][0] = Value::Null;
        let page_one = server
            .mock("GET", path)
            .match_query(mockito::Matcher::UrlEncoded("start".into(), "0".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(candle_page(first))
            .create_async()
            .await;
        let page_two = server
            .mock("GET", path)
            .match_query(mockito::Matcher::UrlEncoded("start".into(), "500".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(candle_page(hourly_rows(CANDLE_PAGE_ROWS, 200)))
            .create_async()
            .await;

        let client = MoexClient::new("IMOEX", Moscow, 5).with_base_url(server.url());
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = client.fetch_candles("SBER", Timeframe::H1, from).await.unwrap();

        assert_eq!(bars.len(), 699);
        assert_eq!(bars[0].open_time, local_millis("2024-01-01 01:00:00", Moscow).unwrap());
        assert_eq!(bars[698].open_time, local_millis("2024-01-30 03:00:00", Moscow).unwrap());
        page_one.assert_async().await;
        page_two.assert_async().await;
    }

    #[test]
    fn missing_column_is_malformed() {
        let body = json!({ "candles": { "columns": ["open", "close"], "data": [] } });
        let err = parse_candles("SBER", &body, Moscow).unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
        assert!(err.to_string().contains("high"));

        let err = parse_candles("SBER", &json!({}), Moscow).unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }

    #[test]
    fn share_last_price() {
        let body = json!({
            "marketdata": {
                "columns": ["SECID", "BOARDID", "LAST", "VALTODAY"],
                "data": [["SBER", "TQBR", 301.45, 1.0e10]]
            }
        });
        assert_eq!(parse_last_price("SBER", &body).unwrap(), 301.45);
    }

    #[test]
    fn index_falls_back_to_current_value() {
        let body = json!({
            "marketdata": {
                "columns": ["SECID", "BOARDID", "LASTVALUE", "CURRENTVALUE"],
                "data": [["IMOEX", "SNDX", null, 3250.7]]
            }
        });
        assert_eq!(parse_last_price("IMOEX", &body).unwrap(), 3250.7);
    }

    #[test]
    fn empty_or_zero_price_is_no_price() {
        let body = json!({
            "marketdata": { "columns": ["LAST"], "data": [[null], [0]] }
        });
        assert!(matches!(
            parse_last_price("SBER", &body),
            Err(FetchError::NoPrice { .. })
        ));
    }

    #[test]
    fn string_cells_are_tolerated() {
        assert_eq!(cell_f64(&json!("12.5")), Some(12.5));
        assert_eq!(cell_f64(&json!(7)), Some(7.0));
        assert_eq!(cell_f64(&Value::Null), None);
    }
}
