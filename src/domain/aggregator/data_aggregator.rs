//! Data aggregator - cache, upstream and fallback behind one call

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use tracing::{debug, info, warn};

use super::AggregatorConfig;
use crate::domain::cache::{entry_key, CacheStore, SetOptions};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::fallback::FallbackStore;
use crate::domain::market::{DataSource, DataType, MarketDataSource, Quote};
use crate::domain::retry::with_retry;
use crate::domain::ttl::TtlPolicy;

/// Result of asking the upstream for a set of symbols
#[derive(Debug, Default)]
struct FetchOutcome {
    quotes: HashMap<String, Quote>,
    /// Symbols the upstream could not provide, with the last error
    failures: Vec<(String, String)>,
}

/// Serves quotes for one data type.
///
/// Every requested symbol gets exactly one entry in the result: live or
/// cached data, the last known-good value tagged as fallback data, or an
/// unavailable placeholder carrying the error.
pub struct DataAggregator {
    data_type: DataType,
    source: Arc<dyn MarketDataSource>,
    cache: Arc<CacheStore>,
    fallback: Arc<FallbackStore>,
    ttl_policy: TtlPolicy,
    clock: Arc<dyn Clock>,
    config: AggregatorConfig,
}

impl fmt::Debug for DataAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAggregator")
            .field("data_type", &self.data_type)
            .field("source", &"<MarketDataSource>")
            .field("config", &self.config)
            .finish()
    }
}

impl DataAggregator {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: Arc<CacheStore>,
        fallback: Arc<FallbackStore>,
        config: AggregatorConfig,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Self {
            data_type: source.data_type(),
            source,
            cache,
            fallback,
            ttl_policy: TtlPolicy::new(clock.clone()),
            clock,
            config,
        }
    }

    /// Replaces the clock used for TTL classification and timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ttl_policy = TtlPolicy::new(clock.clone());
        self.clock = clock;
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Quotes for `symbols`, keyed by symbol.
    ///
    /// With `force_refresh` the cache is not consulted, though fresh
    /// results are still written back. Duplicate symbols collapse into a
    /// single entry. Never fails.
    pub async fn get_data(&self, symbols: &[String], force_refresh: bool) -> HashMap<String, Quote> {
        let symbols = unique_symbols(symbols);
        let mut results = HashMap::with_capacity(symbols.len());

        if symbols.is_empty() {
            return results;
        }

        let misses = if force_refresh {
            symbols
        } else {
            self.check_cache(&symbols, &mut results).await
        };

        if misses.is_empty() {
            debug!(data_type = %self.data_type, "All symbols served from cache");
            return results;
        }

        let FetchOutcome { quotes, failures } = self.fetch(&misses).await;

        join_all(quotes.iter().map(|(symbol, quote)| self.commit(symbol, quote))).await;
        results.extend(quotes);

        let degraded = join_all(failures.into_iter().map(|(symbol, error)| async move {
            let quote = self.degrade(&symbol, &error).await;
            (symbol, quote)
        }))
        .await;
        results.extend(degraded);

        results
    }

    /// Fills `results` with cache hits and returns the misses.
    ///
    /// Cache read errors and unreadable payloads count as misses.
    async fn check_cache(&self, symbols: &[String], results: &mut HashMap<String, Quote>) -> Vec<String> {
        let lookups = join_all(symbols.iter().map(|symbol| async move {
            let key = entry_key(self.data_type, symbol);
            (symbol, self.cache.get(&key).await)
        }))
        .await;

        let mut misses = Vec::new();

        for (symbol, lookup) in lookups {
            match lookup {
                Ok(Some(cached)) => match serde_json::from_value::<Quote>(cached.data) {
                    Ok(quote) => {
                        results.insert(symbol.clone(), quote);
                    }
                    Err(e) => {
                        warn!(
                            symbol = %symbol,
                            data_type = %self.data_type,
                            error = %e,
                            "Cached payload is unreadable, refetching"
                        );
                        misses.push(symbol.clone());
                    }
                },
                Ok(None) => misses.push(symbol.clone()),
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        data_type = %self.data_type,
                        error = %e,
                        "Cache read failed, treating as miss"
                    );
                    misses.push(symbol.clone());
                }
            }
        }

        let hits = (symbols.len() - misses.len()) as u64;
        counter!("market_data_cache_hits_total", "data_type" => self.data_type.as_str()).increment(hits);
        counter!("market_data_cache_misses_total", "data_type" => self.data_type.as_str())
            .increment(misses.len() as u64);

        debug!(
            data_type = %self.data_type,
            hits,
            misses = misses.len(),
            "Checked cache"
        );

        misses
    }

    /// Batch fetch first, then one call per symbol the batch did not cover
    async fn fetch(&self, symbols: &[String]) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        let mut pending = Vec::new();

        match with_retry(&self.config.fetch_retry, || self.source.fetch_batch(symbols)).await {
            Ok(mut batch) => {
                for symbol in symbols {
                    match batch.remove(symbol).flatten() {
                        Some(quote) => {
                            outcome.quotes.insert(symbol.clone(), self.live(symbol, quote));
                        }
                        None => pending.push(symbol.clone()),
                    }
                }
            }
            Err(e) => {
                warn!(
                    data_type = %self.data_type,
                    symbols = symbols.len(),
                    error = %e,
                    "Batch fetch failed, fetching symbols individually"
                );
                pending = symbols.to_vec();
            }
        }

        if pending.is_empty() {
            return outcome;
        }

        let individual = join_all(pending.into_iter().map(|symbol| async move {
            let result = with_retry(&self.config.fetch_retry, || self.source.fetch_one(&symbol)).await;
            (symbol, result)
        }))
        .await;

        for (symbol, result) in individual {
            match result {
                Ok(quote) => {
                    let quote = self.live(&symbol, quote);
                    outcome.quotes.insert(symbol, quote);
                }
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        data_type = %self.data_type,
                        error = %e,
                        "Fetch failed after retries"
                    );
                    outcome.failures.push((symbol, e.to_string()));
                }
            }
        }

        outcome
    }

    /// Normalizes an upstream quote before it is cached or returned
    fn live(&self, symbol: &str, mut quote: Quote) -> Quote {
        quote.source = DataSource::Api;
        quote.error = None;

        if quote.ticker.is_empty() {
            quote.ticker = symbol.to_string();
        }
        if quote.currency.is_empty() {
            quote.currency = self.data_type.default_currency().to_string();
        }

        quote
    }

    /// Caches a fresh quote and hands it to the fallback store.
    ///
    /// Cache write failures are logged; the caller still gets the data.
    async fn commit(&self, symbol: &str, quote: &Quote) {
        let payload = match serde_json::to_value(quote) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to serialize quote");
                return;
            }
        };

        let (base_ttl, volatility) = self.ttl_policy.compute_dynamic_ttl(
            symbol,
            self.data_type,
            &payload,
            self.config.base_ttl,
        );
        let ttl = self.config.multipliers.apply(base_ttl, volatility);

        let key = entry_key(self.data_type, symbol);
        let mut options = SetOptions::new().with_volatility(volatility);
        if self.config.use_differential {
            options = options.differential(key.clone());
        }

        match self.cache.set(&key, payload.clone(), ttl, options).await {
            Ok(()) => debug!(
                key = %key,
                ttl_secs = ttl.as_secs(),
                volatility = %volatility,
                "Cached fresh quote"
            ),
            Err(e) => warn!(key = %key, error = %e, "Failed to cache fresh quote"),
        }

        self.fallback
            .record_success(symbol, self.data_type, payload)
            .await;
    }

    /// Last known-good value for a failed symbol, or a placeholder
    async fn degrade(&self, symbol: &str, error: &str) -> Quote {
        counter!("market_data_fetch_failures_total", "data_type" => self.data_type.as_str()).increment(1);

        self.fallback
            .record_failed_fetch(symbol, self.data_type, error)
            .await;

        let now = self.clock.now();

        if let Some(payload) = self.fallback.get_fallback_for_symbol(symbol, self.data_type).await {
            match serde_json::from_value::<Quote>(payload) {
                Ok(quote) => {
                    info!(
                        symbol = %symbol,
                        data_type = %self.data_type,
                        "Serving fallback data"
                    );
                    counter!("market_data_fallback_served_total", "data_type" => self.data_type.as_str())
                        .increment(1);
                    return quote.into_fallback(now);
                }
                Err(e) => warn!(
                    symbol = %symbol,
                    data_type = %self.data_type,
                    error = %e,
                    "Fallback payload is unreadable"
                ),
            }
        }

        Quote::unavailable(symbol, self.data_type, format!("No data available: {}", error), now)
    }
}

/// Trimmed, non-empty symbols in first-seen order
fn unique_symbols(symbols: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();

    symbols
        .iter()
        .map(|symbol| symbol.trim())
        .filter(|symbol| !symbol.is_empty() && seen.insert(symbol.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheRecord, MockCacheBackend, MockOp, Volatility};
    use crate::domain::clock::ManualClock;
    use crate::domain::fallback::{FallbackRecord, FallbackRepository};
    use crate::domain::market::MockMarketDataSource;
    use crate::domain::retry::{RetrySettings, SequenceJitter};
    use crate::domain::DomainError;
    use crate::infrastructure::fallback::InMemoryFallbackRepository;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Upstream double answering from fixed tables
    #[derive(Default)]
    struct ScriptedSource {
        batch_error: Option<DomainError>,
        batch: HashMap<String, Quote>,
        single: HashMap<String, Quote>,
        single_errors: HashMap<String, DomainError>,
        batch_calls: AtomicUsize,
        single_calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn with_batch_quote(mut self, quote: Quote) -> Self {
            self.batch.insert(quote.ticker.clone(), quote);
            self
        }

        fn with_batch_error(mut self, error: DomainError) -> Self {
            self.batch_error = Some(error);
            self
        }

        fn with_single_quote(mut self, quote: Quote) -> Self {
            self.single.insert(quote.ticker.clone(), quote);
            self
        }

        fn with_single_error(mut self, symbol: &str, error: DomainError) -> Self {
            self.single_errors.insert(symbol.to_string(), error);
            self
        }

        fn batch_calls(&self) -> usize {
            self.batch_calls.load(Ordering::SeqCst)
        }

        fn single_calls(&self) -> Vec<String> {
            self.single_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        fn data_type(&self) -> DataType {
            DataType::UsStock
        }

        async fn fetch_batch(
            &self,
            symbols: &[String],
        ) -> Result<HashMap<String, Option<Quote>>, DomainError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(error) = &self.batch_error {
                return Err(error.clone());
            }

            Ok(symbols
                .iter()
                .map(|symbol| (symbol.clone(), self.batch.get(symbol).cloned()))
                .collect())
        }

        async fn fetch_one(&self, symbol: &str) -> Result<Quote, DomainError> {
            self.single_calls.lock().unwrap().push(symbol.to_string());

            if let Some(error) = self.single_errors.get(symbol) {
                return Err(error.clone());
            }

            self.single
                .get(symbol)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("Symbol '{}' not found", symbol)))
        }
    }

    struct Harness {
        aggregator: DataAggregator,
        backend: Arc<MockCacheBackend>,
        fallback_repo: Arc<InMemoryFallbackRepository>,
        clock: Arc<ManualClock>,
    }

    fn tuesday_afternoon() -> chrono::DateTime<Utc> {
        // 15:00 UTC is inside New York trading hours
        Utc.with_ymd_and_hms(2024, 6, 4, 15, 0, 0).unwrap()
    }

    fn fast_retry() -> crate::domain::retry::RetryPolicy {
        RetrySettings::new(1, 1, 2)
            .to_policy()
            .with_jitter(Arc::new(SequenceJitter::constant(0.0)))
    }

    fn harness(source: Arc<dyn MarketDataSource>, backend: MockCacheBackend) -> Harness {
        let clock = Arc::new(ManualClock::new(tuesday_afternoon()));
        let backend = Arc::new(backend);
        let fallback_repo = Arc::new(InMemoryFallbackRepository::new());

        let cache = CacheStore::new(backend.clone())
            .with_clock(clock.clone())
            .with_retry_policy(fast_retry());
        let fallback = FallbackStore::new(fallback_repo.clone()).with_clock(clock.clone());
        let config = AggregatorConfig::for_data_type(DataType::UsStock).with_fetch_retry(fast_retry());

        let aggregator = DataAggregator::new(source, Arc::new(cache), Arc::new(fallback), config)
            .with_clock(clock.clone());

        Harness {
            aggregator,
            backend,
            fallback_repo,
            clock,
        }
    }

    fn quote(ticker: &str, price: f64, change_percent: f64) -> Quote {
        Quote::new(ticker, price, "USD")
            .with_change(price * change_percent / 100.0, change_percent)
            .with_last_updated(tuesday_afternoon())
    }

    fn symbols(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_every_symbol_gets_an_entry() {
        let source = ScriptedSource::default()
            .with_batch_error(DomainError::http(503, "upstream down"))
            .with_single_quote(quote("AAPL", 190.0, 0.4))
            .with_single_error("MSFT", DomainError::http(503, "upstream down"))
            .with_single_error("ZZZZ", DomainError::not_found("unknown symbol"));
        let h = harness(Arc::new(source), MockCacheBackend::new());

        let mut known_good = FallbackRecord::new("MSFT", DataType::UsStock, tuesday_afternoon());
        known_good.data = Some(serde_json::to_value(quote("MSFT", 410.0, 0.2)).unwrap());
        h.fallback_repo.put(known_good).await.unwrap();

        let results = h
            .aggregator
            .get_data(&symbols(&["AAPL", "MSFT", "ZZZZ"]), false)
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["AAPL"].source, DataSource::Api);
        assert_eq!(results["AAPL"].price, Some(190.0));

        assert_eq!(results["MSFT"].source, DataSource::Fallback);
        assert_eq!(results["MSFT"].price, Some(410.0));
        assert!(results["MSFT"].error.is_none());

        assert_eq!(results["ZZZZ"].source, DataSource::Unavailable);
        assert!(results["ZZZZ"].price.is_none());
        assert!(results["ZZZZ"].error.as_deref().unwrap().contains("unknown symbol"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_upstream() {
        let source = Arc::new(ScriptedSource::default().with_batch_quote(quote("AAPL", 190.0, 0.4)));
        let h = harness(source.clone(), MockCacheBackend::new());

        let first = h.aggregator.get_data(&symbols(&["AAPL"]), false).await;
        let second = h.aggregator.get_data(&symbols(&["AAPL"]), false).await;

        assert_eq!(source.batch_calls(), 1);
        assert_eq!(first["AAPL"], second["AAPL"]);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let source = Arc::new(ScriptedSource::default().with_batch_quote(quote("AAPL", 190.0, 0.4)));
        let h = harness(source.clone(), MockCacheBackend::new());

        h.aggregator.get_data(&symbols(&["AAPL"]), false).await;
        h.aggregator.get_data(&symbols(&["AAPL"]), true).await;

        assert_eq!(source.batch_calls(), 2);
        assert!(h.backend.record("us-stock:AAPL").is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let source = Arc::new(ScriptedSource::default().with_batch_quote(quote("AAPL", 190.0, 0.4)));
        let h = harness(source.clone(), MockCacheBackend::new());

        h.aggregator.get_data(&symbols(&["AAPL"]), false).await;
        h.clock.advance(chrono::Duration::hours(1));
        h.aggregator.get_data(&symbols(&["AAPL"]), false).await;

        assert_eq!(source.batch_calls(), 2);
    }

    #[tokio::test]
    async fn test_batch_gaps_are_fetched_individually() {
        let source = Arc::new(
            ScriptedSource::default()
                .with_batch_quote(quote("AAPL", 190.0, 0.4))
                .with_single_quote(quote("MSFT", 410.0, 0.2)),
        );
        let h = harness(source.clone(), MockCacheBackend::new());

        let results = h.aggregator.get_data(&symbols(&["AAPL", "MSFT"]), false).await;

        assert_eq!(source.single_calls(), vec!["MSFT".to_string()]);
        assert_eq!(results["MSFT"].source, DataSource::Api);
        assert_eq!(results["AAPL"].source, DataSource::Api);
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_to_single_fetches() {
        let source = Arc::new(
            ScriptedSource::default()
                .with_batch_error(DomainError::network("connection reset"))
                .with_single_quote(quote("AAPL", 190.0, 0.4))
                .with_single_quote(quote("MSFT", 410.0, 0.2)),
        );
        let h = harness(source.clone(), MockCacheBackend::new());

        let results = h.aggregator.get_data(&symbols(&["AAPL", "MSFT"]), false).await;

        // one retry on the batch, then both symbols individually
        assert_eq!(source.batch_calls(), 2);
        assert_eq!(source.single_calls().len(), 2);
        assert!(results.values().all(|q| q.source == DataSource::Api));
    }

    #[tokio::test]
    async fn test_duplicate_symbols_collapse() {
        let source = Arc::new(ScriptedSource::default().with_batch_quote(quote("AAPL", 190.0, 0.4)));
        let h = harness(source, MockCacheBackend::new());

        let results = h
            .aggregator
            .get_data(&symbols(&["AAPL", " AAPL", "AAPL", ""]), false)
            .await;

        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_request() {
        let source = Arc::new(ScriptedSource::default());
        let h = harness(source.clone(), MockCacheBackend::new());

        assert!(h.aggregator.get_data(&[], false).await.is_empty());
        assert_eq!(source.batch_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_failures_do_not_block_fresh_data() {
        let backend = MockCacheBackend::new()
            .with_error(MockOp::Get, DomainError::cache("redis down"))
            .with_error(MockOp::Put, DomainError::cache("redis down"));
        let source = Arc::new(ScriptedSource::default().with_batch_quote(quote("AAPL", 190.0, 0.4)));
        let h = harness(source, backend);

        let results = h.aggregator.get_data(&symbols(&["AAPL"]), false).await;

        assert_eq!(results["AAPL"].source, DataSource::Api);
        assert_eq!(results["AAPL"].price, Some(190.0));
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_is_a_miss() {
        let now = tuesday_afternoon().timestamp();
        let backend = MockCacheBackend::new().with_record(CacheRecord::full(
            "us-stock:AAPL",
            json!("not a quote"),
            now + 300,
            Volatility::Medium,
            tuesday_afternoon(),
        ));
        let source = Arc::new(ScriptedSource::default().with_batch_quote(quote("AAPL", 190.0, 0.4)));
        let h = harness(source.clone(), backend);

        let results = h.aggregator.get_data(&symbols(&["AAPL"]), false).await;

        assert_eq!(source.batch_calls(), 1);
        assert_eq!(results["AAPL"].price, Some(190.0));
    }

    #[tokio::test]
    async fn test_ttl_follows_volatility() {
        let source = Arc::new(
            ScriptedSource::default()
                .with_batch_quote(quote("TSLA", 180.0, 7.5))
                .with_batch_quote(quote("KO", 60.0, 0.1)),
        );
        let h = harness(source, MockCacheBackend::new());
        let now = tuesday_afternoon().timestamp();

        h.aggregator.get_data(&symbols(&["TSLA", "KO"]), false).await;

        let volatile = h.backend.record("us-stock:TSLA").unwrap();
        assert_eq!(volatile.volatility, Volatility::High);
        assert_eq!(volatile.ttl - now, 150);

        let calm = h.backend.record("us-stock:KO").unwrap();
        assert_eq!(calm.volatility, Volatility::Low);
        assert_eq!(calm.ttl - now, 450);
    }

    #[tokio::test]
    async fn test_success_is_remembered_for_fallback() {
        let source = Arc::new(ScriptedSource::default().with_batch_quote(quote("AAPL", 190.0, 0.4)));
        let h = harness(source, MockCacheBackend::new());

        h.aggregator.get_data(&symbols(&["AAPL"]), false).await;

        let record = h
            .fallback_repo
            .get("AAPL", DataType::UsStock)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.data.unwrap()["price"], json!(190.0));
    }

    #[tokio::test]
    async fn test_failure_is_counted() {
        let source = Arc::new(
            ScriptedSource::default()
                .with_batch_error(DomainError::http(500, "boom"))
                .with_single_error("AAPL", DomainError::http(500, "boom")),
        );
        let h = harness(source, MockCacheBackend::new());

        let results = h.aggregator.get_data(&symbols(&["AAPL"]), false).await;

        assert_eq!(results["AAPL"].source, DataSource::Unavailable);
        let record = h
            .fallback_repo
            .get("AAPL", DataType::UsStock)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.failure_count, 1);
        assert!(record.last_error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_failure_is_recorded_before_serving_fallback() {
        let source = Arc::new(
            ScriptedSource::default()
                .with_batch_error(DomainError::network("reset"))
                .with_single_error("AAPL", DomainError::network("reset")),
        );
        let h = harness(source, MockCacheBackend::new());

        let mut known_good = FallbackRecord::new("AAPL", DataType::UsStock, tuesday_afternoon());
        known_good.data = Some(serde_json::to_value(quote("AAPL", 188.0, 0.2)).unwrap());
        h.fallback_repo.put(known_good).await.unwrap();

        let results = h.aggregator.get_data(&symbols(&["AAPL"]), false).await;

        assert_eq!(results["AAPL"].source, DataSource::Fallback);
        assert_eq!(results["AAPL"].price, Some(188.0));

        let record = h
            .fallback_repo
            .get("AAPL", DataType::UsStock)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.failure_count, 1);
        assert!(record.data.is_some());
    }

    #[tokio::test]
    async fn test_full_batch_never_calls_fetch_one() {
        let mut source = MockMarketDataSource::new();
        source.expect_data_type().return_const(DataType::UsStock);
        source.expect_fetch_batch().times(1).returning(|symbols| {
            Ok(symbols
                .iter()
                .map(|s| (s.clone(), Some(quote(s, 100.0, 1.5))))
                .collect())
        });
        source.expect_fetch_one().times(0);

        let h = harness(Arc::new(source), MockCacheBackend::new());
        let results = h.aggregator.get_data(&symbols(&["AAPL", "MSFT"]), false).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results["MSFT"].ticker, "MSFT");
    }
}
