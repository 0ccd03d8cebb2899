use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::analysis::sentiment::MarketSentimentAggregator;
use crate::analysis::{Direction, SignalSource};
use crate::backtest::metrics::BacktestResult;
use crate::backtest::trade::{Trade, TradeDirection, TradeStatus};
use crate::config::debug::PRINT_TRADE_EVENTS;
use crate::config::{BacktestConfig, DEFAULT_TIMEFRAME};
use crate::data::TimeSeriesCollection;
use crate::models::TimeSeriesSlice;
use crate::utils::{epoch_ms_to_datetime, epoch_ms_to_utc};

/// Replays a collection bar by bar, trading the actionable signals of a
/// `SignalSource`.
///
/// Bars are the timestamps shared by every non-empty series. Within a bar the
/// order is fixed: stop / take-profit exits, then signals, then the equity mark.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
    timeframe: String,
    sentiment: Option<MarketSentimentAggregator>,
}

impl Default for BacktestEngine {
    fn default() -> Self {
        Self::new(BacktestConfig::default())
    }
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            sentiment: None,
        }
    }

    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = timeframe.into();
        self
    }

    /// Aggregate a sentiment snapshot per bar and pass it to the signal source.
    pub fn with_sentiment(mut self, aggregator: MarketSentimentAggregator) -> Self {
        self.sentiment = Some(aggregator);
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run<S: SignalSource>(
        &self,
        data: &TimeSeriesCollection,
        source: &mut S,
    ) -> BacktestResult {
        let mut run = RunState::new(&self.config);

        if data.is_empty() {
            log::warn!("No historical data provided");
            return run.finish();
        }
        let timestamps = data.common_timestamps();
        let Some(&last_ts) = timestamps.last() else {
            log::warn!("No aligned timestamps found");
            return run.finish();
        };

        log::info!(
            "Running backtest with {} bars over {} symbols ({} to {})",
            timestamps.len(),
            data.series_data.len(),
            epoch_ms_to_utc(timestamps[0]),
            epoch_ms_to_utc(last_ts)
        );

        for &ts in &timestamps {
            let bar_time = epoch_ms_to_datetime(ts);
            let current = data.slices_up_to(ts);

            run.check_exits(&current, bar_time);

            source.update_correlations(&current);
            let sentiment = self
                .sentiment
                .as_ref()
                .filter(|aggregator| aggregator.settings().enabled)
                .map(|aggregator| aggregator.aggregate_at(&current, bar_time));
            let signals =
                source.analyze_batch_at(&current, &self.timeframe, sentiment.as_ref(), bar_time);

            // Collection order decides who gets the remaining open-trade slots
            for slice in &current {
                let symbol = slice.symbol();
                if let Some(direction) = signals.get(symbol).and_then(|r| r.actionable_direction()) {
                    run.process_signal(symbol, direction, &current, bar_time);
                }
            }

            run.mark_to_market(&current);
        }

        run.close_all(data, epoch_ms_to_datetime(last_ts));
        run.finish()
    }
}

fn find_slice<'s, 'a>(
    current: &'s [TimeSeriesSlice<'a>],
    symbol: &str,
) -> Option<&'s TimeSeriesSlice<'a>> {
    current.iter().find(|s| s.symbol() == symbol)
}

/// Mutable state of one run. Dropped when the run finishes.
struct RunState<'c> {
    config: &'c BacktestConfig,
    open_trades: BTreeMap<String, Trade>,
    ledger: Vec<Trade>,
    equity: f64,
    equity_curve: Vec<f64>,
}

impl<'c> RunState<'c> {
    fn new(config: &'c BacktestConfig) -> Self {
        Self {
            config,
            open_trades: BTreeMap::new(),
            ledger: Vec::new(),
            equity: config.initial_capital,
            equity_curve: vec![config.initial_capital],
        }
    }

    fn close_trade(&mut self, symbol: &str, exit_price: f64, time: DateTime<Utc>, status: TradeStatus) {
        let Some(trade) = self.open_trades.remove(symbol) else {
            return;
        };
        let closed = trade.close(
            exit_price,
            time,
            status,
            self.config.slippage_pct,
            self.config.commission_pct,
        );
        if PRINT_TRADE_EVENTS {
            log::info!("Closed {} at {}: PnL={:.2}", symbol, status, closed.pnl);
        } else {
            log::debug!("Closed {} at {}: PnL={:.2}", symbol, status, closed.pnl);
        }
        self.ledger.push(closed);
    }

    /// Stop-loss is checked before take-profit; exits fill at the level price.
    fn check_exits(&mut self, current: &[TimeSeriesSlice<'_>], time: DateTime<Utc>) {
        let mut exits = Vec::new();
        for (symbol, trade) in &self.open_trades {
            let Some(bar) = find_slice(current, symbol).and_then(|s| s.last_candle()) else {
                continue;
            };
            let hit = match trade.direction {
                TradeDirection::Long => {
                    if bar.low_price <= trade.stop_loss {
                        Some((TradeStatus::ClosedSl, trade.stop_loss))
                    } else if bar.high_price >= trade.take_profit {
                        Some((TradeStatus::ClosedTp, trade.take_profit))
                    } else {
                        None
                    }
                }
                TradeDirection::Short => {
                    if bar.high_price >= trade.stop_loss {
                        Some((TradeStatus::ClosedSl, trade.stop_loss))
                    } else if bar.low_price <= trade.take_profit {
                        Some((TradeStatus::ClosedTp, trade.take_profit))
                    } else {
                        None
                    }
                }
            };
            if let Some((status, level)) = hit {
                exits.push((symbol.clone(), status, level));
            }
        }
        for (symbol, status, level) in exits {
            self.close_trade(&symbol, level, time, status);
        }
    }

    fn process_signal(
        &mut self,
        symbol: &str,
        direction: Direction,
        current: &[TimeSeriesSlice<'_>],
        time: DateTime<Utc>,
    ) {
        let Some(side) = TradeDirection::from_direction(direction) else {
            return;
        };
        let Some(price) = find_slice(current, symbol).and_then(|s| s.last_close()) else {
            return;
        };

        if let Some(existing) = self.open_trades.get(symbol) {
            if existing.direction == side {
                return;
            }
            self.close_trade(symbol, price, time, TradeStatus::ClosedSignal);
            if !self.config.flip_on_opposite_signal {
                return;
            }
        }

        if self.open_trades.len() >= self.config.max_open_trades || price <= 0.0 {
            return;
        }

        // Sized off the equity marked at the previous bar
        let position_value = self.equity * self.config.position_size_pct;
        let position_size = position_value / price;
        let (stop_loss, take_profit) = match side {
            TradeDirection::Long => (
                price * (1.0 - self.config.stop_loss_pct),
                price * (1.0 + self.config.take_profit_pct),
            ),
            TradeDirection::Short => (
                price * (1.0 + self.config.stop_loss_pct),
                price * (1.0 - self.config.take_profit_pct),
            ),
        };
        let entry_price = side.slipped_entry(price, self.config.slippage_pct);

        if PRINT_TRADE_EVENTS {
            log::info!("Opened {} {} at {:.5}", side, symbol, entry_price);
        } else {
            log::debug!("Opened {} {} at {:.5}", side, symbol, entry_price);
        }
        self.open_trades.insert(
            symbol.to_string(),
            Trade::new(symbol, side, entry_price, time, position_size, stop_loss, take_profit),
        );
    }

    fn mark_to_market(&mut self, current: &[TimeSeriesSlice<'_>]) {
        let realized: f64 = self.ledger.iter().map(|t| t.pnl).sum();
        let unrealized: f64 = self
            .open_trades
            .iter()
            .filter_map(|(symbol, trade)| {
                let price = find_slice(current, symbol)?.last_close()?;
                Some(trade.unrealized_pnl(price))
            })
            .sum();
        self.equity = self.config.initial_capital + realized + unrealized;
        self.equity_curve.push(self.equity);
    }

    /// Force-close at each series' last available close.
    fn close_all(&mut self, data: &TimeSeriesCollection, time: DateTime<Utc>) {
        let symbols: Vec<String> = self.open_trades.keys().cloned().collect();
        for symbol in symbols {
            match data.find(&symbol).ok().and_then(|s| s.last_close()) {
                Some(price) => self.close_trade(&symbol, price, time, TradeStatus::ClosedEnd),
                None => log::warn!("No closing price for {}, dropping open trade", symbol),
            }
        }
        self.open_trades.clear();
    }

    fn finish(self) -> BacktestResult {
        BacktestResult::from_ledger(self.ledger, self.equity_curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisResult, DirectionProbabilities, ProbabilisticAnalyzer, ProbabilityResult};
    use crate::analysis::probability::ProbabilityFactors;
    use crate::config::{ANALYSIS, AnalysisConfig, BACKTEST, ProbabilitySettings, WeightSettings};
    use crate::models::OhlcvTimeSeries;
    use crate::test_support::{BASE_TS_MS, flat_series, series_from_bars, trending_series};
    use crate::utils::TimeUtils;

    /// Emits an actionable forecast for (bar index, symbol) pairs it was given.
    #[derive(Default)]
    struct ScriptedSource {
        script: BTreeMap<(i64, String), Direction>,
        correlation_updates: usize,
    }

    impl ScriptedSource {
        fn at(mut self, bar: i64, symbol: &str, direction: Direction) -> Self {
            self.script.insert((bar, symbol.to_string()), direction);
            self
        }
    }

    impl SignalSource for ScriptedSource {
        fn update_correlations(&mut self, _series: &[TimeSeriesSlice<'_>]) {
            self.correlation_updates += 1;
        }

        fn analyze_batch_at(
            &self,
            series: &[TimeSeriesSlice<'_>],
            timeframe: &str,
            _sentiment: Option<&crate::analysis::MarketSentiment>,
            timestamp: DateTime<Utc>,
        ) -> BTreeMap<String, AnalysisResult> {
            let bar = (timestamp.timestamp_millis() - BASE_TS_MS) / TimeUtils::MS_IN_H;
            series
                .iter()
                .map(|slice| {
                    let symbol = slice.symbol().to_string();
                    let probability = self.script.get(&(bar, symbol.clone())).map(|&direction| {
                        ProbabilityResult {
                            symbol: symbol.clone(),
                            direction,
                            probabilities: DirectionProbabilities::from_array([0.8, 0.1, 0.1]),
                            confidence: 0.7,
                            is_actionable: true,
                            factors: ProbabilityFactors {
                                roc: 0.0,
                                volatility: 1.0,
                                volume: 1.0,
                                correlation: 0.5,
                            },
                            market_context: None,
                        }
                    });
                    let result = AnalysisResult {
                        symbol: symbol.clone(),
                        timeframe: timeframe.to_string(),
                        timestamp,
                        probability,
                        volatility: None,
                        events: Vec::new(),
                        market_sentiment: None,
                    };
                    (symbol, result)
                })
                .collect()
        }
    }

    fn quiet_bars(n: usize) -> Vec<(f64, f64, f64)> {
        vec![(100.5, 99.5, 100.0); n]
    }

    fn collection(series: Vec<OhlcvTimeSeries>) -> TimeSeriesCollection {
        TimeSeriesCollection::new("test", series)
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        let result = BacktestEngine::default().run(&TimeSeriesCollection::default(), &mut ScriptedSource::default());
        assert_eq!(result.total_trades, 0);
        assert_eq!(result.total_pnl, 0.0);
        assert_eq!(result.win_rate, 0.0);
        assert_eq!(result.equity_curve, vec![BACKTEST.initial_capital]);
    }

    #[test]
    fn test_take_profit_long() {
        let mut bars = quiet_bars(5);
        bars[2] = (105.0, 99.0, 104.5);
        let data = collection(vec![series_from_bars("BTCUSDT", &bars)]);
        let mut source = ScriptedSource::default().at(0, "BTCUSDT", Direction::Upward);

        let result = BacktestEngine::default().run(&data, &mut source);
        assert_eq!(result.total_trades, 1);
        let trade = &result.trades[0];
        assert_eq!(trade.status, TradeStatus::ClosedTp);
        assert_eq!(trade.direction, TradeDirection::Long);
        // 2% of 10k at a close of 100 => 2 units; entry slipped up
        assert!((trade.position_size - 2.0).abs() < 1e-12);
        assert!((trade.entry_price - 100.1).abs() < 1e-9);
        assert!((trade.take_profit - 104.0).abs() < 1e-9);
        assert!((trade.stop_loss - 98.0).abs() < 1e-9);
        let exit = 104.0 * 0.999;
        assert!((trade.exit_price.unwrap() - exit).abs() < 1e-9);
        let expected = (exit - 100.1) * 2.0 - 100.1 * 2.0 * 0.001 * 2.0;
        assert!((trade.pnl - expected).abs() < 1e-9);
        assert_eq!(trade.exit_time, Some(epoch_ms_to_datetime(BASE_TS_MS + 2 * TimeUtils::MS_IN_H)));
        // One curve point per bar plus the starting capital
        assert_eq!(result.equity_curve.len(), 6);
        assert_eq!(source.correlation_updates, 5);
    }

    #[test]
    fn test_stop_loss_checked_before_take_profit() {
        let mut bars = quiet_bars(4);
        // Both levels inside the same bar
        bars[1] = (105.0, 97.0, 100.0);
        let data = collection(vec![series_from_bars("BTCUSDT", &bars)]);
        let mut source = ScriptedSource::default().at(0, "BTCUSDT", Direction::Upward);

        let result = BacktestEngine::default().run(&data, &mut source);
        assert_eq!(result.trades[0].status, TradeStatus::ClosedSl);
        assert!((result.trades[0].exit_price.unwrap() - 98.0 * 0.999).abs() < 1e-9);
        assert!(result.trades[0].pnl < 0.0);
    }

    #[test]
    fn test_short_take_profit() {
        let mut bars = quiet_bars(4);
        bars[2] = (100.0, 95.0, 95.5);
        let data = collection(vec![series_from_bars("ETHUSDT", &bars)]);
        let mut source = ScriptedSource::default().at(0, "ETHUSDT", Direction::Downward);

        let result = BacktestEngine::default().run(&data, &mut source);
        let trade = &result.trades[0];
        assert_eq!(trade.direction, TradeDirection::Short);
        assert_eq!(trade.status, TradeStatus::ClosedTp);
        assert!((trade.exit_price.unwrap() - 96.0 * 1.001).abs() < 1e-9);
        assert!(trade.is_winner());
    }

    #[test]
    fn test_opposite_signal_closes_without_reversing() {
        let data = collection(vec![series_from_bars("BTCUSDT", &quiet_bars(5))]);
        let script = || {
            ScriptedSource::default()
                .at(0, "BTCUSDT", Direction::Upward)
                .at(2, "BTCUSDT", Direction::Downward)
        };

        let result = BacktestEngine::default().run(&data, &mut script());
        assert_eq!(result.total_trades, 1, "Opposite signal only closes");
        assert_eq!(result.trades[0].status, TradeStatus::ClosedSignal);

        let flipping = BacktestConfig {
            flip_on_opposite_signal: true,
            ..BACKTEST
        };
        let result = BacktestEngine::new(flipping).run(&data, &mut script());
        assert_eq!(result.total_trades, 2);
        assert_eq!(result.trades[0].status, TradeStatus::ClosedSignal);
        assert_eq!(result.trades[1].direction, TradeDirection::Short);
        assert_eq!(result.trades[1].status, TradeStatus::ClosedEnd);
    }

    #[test]
    fn test_same_direction_signal_keeps_trade() {
        let data = collection(vec![series_from_bars("BTCUSDT", &quiet_bars(4))]);
        let mut source = ScriptedSource::default()
            .at(0, "BTCUSDT", Direction::Upward)
            .at(1, "BTCUSDT", Direction::Upward)
            .at(2, "BTCUSDT", Direction::Consolidation);

        let result = BacktestEngine::default().run(&data, &mut source);
        assert_eq!(result.total_trades, 1);
        assert_eq!(result.trades[0].status, TradeStatus::ClosedEnd);
        assert_eq!(result.trades[0].entry_time, epoch_ms_to_datetime(BASE_TS_MS));
    }

    #[test]
    fn test_max_open_trades_cap() {
        let symbols = ["AAA", "BBB", "CCC", "DDD"];
        let data = collection(
            symbols
                .iter()
                .map(|s| series_from_bars(s, &quiet_bars(3)))
                .collect(),
        );
        let mut source = symbols
            .iter()
            .fold(ScriptedSource::default(), |src, s| src.at(0, s, Direction::Upward));

        let result = BacktestEngine::default().run(&data, &mut source);
        assert_eq!(result.total_trades, BACKTEST.max_open_trades);
        assert!(result.trades.iter().all(|t| t.status == TradeStatus::ClosedEnd));
        assert!(result.trades.iter().all(|t| t.symbol != "DDD"));
    }

    #[test]
    fn test_open_slots_fill_in_collection_order() {
        // Listed against alphabetical order on purpose
        let symbols = ["ZZZ", "YYY", "AAA", "BBB"];
        let data = collection(
            symbols
                .iter()
                .map(|s| series_from_bars(s, &quiet_bars(3)))
                .collect(),
        );
        let mut source = symbols
            .iter()
            .fold(ScriptedSource::default(), |src, s| src.at(0, s, Direction::Upward));

        let result = BacktestEngine::default().run(&data, &mut source);
        let mut traded: Vec<&str> = result.trades.iter().map(|t| t.symbol.as_str()).collect();
        traded.sort_unstable();
        assert_eq!(traded, vec!["AAA", "YYY", "ZZZ"]);
    }

    #[test]
    fn test_equity_marks_open_positions() {
        let mut bars = quiet_bars(3);
        bars[1] = (101.5, 100.5, 101.0);
        let data = collection(vec![series_from_bars("BTCUSDT", &bars)]);
        let mut source = ScriptedSource::default().at(0, "BTCUSDT", Direction::Upward);

        let result = BacktestEngine::default().run(&data, &mut source);
        let curve = &result.equity_curve;
        // Bar 0 marks the fresh position at its close: entry slippage only
        assert!((curve[1] - (10_000.0 + (100.0 - 100.1) * 2.0)).abs() < 1e-9);
        assert!((curve[2] - (10_000.0 + (101.0 - 100.1) * 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_calendars_only_trade_the_overlap() {
        let a = series_from_bars("AAA", &quiet_bars(6));
        let mut b = series_from_bars("BBB", &quiet_bars(6));
        b.timestamps_ms = b
            .timestamps_ms
            .iter()
            .map(|ts| ts + 3 * TimeUtils::MS_IN_H)
            .collect();
        let data = collection(vec![a, b]);

        let result = BacktestEngine::default().run(&data, &mut ScriptedSource::default());
        assert_eq!(result.equity_curve.len(), 3 + 1);
    }

    #[test]
    fn test_runs_end_to_end_with_probabilistic_analyzer() {
        let config = AnalysisConfig {
            probability: ProbabilitySettings {
                weights: WeightSettings {
                    roc: 1.0,
                    volatility: 0.0,
                    volume: 0.0,
                    correlation: 0.0,
                },
                ..ANALYSIS.probability
            },
            ..ANALYSIS
        };
        let mut analyzer = ProbabilisticAnalyzer::new(&config).unwrap();
        let data = collection(vec![
            trending_series("BTCUSDT", 60, 100.0, 0.77),
            flat_series("EURUSD=X", 60, 1.1),
        ]);

        let result = BacktestEngine::default()
            .with_timeframe("1h")
            .with_sentiment(MarketSentimentAggregator::default())
            .run(&data, &mut analyzer);

        assert_eq!(result.equity_curve.len(), 61);
        assert!(result.total_trades >= 1, "Steady rally should trade");
        assert!(result.trades.iter().all(|t| !t.is_open()));
        assert!(result.trades.iter().all(|t| t.symbol == "BTCUSDT"));
        assert!(result.trades.iter().all(|t| t.direction == TradeDirection::Long));
        assert!(result.total_pnl > 0.0);
    }
}
