//! The per-day replay loop.
//!
//! Phases within each timestamp, in fixed order:
//! 1. mark-to-market at bar opens,
//! 2. execution of pending intents (exits before scale-outs before
//!    entries, tickers in lexical order),
//! 3. feature update and signal generation on bar closes,
//! 4. intrabar risk: stop / gap-through exits, scale-out touch detection.
//!
//! After the final timestamp every remaining position is force-flatted at
//! its own ticker's last bar of the day; a leftover open position or a
//! ledger mismatch is an invariant violation, not a warning.

use crate::calendar::SessionClock;
use crate::config::Config;
use crate::domain::{
    Bar, DailyBar, ExitReason, FillRecord, IntentKind, PendingIntent, Position, RejectedIntent,
    RejectionCode, Side, TradeRecord,
};
use crate::engine::fill_model::FillModel;
use crate::engine::sizing::size_entry;
use crate::features::FeatureEngine;
use crate::strategy::TickerStrategy;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Everything the simulator needs for one day, fetched up front.
pub struct DayInput {
    pub date: NaiveDate,
    /// Minute bars per watchlist ticker, premarket included, ascending.
    pub bars: BTreeMap<String, Vec<Bar>>,
    /// Previous session's daily bar per ticker, for PDH/PDL.
    pub prev_daily: HashMap<String, DailyBar>,
}

#[derive(Debug, Clone, Default)]
pub struct DayResult {
    pub trades: Vec<TradeRecord>,
    pub fills: Vec<FillRecord>,
    pub rejected: Vec<RejectedIntent>,
    pub realized_pnl: f64,
    pub fees_paid: f64,
    pub end_cash: f64,
    pub equity_high_water: f64,
}

struct TickerCtx {
    rth_bars: Vec<Bar>,
    cursor: usize,
    engine: FeatureEngine,
    strategy: TickerStrategy,
    pending: Option<PendingIntent>,
    last_price: Option<f64>,
}

struct PortfolioBook {
    cash: f64,
    positions: BTreeMap<String, Position>,
    open_trade_ids: HashMap<String, String>,
    realized_pnl: f64,
    fees_paid: f64,
    trades_today: HashMap<String, u32>,
    cooldown_until: HashMap<String, DateTime<Utc>>,
    equity_high_water: f64,
    trade_seq: u32,
}

impl PortfolioBook {
    fn new(starting_equity: f64) -> Self {
        Self {
            cash: starting_equity,
            positions: BTreeMap::new(),
            open_trade_ids: HashMap::new(),
            realized_pnl: 0.0,
            fees_paid: 0.0,
            trades_today: HashMap::new(),
            cooldown_until: HashMap::new(),
            equity_high_water: starting_equity,
            trade_seq: 0,
        }
    }
}

/// Simulate one trading day. Pure in its inputs: same bars and config give
/// byte-identical ledgers.
pub fn simulate_day(
    config: &Config,
    clock: &SessionClock,
    input: &DayInput,
) -> Result<DayResult, EngineError> {
    let date = input.date;
    let rth_open = clock.rth_open_instant(date);
    let premarket_end = clock.premarket_end_instant(date);
    let (entry_start, entry_end) = clock.entry_window(date);
    let force_flat = clock.force_flat_instant(date);

    let fill_model = FillModel::new(&config.fills);
    let stop_buffer = config.strategy.stop_buffer_pct;
    let cooldown = Duration::minutes(config.strategy.cooldown_minutes);

    // Per-ticker contexts: warm features on premarket bars, keep the RTH
    // slice for the replay itself.
    let mut tickers: BTreeMap<String, TickerCtx> = BTreeMap::new();
    let mut timeline: BTreeSet<DateTime<Utc>> = BTreeSet::new();
    for (ticker, bars) in &input.bars {
        let mut engine = FeatureEngine::new(
            &config.features,
            input.prev_daily.get(ticker),
            rth_open,
            premarket_end,
        );
        for bar in bars.iter().filter(|b| b.ts < rth_open) {
            engine.update(bar);
        }
        let rth_bars: Vec<Bar> = bars
            .iter()
            .filter(|b| b.ts >= rth_open && b.ts <= force_flat)
            .cloned()
            .collect();
        if rth_bars.is_empty() {
            continue;
        }
        if let Err(e) = crate::domain::bar::check_monotonic(&rth_bars) {
            return Err(EngineError::InvariantViolation(format!("{ticker}: {e}")));
        }
        for bar in &rth_bars {
            timeline.insert(bar.ts);
        }
        tickers.insert(
            ticker.clone(),
            TickerCtx {
                rth_bars,
                cursor: 0,
                engine,
                strategy: TickerStrategy::new(ticker, &config.strategy, &config.features),
                pending: None,
                last_price: None,
            },
        );
    }

    let mut book = PortfolioBook::new(config.risk.starting_equity);
    let mut result = DayResult::default();

    for ts in timeline {
        // Which tickers print a bar at this timestamp?
        let active: Vec<String> = tickers
            .iter()
            .filter(|(_, ctx)| {
                ctx.cursor < ctx.rth_bars.len() && ctx.rth_bars[ctx.cursor].ts == ts
            })
            .map(|(ticker, _)| ticker.clone())
            .collect();

        // Phase 1: mark-to-market with prices known at bar open.
        let mut equity_at_open = book.cash;
        for (ticker, position) in &book.positions {
            let ctx = &tickers[ticker];
            let price = if active.contains(ticker) {
                ctx.rth_bars[ctx.cursor].open
            } else {
                ctx.last_price.unwrap_or(position.avg_entry)
            };
            equity_at_open += position.market_value(price);
        }
        book.equity_high_water = book.equity_high_water.max(equity_at_open);

        // Phase 2: execute pending intents from prior bars. Exits free
        // cash and slots before entries consume them.
        let mut executable: Vec<(IntentKind, String)> = active
            .iter()
            .filter_map(|ticker| {
                let pending = tickers[ticker].pending.as_ref()?;
                (pending.signal_ts < ts).then(|| (pending.kind, ticker.clone()))
            })
            .collect();
        executable.sort();

        for (_, ticker) in executable {
            let intent = tickers.get_mut(&ticker).and_then(|ctx| ctx.pending.take());
            let Some(intent) = intent else { continue };
            let bar = current_bar(&tickers[&ticker]).clone();
            match intent.kind {
                IntentKind::Exit => {
                    if book.positions.contains_key(&ticker) {
                        let px = fill_model.exit_price(bar.open);
                        let reason = intent.exit_reason.unwrap_or(ExitReason::ForceFlat);
                        close_final(
                            &mut book, &fill_model, &ticker, ts, px, reason, cooldown,
                            &mut result,
                        );
                    }
                }
                IntentKind::ScaleOut => {
                    execute_scale_out(&mut book, &fill_model, &ticker, &intent, &bar, &mut result);
                }
                IntentKind::Enter => {
                    execute_entry(
                        config,
                        &mut book,
                        &fill_model,
                        &ticker,
                        &intent,
                        &bar,
                        equity_at_open,
                        stop_buffer,
                        date,
                        &mut result,
                    );
                }
            }
        }

        // Phase 3: feature update and signal generation on bar close.
        for ticker in &active {
            let position = book.positions.get(ticker);
            let gates_open = entry_gates_open(config, &book, ticker, ts);
            let ctx = tickers.get_mut(ticker).expect("active ticker present");
            let bar = ctx.rth_bars[ctx.cursor].clone();
            let snap = ctx.engine.update(&bar);
            let in_entry_window =
                ts >= entry_start && ts <= entry_end && gates_open && ctx.pending.is_none();
            let intent = ctx.strategy.on_bar_close(&bar, &snap, position, in_entry_window);
            if let Some(intent) = intent {
                // A full exit replaces a queued scale-out; nothing else
                // overrides an existing intent.
                match (&ctx.pending, intent.kind) {
                    (None, _) => ctx.pending = Some(intent),
                    (Some(queued), IntentKind::Exit) if queued.kind == IntentKind::ScaleOut => {
                        ctx.pending = Some(intent)
                    }
                    _ => {}
                }
            }
            ctx.last_price = Some(bar.close);
        }

        // Phase 4: intrabar risk on (open, low), plus scale-out touches.
        for ticker in &active {
            let ctx = tickers.get_mut(ticker).expect("active ticker present");
            let bar = ctx.rth_bars[ctx.cursor].clone();

            enum Intrabar {
                GapThrough,
                Stop(f64),
                ScaleTouch,
                Nothing,
            }
            let decision = match book.positions.get_mut(ticker) {
                Some(position) => {
                    position.tick_bar();
                    if bar.open <= position.stop {
                        Intrabar::GapThrough
                    } else if bar.low <= position.stop {
                        Intrabar::Stop(position.stop)
                    } else {
                        match position.scale_target {
                            Some(target)
                                if !position.scaled
                                    && position.qty > 1
                                    && bar.high >= target
                                    && ctx.pending.is_none() =>
                            {
                                Intrabar::ScaleTouch
                            }
                            _ => Intrabar::Nothing,
                        }
                    }
                }
                None => Intrabar::Nothing,
            };

            match decision {
                Intrabar::GapThrough => {
                    let px = fill_model.exit_price(bar.open);
                    close_final(
                        &mut book, &fill_model, ticker, ts, px,
                        ExitReason::StopHitGapThrough, cooldown, &mut result,
                    );
                    ctx.pending = None;
                }
                Intrabar::Stop(stop) => {
                    let px = fill_model.exit_price(stop);
                    close_final(
                        &mut book, &fill_model, ticker, ts, px, ExitReason::StopHit, cooldown,
                        &mut result,
                    );
                    ctx.pending = None;
                }
                Intrabar::ScaleTouch => {
                    ctx.pending = Some(PendingIntent::scale_out(
                        ticker,
                        ts,
                        config.strategy.scale_fraction,
                    ));
                }
                Intrabar::Nothing => {}
            }
            ctx.cursor += 1;
        }
    }

    // Force-flat: each leftover position closes at its own ticker's last
    // bar of the day, not at a global last timestamp.
    let open_tickers: Vec<String> = book.positions.keys().cloned().collect();
    for ticker in open_tickers {
        let ctx = &tickers[&ticker];
        let Some(last_bar) = ctx.rth_bars.last() else {
            return Err(EngineError::InvariantViolation(format!(
                "open position in {ticker} with no bars to flatten against"
            )));
        };
        let px = fill_model.exit_price(last_bar.close);
        close_final(
            &mut book, &fill_model, &ticker, last_bar.ts, px, ExitReason::ForceFlat, cooldown,
            &mut result,
        );
    }

    if !book.positions.is_empty() {
        let leftovers: Vec<&String> = book.positions.keys().collect();
        return Err(EngineError::InvariantViolation(format!(
            "positions still open after force-flat: {leftovers:?}"
        )));
    }

    // End-of-day ledger check: trades and fills must tell the same story.
    let fills_pnl: f64 = result.fills.iter().map(FillRecord::cash_delta).sum();
    let trades_pnl: f64 = result.trades.iter().map(|t| t.pnl_total).sum();
    if (fills_pnl - trades_pnl).abs() > 0.01 {
        return Err(EngineError::InvariantViolation(format!(
            "ledger mismatch on {date}: fills {fills_pnl:.4} vs trades {trades_pnl:.4}"
        )));
    }

    result.realized_pnl = book.realized_pnl;
    result.fees_paid = book.fees_paid;
    result.end_cash = book.cash;
    result.equity_high_water = book.equity_high_water;
    debug!(%date, trades = result.trades.len(), fills = result.fills.len(), "day simulated");
    Ok(result)
}

fn current_bar(ctx: &TickerCtx) -> &Bar {
    &ctx.rth_bars[ctx.cursor]
}

fn entry_gates_open(
    config: &Config,
    book: &PortfolioBook,
    ticker: &str,
    ts: DateTime<Utc>,
) -> bool {
    if book.trades_today.get(ticker).copied().unwrap_or(0) >= config.risk.max_trades_per_day {
        return false;
    }
    if book.realized_pnl <= -config.risk.max_daily_loss_dollars {
        return false;
    }
    if let Some(&until) = book.cooldown_until.get(ticker) {
        if ts < until {
            return false;
        }
    }
    true
}

#[allow(clippy::too_many_arguments)]
fn execute_entry(
    config: &Config,
    book: &mut PortfolioBook,
    fill_model: &FillModel,
    ticker: &str,
    intent: &PendingIntent,
    bar: &Bar,
    equity_at_open: f64,
    stop_buffer: f64,
    date: NaiveDate,
    result: &mut DayResult,
) {
    if book.positions.contains_key(ticker) {
        return;
    }

    let mut reject = |code: RejectionCode, result: &mut DayResult| {
        result.rejected.push(RejectedIntent { ts: bar.ts, ticker: ticker.to_string(), code });
    };

    // Daily gates, re-checked at fill time (they may have tripped since
    // the signal bar).
    if book.trades_today.get(ticker).copied().unwrap_or(0) >= config.risk.max_trades_per_day {
        return reject(RejectionCode::MaxTradesPerDay, result);
    }
    if book.realized_pnl <= -config.risk.max_daily_loss_dollars {
        return reject(RejectionCode::DailyLossLimit, result);
    }
    if let Some(&until) = book.cooldown_until.get(ticker) {
        if bar.ts < until {
            return reject(RejectionCode::CooldownActive, result);
        }
    }

    let entry_px = fill_model.entry_price(bar.open);
    let stop_base = intent.stop_base.expect("entry intent carries a stop base");
    let stop_px = stop_base * (1.0 - stop_buffer);
    // A gap down through the stop invalidates the trade: reject, do not
    // open-and-stop-out.
    if stop_px >= entry_px {
        return reject(RejectionCode::InvalidStop, result);
    }

    let starter_fraction = intent.starter.then_some(config.strategy.starter_fraction);
    let qty = match size_entry(&config.risk, equity_at_open, entry_px, stop_px, starter_fraction) {
        Ok(qty) => qty,
        Err(code) => return reject(code, result),
    };

    let setup = intent.setup.expect("entry intent carries a setup");
    book.cash -= entry_px * f64::from(qty);
    *book.trades_today.entry(ticker.to_string()).or_insert(0) += 1;
    book.trade_seq += 1;
    let trade_id = format!("{date}-{ticker}-{seq}", seq = book.trade_seq);

    let scale_target = intent.scale_target.filter(|&t| t > entry_px);
    let position = Position::open(
        ticker,
        qty,
        entry_px,
        stop_px,
        bar.ts,
        intent.signal_ts,
        setup,
        intent.starter,
        scale_target,
    );
    book.positions.insert(ticker.to_string(), position);
    book.open_trade_ids.insert(ticker.to_string(), trade_id.clone());

    result.fills.push(FillRecord {
        ts: bar.ts,
        ticker: ticker.to_string(),
        side: Side::Buy,
        qty,
        price: entry_px,
        fee: 0.0,
        intent_kind: IntentKind::Enter,
        reason: setup.as_str().to_string(),
        linked_trade_id: trade_id,
    });
}

fn execute_scale_out(
    book: &mut PortfolioBook,
    fill_model: &FillModel,
    ticker: &str,
    intent: &PendingIntent,
    bar: &Bar,
    result: &mut DayResult,
) {
    let Some(position) = book.positions.get_mut(ticker) else {
        return;
    };
    if position.scaled {
        return;
    }
    let fraction = intent.scale_fraction.expect("scale intent carries a fraction");
    let qty = ((f64::from(position.original_qty) * fraction).floor() as u32)
        .clamp(0, position.qty.saturating_sub(1));
    if qty == 0 {
        return;
    }

    let px = fill_model.exit_price(bar.open);
    let scale_pnl = (px - position.avg_entry) * f64::from(qty);
    position.apply_scale_out(qty, px);
    book.cash += px * f64::from(qty);
    book.realized_pnl += scale_pnl;

    let trade_id = book.open_trade_ids.get(ticker).cloned().unwrap_or_default();
    result.fills.push(FillRecord {
        ts: bar.ts,
        ticker: ticker.to_string(),
        side: Side::Sell,
        qty,
        price: px,
        fee: 0.0,
        intent_kind: IntentKind::ScaleOut,
        reason: ExitReason::ScaleOutTarget.as_str().to_string(),
        linked_trade_id: trade_id,
    });
}

#[allow(clippy::too_many_arguments)]
fn close_final(
    book: &mut PortfolioBook,
    fill_model: &FillModel,
    ticker: &str,
    ts: DateTime<Utc>,
    px: f64,
    reason: ExitReason,
    cooldown: Duration,
    result: &mut DayResult,
) {
    let Some(position) = book.positions.remove(ticker) else {
        return;
    };
    let qty = position.qty;
    let fee = fill_model.fees_per_trade();

    book.cash += px * f64::from(qty) - fee;
    book.fees_paid += fee;
    let final_exit_pnl = (px - position.avg_entry) * f64::from(qty);
    let pnl_total = position.scale_pnl + final_exit_pnl - fee;
    book.realized_pnl += final_exit_pnl - fee;

    if reason.arms_cooldown() {
        book.cooldown_until.insert(ticker.to_string(), ts + cooldown);
    }

    let trade_id = book.open_trade_ids.remove(ticker).unwrap_or_default();
    result.fills.push(FillRecord {
        ts,
        ticker: ticker.to_string(),
        side: Side::Sell,
        qty,
        price: px,
        fee,
        intent_kind: IntentKind::Exit,
        reason: reason.as_str().to_string(),
        linked_trade_id: trade_id.clone(),
    });
    result.trades.push(TradeRecord {
        trade_id,
        date: ts.date_naive(),
        ticker: ticker.to_string(),
        setup_tag: position.setup_tag,
        signal_ts: position.signal_ts,
        entry_ts: position.entry_ts,
        exit_ts: ts,
        entry_px: position.avg_entry,
        avg_exit_px: position.avg_exit_px(qty, px),
        original_qty: position.original_qty,
        scale_pnl: position.scale_pnl,
        final_exit_pnl,
        fees: fee,
        pnl_total,
        exit_reason: reason,
        stop_px_initial: position.stop_initial,
        bars_held: position.bars_held,
    });
}
