//! Technical indicator feature engineering over OHLC history.
//!
//! Rolling-window indicators return `None` for warmup bars; exponentially
//! smoothed ones seed from the first value and are defined from bar 0.

use crate::exchange::domain::ohlc::OhlcEntry;

/// Simple moving average over `period` bars.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out.push(Some(sum / period as f64));
        } else {
            out.push(None);
        }
    }
    out
}

/// Exponential moving average with alpha = 2 / (span + 1), seeded from the
/// first value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut current = f64::NAN;
    for (i, value) in values.iter().enumerate() {
        current = if i == 0 {
            *value
        } else {
            alpha * value + (1.0 - alpha) * current
        };
        out.push(current);
    }
    out
}

/// Relative Strength Index with Wilder's smoothing; RSI = 100 when the
/// average loss is zero.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..values.len() {
        let change = values[i] - values[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i <= period {
            avg_gain += gain / period as f64;
            avg_loss += loss / period as f64;
            if i < period {
                continue;
            }
        } else {
            avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        }

        out[i] = Some(if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        });
    }
    out
}

/// MACD(12, 26) with a 9-span signal line; returns (macd, signal, histogram).
pub fn macd(values: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let ema_12 = ema(values, 12);
    let ema_26 = ema(values, 26);
    let macd_line: Vec<f64> = ema_12
        .iter()
        .zip(&ema_26)
        .map(|(fast, slow)| fast - slow)
        .collect();
    let signal = ema(&macd_line, 9);
    let histogram = macd_line
        .iter()
        .zip(&signal)
        .map(|(m, s)| m - s)
        .collect();
    (macd_line, signal, histogram)
}

/// Bollinger bands (middle SMA, +/- `k` sample standard deviations);
/// returns (upper, middle, lower).
pub fn bollinger(
    values: &[f64],
    period: usize,
    k: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let middle = sma(values, period);
    let mut upper = vec![None; values.len()];
    let mut lower = vec![None; values.len()];

    for i in 0..values.len() {
        let Some(mean) = middle[i] else { continue };
        let window = &values[i + 1 - period..=i];
        let variance = window
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / (period as f64 - 1.0);
        let std = variance.sqrt();
        upper[i] = Some(mean + k * std);
        lower[i] = Some(mean - k * std);
    }
    (upper, middle, lower)
}

/// Average True Range over `period` bars (rolling mean of the true range).
pub fn atr(bars: &[OhlcEntry], period: usize) -> Vec<Option<f64>> {
    let true_ranges: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                let prev_close = bars[i - 1].close;
                (bar.high - bar.low)
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs())
            }
        })
        .collect();
    sma(&true_ranges, period)
}

/// Stochastic oscillator %K over `period` bars.
pub fn stochastic_k(bars: &[OhlcEntry], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 {
        return out;
    }
    for i in 0..bars.len() {
        if i + 1 < period {
            continue;
        }
        let window = &bars[i + 1 - period..=i];
        let lowest = window.iter().map(|bar| bar.low).fold(f64::INFINITY, f64::min);
        let highest = window
            .iter()
            .map(|bar| bar.high)
            .fold(f64::NEG_INFINITY, f64::max);
        if highest > lowest {
            out[i] = Some(100.0 * (bars[i].close - lowest) / (highest - lowest));
        }
    }
    out
}

/// On-balance volume: cumulative volume signed by the close-to-close move.
pub fn obv(bars: &[OhlcEntry]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    let mut total = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            if bar.close > bars[i - 1].close {
                total += bar.volume;
            } else {
                total -= bar.volume;
            }
        }
        out.push(total);
    }
    out
}
