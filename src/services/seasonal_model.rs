//! Additive trend + seasonality forecaster
//!
//! `y(t) = g(t) + s_daily(t) + s_weekly(t) + s_yearly(t)` where `g` is a
//! piecewise-linear trend with changepoints over the first 80% of history and
//! each `s` is a truncated Fourier series. Parameters are the MAP estimate
//! under independent Gaussian priors, which reduces to a ridge system solved
//! by Cholesky factorisation. Time is measured in days since the Unix epoch.

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

use crate::config::CHANGEPOINT_PRIOR_SCALE;
use crate::models::forecast::ForecastRow;

const SECONDS_PER_DAY: f64 = 86_400.0;
/// Standard normal quantile for an 80% central interval
const Z_80: f64 = 1.281_551_565_544_600_4;
const MAX_CHANGEPOINTS: usize = 25;
const CHANGEPOINT_RANGE: f64 = 0.8;
const TREND_PRIOR_SCALE: f64 = 5.0;
const SEASONALITY_PRIOR_SCALE: f64 = 10.0;
/// Lower bound on the noise scale, in scaled units
const MIN_NOISE_SD: f64 = 0.01;
const FIT_ITERATIONS: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("no price history available")]
    NoData,
    #[error("need at least 2 observations to fit, got {0}")]
    InsufficientData(usize),
    #[error("all observations share one timestamp")]
    ZeroTimeSpan,
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("normal equations are singular")]
    Singular,
}

/// One Fourier seasonality term
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seasonality {
    pub name: &'static str,
    pub period_days: f64,
    pub order: usize,
}

pub const DAILY: Seasonality = Seasonality {
    name: "daily",
    period_days: 1.0,
    order: 4,
};

pub const WEEKLY: Seasonality = Seasonality {
    name: "weekly",
    period_days: 7.0,
    order: 3,
};

pub const YEARLY: Seasonality = Seasonality {
    name: "yearly",
    period_days: 365.25,
    order: 10,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub interval_z: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            changepoint_prior_scale: CHANGEPOINT_PRIOR_SCALE,
            seasonality_prior_scale: SEASONALITY_PRIOR_SCALE,
            interval_z: Z_80,
        }
    }
}

/// A fitted model; all parameters live in scaled units
#[derive(Debug, Clone)]
pub struct SeasonalModel {
    config: ModelConfig,
    t_start: f64,
    t_scale: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    k: f64,
    m: f64,
    deltas: Vec<f64>,
    /// Fourier coefficients for [DAILY, WEEKLY, YEARLY], sin/cos interleaved
    seasonal_betas: [Vec<f64>; 3],
    noise_sd: f64,
}

const SEASONALITIES: [Seasonality; 3] = [DAILY, WEEKLY, YEARLY];

fn to_days(ts: &NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

fn fourier_features(t_days: f64, season: &Seasonality, out: &mut Vec<f64>) {
    for i in 1..=season.order {
        let x = 2.0 * std::f64::consts::PI * i as f64 * t_days / season.period_days;
        out.push(x.sin());
        out.push(x.cos());
    }
}

/// Changepoint positions (scaled time) for a sorted, scaled history
fn place_changepoints(t_scaled: &[f64]) -> Vec<f64> {
    let hist_size = (t_scaled.len() as f64 * CHANGEPOINT_RANGE).floor() as usize;
    let n_changepoints = MAX_CHANGEPOINTS.min(hist_size.saturating_sub(1));
    if n_changepoints == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=n_changepoints)
        .map(|i| {
            let idx = (last * i as f64 / n_changepoints as f64).round() as usize;
            t_scaled[idx]
        })
        .collect()
}

impl SeasonalModel {
    /// Fit on `(timestamp, price)` pairs. Order does not matter.
    pub fn fit(history: &[(NaiveDateTime, f64)], config: ModelConfig) -> Result<Self, ForecastError> {
        if history.is_empty() {
            return Err(ForecastError::NoData);
        }
        if history.len() < 2 {
            return Err(ForecastError::InsufficientData(history.len()));
        }
        if history.iter().any(|(_, y)| !y.is_finite()) {
            return Err(ForecastError::NonFinite("price history"));
        }

        let mut sorted = history.to_vec();
        sorted.sort_by_key(|(ts, _)| *ts);

        let t_days: Vec<f64> = sorted.iter().map(|(ts, _)| to_days(ts)).collect();
        let t_start = t_days[0];
        let t_scale = t_days[t_days.len() - 1] - t_start;
        if t_scale <= 0.0 {
            return Err(ForecastError::ZeroTimeSpan);
        }

        let y_max = sorted.iter().map(|(_, y)| y.abs()).fold(0.0, f64::max);
        let y_scale = if y_max > 0.0 { y_max } else { 1.0 };
        let y: Vec<f64> = sorted.iter().map(|(_, v)| v / y_scale).collect();

        let t_scaled: Vec<f64> = t_days.iter().map(|t| (t - t_start) / t_scale).collect();
        let changepoints = place_changepoints(&t_scaled);

        let mut model = Self {
            config,
            t_start,
            t_scale,
            y_scale,
            changepoints,
            k: 0.0,
            m: 0.0,
            deltas: Vec::new(),
            seasonal_betas: [Vec::new(), Vec::new(), Vec::new()],
            noise_sd: MIN_NOISE_SD,
        };

        let rows: Vec<Vec<f64>> = t_days
            .iter()
            .zip(&t_scaled)
            .map(|(day, ts)| model.design_row(*day, *ts))
            .collect();
        let prior_scales = model.prior_scales();
        let p = prior_scales.len();
        let n = y.len() as f64;

        let mean = y.iter().sum::<f64>() / n;
        let variance = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let mut noise_var = variance.max(MIN_NOISE_SD * MIN_NOISE_SD);
        let mut beta = vec![0.0; p];

        for _ in 0..FIT_ITERATIONS {
            let mut a = vec![0.0; p * p];
            let mut b = vec![0.0; p];
            for (row, target) in rows.iter().zip(&y) {
                for i in 0..p {
                    b[i] += row[i] * target;
                    for j in i..p {
                        a[i * p + j] += row[i] * row[j];
                    }
                }
            }
            for i in 0..p {
                for j in 0..i {
                    a[i * p + j] = a[j * p + i];
                }
                a[i * p + i] += noise_var / (prior_scales[i] * prior_scales[i]);
            }

            beta = cholesky_solve(&a, &b, p).ok_or(ForecastError::Singular)?;

            let rss: f64 = rows
                .iter()
                .zip(&y)
                .map(|(row, target)| {
                    let fitted: f64 = row.iter().zip(&beta).map(|(x, c)| x * c).sum();
                    (target - fitted).powi(2)
                })
                .sum();
            noise_var = (rss / n).max(MIN_NOISE_SD * MIN_NOISE_SD);
        }

        if beta.iter().any(|c| !c.is_finite()) || !noise_var.is_finite() {
            return Err(ForecastError::NonFinite("fitted parameters"));
        }

        model.unpack(&beta);
        model.noise_sd = noise_var.sqrt();

        tracing::debug!(
            changepoints = model.changepoints.len(),
            parameters = p,
            noise_sd = model.noise_sd,
            "Fitted seasonal model"
        );

        Ok(model)
    }

    /// [k, m, deltas..., seasonal features...] for one point
    fn design_row(&self, t_days: f64, t_scaled: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(2 + self.changepoints.len() + 34);
        row.push(t_scaled);
        row.push(1.0);
        for cp in &self.changepoints {
            row.push(if t_scaled >= *cp { t_scaled - cp } else { 0.0 });
        }
        for season in &SEASONALITIES {
            fourier_features(t_days, season, &mut row);
        }
        row
    }

    fn prior_scales(&self) -> Vec<f64> {
        let mut scales = vec![TREND_PRIOR_SCALE, TREND_PRIOR_SCALE];
        scales.extend(std::iter::repeat(self.config.changepoint_prior_scale).take(self.changepoints.len()));
        for season in &SEASONALITIES {
            scales.extend(std::iter::repeat(self.config.seasonality_prior_scale).take(2 * season.order));
        }
        scales
    }

    fn unpack(&mut self, beta: &[f64]) {
        self.k = beta[0];
        self.m = beta[1];
        let n_cp = self.changepoints.len();
        self.deltas = beta[2..2 + n_cp].to_vec();

        let mut offset = 2 + n_cp;
        for (slot, season) in SEASONALITIES.iter().enumerate() {
            let width = 2 * season.order;
            self.seasonal_betas[slot] = beta[offset..offset + width].to_vec();
            offset += width;
        }
    }

    fn trend(&self, t_scaled: f64) -> f64 {
        let mut value = self.k * t_scaled + self.m;
        for (cp, delta) in self.changepoints.iter().zip(&self.deltas) {
            if t_scaled >= *cp {
                value += delta * (t_scaled - cp);
            }
        }
        value
    }

    fn seasonal(&self, slot: usize, t_days: f64) -> f64 {
        let mut features = Vec::with_capacity(self.seasonal_betas[slot].len());
        fourier_features(t_days, &SEASONALITIES[slot], &mut features);
        features
            .iter()
            .zip(&self.seasonal_betas[slot])
            .map(|(x, c)| x * c)
            .sum()
    }

    /// Variance of the trend at `horizon` scaled units past the end of history.
    ///
    /// Future changepoints arrive at the historical rate with Laplace
    /// magnitudes of mean `|delta|`; each one bends the trend linearly.
    fn trend_variance(&self, horizon: f64) -> f64 {
        if horizon <= 0.0 || self.deltas.is_empty() {
            return 0.0;
        }
        let rate = self.changepoints.len() as f64;
        let lambda = self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len() as f64;
        rate * 2.0 * lambda * lambda * horizon.powi(3) / 3.0
    }

    pub fn predict(&self, dates: &[NaiveDateTime]) -> Vec<ForecastRow> {
        dates
            .iter()
            .map(|ds| {
                let t_days = to_days(ds);
                let t_scaled = (t_days - self.t_start) / self.t_scale;

                let trend = self.trend(t_scaled) * self.y_scale;
                let daily = self.seasonal(0, t_days) * self.y_scale;
                let weekly = self.seasonal(1, t_days) * self.y_scale;
                let yearly = self.seasonal(2, t_days) * self.y_scale;
                let yhat = trend + daily + weekly + yearly;

                let variance = self.noise_sd.powi(2) + self.trend_variance(t_scaled - 1.0);
                let half_width = self.config.interval_z * variance.sqrt() * self.y_scale;

                ForecastRow {
                    ds: *ds,
                    trend,
                    yhat_lower: yhat - half_width,
                    yhat_upper: yhat + half_width,
                    daily,
                    weekly,
                    yearly,
                    yhat,
                }
            })
            .collect()
    }

    pub fn changepoint_count(&self) -> usize {
        self.changepoints.len()
    }
}

/// One timestamp per day after `last`, same time of day
pub fn future_dates(last: NaiveDateTime, horizon_days: u32) -> Vec<NaiveDateTime> {
    (1..=i64::from(horizon_days))
        .map(|k| last + Duration::days(k))
        .collect()
}

/// Fit on `history` and predict every historical timestamp followed by
/// `horizon_days` future days.
pub fn forecast(
    history: &[(NaiveDateTime, f64)],
    horizon_days: u32,
    config: ModelConfig,
) -> Result<Vec<ForecastRow>, ForecastError> {
    let model = SeasonalModel::fit(history, config)?;

    let mut dates: Vec<NaiveDateTime> = history.iter().map(|(ts, _)| *ts).collect();
    dates.sort();
    let last = *dates.last().ok_or(ForecastError::NoData)?;
    dates.extend(future_dates(last, horizon_days));

    let frame = model.predict(&dates);
    if frame
        .iter()
        .any(|row| !(row.yhat.is_finite() && row.yhat_lower.is_finite() && row.yhat_upper.is_finite()))
    {
        return Err(ForecastError::NonFinite("prediction"));
    }

    Ok(frame)
}

/// Solve `A x = b` for symmetric positive-definite row-major `A` (p x p)
fn cholesky_solve(a: &[f64], b: &[f64], p: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; p * p];
    for i in 0..p {
        for j in 0..=i {
            let mut sum = a[i * p + j];
            for k in 0..j {
                sum -= l[i * p + k] * l[j * p + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i * p + i] = sum.sqrt();
            } else {
                l[i * p + j] = sum / l[j * p + j];
            }
        }
    }

    // L z = b
    let mut z = vec![0.0; p];
    for i in 0..p {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * p + k] * z[k];
        }
        z[i] = sum / l[i * p + i];
    }

    // L^T x = z
    let mut x = vec![0.0; p];
    for i in (0..p).rev() {
        let mut sum = z[i];
        for k in (i + 1)..p {
            sum -= l[k * p + i] * x[k];
        }
        x[i] = sum / l[i * p + i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(offset)
    }

    fn noisy_history(n: i64) -> Vec<(NaiveDateTime, f64)> {
        (0..n)
            .map(|i| {
                let wobble = ((i * 37) % 11) as f64 - 5.0;
                (day(i), 95_000.0 + 150.0 * i as f64 + 400.0 * wobble)
            })
            .collect()
    }

    #[test]
    fn test_forecast_shape_and_bounds() {
        let history = noisy_history(10);
        let frame = forecast(&history, 30, ModelConfig::default()).unwrap();
        assert_eq!(frame.len(), 40);

        let future = &frame[10..];
        for (k, row) in future.iter().enumerate() {
            assert_eq!(row.ds, day(9 + k as i64 + 1));
            assert!(row.yhat_lower <= row.yhat, "row {} lower > yhat", k);
            assert!(row.yhat <= row.yhat_upper, "row {} yhat > upper", k);
            let components = row.trend + row.daily + row.weekly + row.yearly;
            assert!((components - row.yhat).abs() < 1e-6 * row.yhat.abs().max(1.0));
        }
    }

    #[test]
    fn test_future_intervals_do_not_shrink() {
        let frame = forecast(&noisy_history(40), 30, ModelConfig::default()).unwrap();
        let widths: Vec<f64> = frame[40..].iter().map(|r| r.yhat_upper - r.yhat_lower).collect();
        for pair in widths.windows(2) {
            assert!(pair[1] + 1e-9 >= pair[0]);
        }
    }

    #[test]
    fn test_recovers_linear_trend() {
        let history: Vec<(NaiveDateTime, f64)> = (0..120)
            .map(|i| (day(i), 1_000.0 + 5.0 * i as f64))
            .collect();
        let frame = forecast(&history, 30, ModelConfig::default()).unwrap();

        for (k, row) in frame[120..].iter().enumerate() {
            let expected = 1_000.0 + 5.0 * (120 + k) as f64;
            let error = (row.yhat - expected).abs() / expected;
            assert!(error < 0.03, "day {}: predicted {} expected {}", k, row.yhat, expected);
        }
    }

    #[test]
    fn test_changepoints_cover_first_80_percent() {
        let model = SeasonalModel::fit(&noisy_history(10), ModelConfig::default()).unwrap();
        assert_eq!(model.changepoint_count(), 7);
        assert!(model.changepoints.iter().all(|cp| *cp > 0.0 && *cp < 0.8));

        let model = SeasonalModel::fit(&noisy_history(200), ModelConfig::default()).unwrap();
        assert_eq!(model.changepoint_count(), 25);
    }

    #[test]
    fn test_unsorted_input_gives_sorted_frame() {
        let mut history = noisy_history(12);
        history.reverse();
        let frame = forecast(&history, 30, ModelConfig::default()).unwrap();
        assert_eq!(frame[0].ds, day(0));
        assert_eq!(frame[12].ds, day(12));
    }

    #[test]
    fn test_fit_errors() {
        let cfg = ModelConfig::default;
        assert_eq!(SeasonalModel::fit(&[], cfg()).unwrap_err(), ForecastError::NoData);
        assert_eq!(
            SeasonalModel::fit(&[(day(0), 1.0)], cfg()).unwrap_err(),
            ForecastError::InsufficientData(1)
        );
        assert_eq!(
            SeasonalModel::fit(&[(day(0), 1.0), (day(0), 2.0)], cfg()).unwrap_err(),
            ForecastError::ZeroTimeSpan
        );
        assert!(matches!(
            SeasonalModel::fit(&[(day(0), 1.0), (day(1), f64::NAN)], cfg()).unwrap_err(),
            ForecastError::NonFinite(_)
        ));
    }

    #[test]
    fn test_zero_prices_do_not_divide_by_zero() {
        let history: Vec<(NaiveDateTime, f64)> = (0..5).map(|i| (day(i), 0.0)).collect();
        let frame = forecast(&history, 30, ModelConfig::default()).unwrap();
        assert!(frame.iter().all(|r| r.yhat.abs() < 1e-6));
    }

    #[test]
    fn test_cholesky_solve() {
        // [[4, 2], [2, 3]] x = [2, 5]  ->  x = [-0.5, 2]
        let x = cholesky_solve(&[4.0, 2.0, 2.0, 3.0], &[2.0, 5.0], 2).unwrap();
        assert!((x[0] + 0.5).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);

        assert!(cholesky_solve(&[1.0, 2.0, 2.0, 4.0], &[1.0, 1.0], 2).is_none());
    }

    #[test]
    fn test_future_dates_keep_time_of_day() {
        let last = NaiveDate::from_ymd_opt(2025, 2, 27)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        let dates = future_dates(last, 3);
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 2, 28).unwrap().and_hms_opt(14, 5, 0).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(14, 5, 0).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 2).unwrap().and_hms_opt(14, 5, 0).unwrap(),
            ]
        );
    }
}
