//! Goodness-of-fit statistics of observed vs predicted series.

/// coefficient of determination `1 − SS_res/SS_tot`; for constant observations it is 1 on an exact
/// fit and 0 otherwise
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    let n = observed.len();
    if n == 0 {
        return f64::NAN;
    }
    let mean = observed.iter().sum::<f64>() / n as f64;
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn rmse(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() {
        return f64::NAN;
    }
    let ss: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p).powi(2))
        .sum();
    (ss / observed.len() as f64).sqrt()
}

pub fn mae(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() {
        return f64::NAN;
    }
    observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p).abs())
        .sum::<f64>()
        / observed.len() as f64
}

/// mean absolute percentage error over the non-zero observations, `None` if all are zero
pub fn mape(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    let terms: Vec<f64> = observed
        .iter()
        .zip(predicted)
        .filter(|(o, _)| **o != 0.0)
        .map(|(o, p)| ((o - p) / o).abs() * 100.0)
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.iter().sum::<f64>() / terms.len() as f64)
    }
}

pub fn max_abs_residual(observed: &[f64], predicted: &[f64]) -> f64 {
    observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_metrics() {
        let obs = [1.0, 2.0, 3.0, 4.0];
        let pred = [1.1, 1.9, 3.2, 3.8];
        // SS_res = 0.01+0.01+0.04+0.04 = 0.1, SS_tot = 5
        assert_relative_eq!(r_squared(&obs, &pred), 0.98, epsilon = 1e-12);
        assert_relative_eq!(rmse(&obs, &pred), (0.1_f64 / 4.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(mae(&obs, &pred), 0.15, epsilon = 1e-12);
        assert_relative_eq!(max_abs_residual(&obs, &pred), 0.2, epsilon = 1e-12);
        let m = mape(&obs, &pred).unwrap();
        assert_relative_eq!(m, (10.0 + 5.0 + 20.0 / 3.0 + 5.0) / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r_squared(&[2.0, 2.0], &[1.0, 2.0]), 0.0);
        assert!(mape(&[0.0, 0.0], &[1.0, 2.0]).is_none());
        assert!(rmse(&[], &[]).is_nan());
    }
}
