use serde::{Deserialize, Serialize};

/// Per-column standardization fitted on the training split only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    ///
    /// Zero-variance columns get a unit deviation so transforming them
    /// yields 0 instead of NaN.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let n_rows = rows.len().max(1) as f64;
        let n_cols = rows.first().map(|row| row.len()).unwrap_or(0);

        let mut mean = vec![0.0; n_cols];
        for row in rows {
            for (col, value) in row.iter().enumerate() {
                mean[col] += value;
            }
        }
        for value in &mut mean {
            *value /= n_rows;
        }

        let mut std = vec![0.0; n_cols];
        for row in rows {
            for (col, value) in row.iter().enumerate() {
                let delta = value - mean[col];
                std[col] += delta * delta;
            }
        }
        for value in &mut std {
            *value = (*value / n_rows).sqrt();
            if *value == 0.0 {
                *value = 1.0;
            }
        }

        Self { mean, std }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(value, (mean, std))| (value - mean) / std)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

/// Hyperparameters for the gradient-descent fit
#[derive(Debug, Clone, Copy)]
pub struct FitConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2_penalty: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 600,
            learning_rate: 0.05,
            l2_penalty: 0.001,
        }
    }
}

/// Ridge regressor over standardized features.
///
/// Weights are plain vectors so trained models serialize as portable
/// structured data rather than an opaque blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearRegressor {
    /// Full-batch gradient descent on squared error with L2 shrinkage.
    ///
    /// Inputs are expected to be standardized already; the step size in
    /// [`FitConfig`] assumes roughly unit-scale columns.
    pub fn fit(inputs: &[Vec<f64>], targets: &[f64], config: &FitConfig) -> Self {
        let n_rows = inputs.len().max(1) as f64;
        let n_cols = inputs.first().map(|row| row.len()).unwrap_or(0);

        let mut weights = vec![0.0; n_cols];
        let mut bias = 0.0;

        for _ in 0..config.epochs {
            let mut grad_weights = vec![0.0; n_cols];
            let mut grad_bias = 0.0;

            for (row, target) in inputs.iter().zip(targets.iter()) {
                let error = predict_row(&weights, bias, row) - target;
                grad_bias += error;
                for (col, value) in row.iter().enumerate() {
                    grad_weights[col] += error * value;
                }
            }

            bias -= config.learning_rate * 2.0 * grad_bias / n_rows;
            for (col, weight) in weights.iter_mut().enumerate() {
                let gradient =
                    2.0 * grad_weights[col] / n_rows + 2.0 * config.l2_penalty * *weight;
                *weight -= config.learning_rate * gradient;
            }
        }

        Self { weights, bias }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        predict_row(&self.weights, self.bias, row)
    }
}

fn predict_row(weights: &[f64], bias: f64, row: &[f64]) -> f64 {
    bias + weights
        .iter()
        .zip(row.iter())
        .map(|(weight, value)| weight * value)
        .sum::<f64>()
}

/// Coefficient of determination.
///
/// A zero-variance target set reports 0.0 rather than dividing by zero.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }

    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|y| (y - mean) * (y - mean)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }

    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(y, y_hat)| (y - y_hat) * (y - y_hat))
        .sum();

    1.0 - ss_res / ss_tot
}
