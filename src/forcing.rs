use crate::error::ConfigError;

// Piecewise-linear table y(x), held constant beyond both ends.
// Used for prescribed lake hydrographs (time, discharge) and lake
// hypsometry (height, area).
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Series {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, ConfigError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ConfigError::Table(format!(
                "need matching, non-empty columns (got {} and {} values)",
                x.len(),
                y.len()
            )));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ConfigError::Table(
                "abscissa must be strictly increasing".to_string(),
            ));
        }
        Ok(Series { x, y })
    }

    pub fn at(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let last = self.x.len() - 1;
        if x <= self.x[0] {
            return self.y[0];
        }
        if x >= self.x[last] {
            return self.y[last];
        }
        // first index with self.x[i] > x
        let i = self.x.partition_point(|&xi| xi <= x);
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (y0, y1) = (self.y[i - 1], self.y[i]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}
