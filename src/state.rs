use nalgebra::DVector;

// Conduit state at one instant: area and pressure per cell plus the lake level
#[derive(Debug, Clone, PartialEq)]
pub struct ConduitState {
    pub area: DVector<f64>,
    pub pressure: DVector<f64>,
    pub lake_height: f64,
}

impl ConduitState {
    pub fn new(area: DVector<f64>, pressure: DVector<f64>, lake_height: f64) -> Self {
        ConduitState {
            area,
            pressure,
            lake_height,
        }
    }

    pub fn from_slices(area: &[f64], pressure: &[f64], lake_height: f64) -> Self {
        ConduitState::new(
            DVector::from_column_slice(area),
            DVector::from_column_slice(pressure),
            lake_height,
        )
    }

    pub fn cells(&self) -> usize {
        self.area.len()
    }

    pub fn wrap(&self) -> DVector<f64> {
        wrap(&self.area, &self.pressure, self.lake_height)
    }

    pub fn unwrap(v: &DVector<f64>) -> Self {
        let (area, pressure, lake_height) = unwrap(v);
        ConduitState::new(area, pressure, lake_height)
    }
}

// Pack area, pressure and lake height into one vector of length 2N+1.
pub fn wrap(area: &DVector<f64>, pressure: &DVector<f64>, lake_height: f64) -> DVector<f64> {
    let n = area.len();
    let mut v = DVector::zeros(2 * n + 1);
    v.rows_mut(0, n).copy_from(area);
    v.rows_mut(n, n).copy_from(pressure);
    v[2 * n] = lake_height;
    v
}

// Inverse of `wrap`; N is recovered from the vector length.
pub fn unwrap(v: &DVector<f64>) -> (DVector<f64>, DVector<f64>, f64) {
    let n = (v.len() - 1) / 2;
    let area = v.rows(0, n).into_owned();
    let pressure = v.rows(n, n).into_owned();
    (area, pressure, v[2 * n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_layout() {
        let area = DVector::from_vec(vec![1.0, 2.0]);
        let pressure = DVector::from_vec(vec![10.0, 20.0]);
        let v = wrap(&area, &pressure, 7.0);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 10.0, 20.0, 7.0]);
    }

    #[test]
    fn test_unwrap_inverts_wrap() {
        for n in [1usize, 2, 5, 17] {
            let area = DVector::from_fn(n, |i, _| 0.5 + i as f64 * 0.125);
            let pressure = DVector::from_fn(n, |i, _| 4.9e4 - 1234.5 * i as f64);
            let h = 3.14159;
            let (a, p, lake) = unwrap(&wrap(&area, &pressure, h));
            assert_eq!(a, area);
            assert_eq!(p, pressure);
            assert_eq!(lake, h);
        }
    }

    #[test]
    fn test_state_round_trip() {
        let state = ConduitState::from_slices(&[1.0, 1.5, 2.0], &[3.0, 2.0, 1.0], 0.0);
        assert_eq!(state.cells(), 3);
        assert_eq!(ConduitState::unwrap(&state.wrap()), state);
    }
}
