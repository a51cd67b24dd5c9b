//! Recorded input/output samples.

use cs_core::Real;

use crate::error::{FitError, FitResult};

/// Time-stamped input/output record.
///
/// Built from rows of either `(u, y)` (a time column `t_k = k * dt` is
/// prepended) or `(t, u, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    t: Vec<Real>,
    u: Vec<Real>,
    y: Vec<Real>,
}

impl Dataset {
    pub fn from_rows(rows: &[Vec<Real>], dt: Option<Real>) -> FitResult<Self> {
        let columns = rows.first().map_or(0, Vec::len);
        if columns < 2 {
            return Err(FitError::InvalidData {
                what: format!("need at least 2 columns (u, y), got {columns}"),
            });
        }
        if columns > 3 {
            return Err(FitError::InvalidData {
                what: format!("expected (u, y) or (t, u, y) columns, got {columns}"),
            });
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != columns) {
            return Err(FitError::InvalidData {
                what: format!("row {bad} has {} columns, expected {columns}", rows[bad].len()),
            });
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FitError::InvalidData {
                what: "samples must be finite".to_string(),
            });
        }

        let (t, u, y) = if columns == 2 {
            let dt = dt.ok_or(FitError::InvalidArg {
                what: "dt is required for two-column data",
            })?;
            if !(dt > 0.0) {
                return Err(FitError::InvalidArg {
                    what: "dt must be positive",
                });
            }
            (
                (0..rows.len()).map(|k| k as Real * dt).collect(),
                rows.iter().map(|r| r[0]).collect(),
                rows.iter().map(|r| r[1]).collect(),
            )
        } else {
            (
                rows.iter().map(|r| r[0]).collect(),
                rows.iter().map(|r| r[1]).collect(),
                rows.iter().map(|r| r[2]).collect(),
            )
        };
        Self::new(t, u, y)
    }

    pub fn new(t: Vec<Real>, u: Vec<Real>, y: Vec<Real>) -> FitResult<Self> {
        if t.len() != u.len() || t.len() != y.len() {
            return Err(FitError::InvalidData {
                what: "t, u and y must have the same length".to_string(),
            });
        }
        if let Some(k) = t.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(FitError::InvalidData {
                what: format!("time must be strictly ascending (row {})", k + 1),
            });
        }
        Ok(Self { t, u, y })
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn t(&self) -> &[Real] {
        &self.t
    }

    pub fn u(&self) -> &[Real] {
        &self.u
    }

    pub fn y(&self) -> &[Real] {
        &self.y
    }

    /// Rows as `(t, u, y)`.
    pub fn rows(&self) -> impl Iterator<Item = [Real; 3]> + '_ {
        (0..self.len()).map(|k| [self.t[k], self.u[k], self.y[k]])
    }

    pub(crate) fn require_rows(&self, min: usize) -> FitResult<()> {
        if self.len() < min {
            return Err(FitError::InvalidData {
                what: format!("need at least {min} samples, got {}", self.len()),
            });
        }
        Ok(())
    }

    /// Common sample period; fails if sampling is not uniform.
    pub fn uniform_dt(&self) -> FitResult<Real> {
        self.require_rows(2)?;
        let span = self.t[self.len() - 1] - self.t[0];
        let dt = span / (self.len() - 1) as Real;
        let uniform = self
            .t
            .windows(2)
            .all(|w| ((w[1] - w[0]) - dt).abs() <= 1e-6 * dt);
        if !uniform {
            return Err(FitError::InvalidData {
                what: "samples must be evenly spaced in time".to_string(),
            });
        }
        Ok(dt)
    }
}

/// Parse comma-separated rows, skipping blank lines and a non-numeric
/// header line.
pub fn parse_csv(text: &str) -> FitResult<Vec<Vec<Real>>> {
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed: Result<Vec<Real>, _> =
            line.split(',').map(|f| f.trim().parse::<Real>()).collect();
        match parsed {
            Ok(row) => rows.push(row),
            Err(_) if rows.is_empty() => continue,
            Err(e) => {
                return Err(FitError::InvalidData {
                    what: format!("line {}: {e}", line_no + 1),
                });
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_columns_get_time_prepended() {
        let raw = vec![
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![1.0, 2.0],
            vec![1.0, 3.0],
            vec![1.0, 4.0],
        ];
        let data = Dataset::from_rows(&raw, Some(0.001)).unwrap();
        let rows: Vec<[Real; 3]> = data.rows().collect();
        assert_eq!(rows[0], [0.0, 0.0, 0.0]);
        assert_eq!(rows[1], [0.001, 1.0, 1.0]);
        assert_eq!(rows[4], [0.004, 1.0, 4.0]);
    }

    #[test]
    fn too_few_columns() {
        let raw = vec![vec![1.0], vec![2.0], vec![3.0]];
        assert!(matches!(
            Dataset::from_rows(&raw, Some(1.0)),
            Err(FitError::InvalidData { .. })
        ));
    }

    #[test]
    fn negative_dt() {
        let raw = vec![vec![0.0, 0.0], vec![1.0, 0.5], vec![1.0, 1.0]];
        assert!(matches!(
            Dataset::from_rows(&raw, Some(-1.0)),
            Err(FitError::InvalidArg { .. })
        ));
        assert!(Dataset::from_rows(&raw, None).is_err());
    }

    #[test]
    fn time_must_ascend() {
        let raw = vec![
            vec![0.0, 0.0, 0.0],
            vec![1.0, 1.0, 0.5],
            vec![0.5, 1.0, 1.0],
        ];
        assert!(matches!(
            Dataset::from_rows(&raw, Some(1.0)),
            Err(FitError::InvalidData { .. })
        ));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let raw = vec![vec![0.0, 0.0, 0.0], vec![1.0, 1.0]];
        assert!(Dataset::from_rows(&raw, None).is_err());
    }

    #[test]
    fn csv_header_is_skipped() {
        let rows = parse_csv("t,u,y\n0,0,0\n\n0.1, 1, 0.5\n").unwrap();
        assert_eq!(rows, vec![vec![0.0, 0.0, 0.0], vec![0.1, 1.0, 0.5]]);
        assert!(parse_csv("0,0\nx,1\n").is_err());
    }

    #[test]
    fn uneven_sampling_detected() {
        let data = Dataset::new(vec![0.0, 0.1, 0.3], vec![0.0; 3], vec![0.0; 3]).unwrap();
        assert!(data.uniform_dt().is_err());
    }
}
