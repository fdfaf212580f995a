//! String options for solver construction.
//!
//! `SolverOptions` is the typed form of `key=value` pairs (command line
//! arguments, config entries). Recognized keys:
//!
//! | key                | value                                        |
//! |--------------------|----------------------------------------------|
//! | `solver`           | `cg` or `gmres`                              |
//! | `max_iters`        | non-negative integer                         |
//! | `reduction_factor` | non-negative float                           |
//! | `baseline`         | `initial_resnorm`, `rhs_norm` or `absolute`  |
//! | `krylov_dim`       | positive integer (GMRES only)                |
//!
//! Unknown keys fail with [`KError::UnknownOption`], malformed values with
//! [`KError::InvalidOption`]. Options are applied to a builder with
//! [`SolverBuilder::with_options`](crate::solver::SolverBuilder::with_options).

use std::str::FromStr;

use crate::error::KError;
use crate::solver::SolverKind;
use crate::stop::Baseline;

/// Solver kind & parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverOptions {
    pub solver: Option<SolverKind>,
    pub max_iters: Option<usize>,
    pub reduction_factor: Option<f64>,
    pub baseline: Option<Baseline>,
    pub krylov_dim: Option<usize>,
}

fn value<V: FromStr>(key: &str, raw: &str) -> Result<V, KError> {
    raw.trim()
        .parse()
        .map_err(|_| KError::InvalidOption(format!("{key}: cannot parse `{raw}`")))
}

impl SolverOptions {
    /// Parse `key=value` pairs; later pairs override earlier ones.
    pub fn parse<I, S>(pairs: I) -> Result<Self, KError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut opts = SolverOptions::default();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| KError::InvalidOption(format!("expected key=value, got `{pair}`")))?;
            opts.set(key.trim(), raw)?;
        }
        Ok(opts)
    }

    /// Parse command line style arguments: `--key=value` or `key=value`.
    pub fn from_args<I, S>(args: I) -> Result<Self, KError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs: Vec<String> = args
            .into_iter()
            .map(|a| a.as_ref().trim_start_matches("--").to_string())
            .collect();
        Self::parse(pairs)
    }

    /// Set a single option.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), KError> {
        match key {
            "solver" => self.solver = Some(raw.trim().parse()?),
            "max_iters" => self.max_iters = Some(value(key, raw)?),
            "reduction_factor" => {
                let f: f64 = value(key, raw)?;
                if !(f >= 0.0) || f.is_infinite() {
                    return Err(KError::InvalidOption(format!(
                        "reduction_factor must be finite and non-negative, got `{raw}`"
                    )));
                }
                self.reduction_factor = Some(f);
            }
            "baseline" => self.baseline = Some(raw.trim().parse()?),
            "krylov_dim" => {
                let m: usize = value(key, raw)?;
                if m == 0 {
                    return Err(KError::InvalidOption("krylov_dim must be positive".into()));
                }
                self.krylov_dim = Some(m);
            }
            other => return Err(KError::UnknownOption(other.to_string())),
        }
        Ok(())
    }
}
