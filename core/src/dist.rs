use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_distr::{Exp, Normal};
use tracing::warn;

use crate::expr::{Expr, Scope};
use crate::state::Value;

/// The fixed set of sampling primitives callable from node constructors and
/// scripts. Parameter conventions follow the modeling tool this serves:
/// `U` with one parameter is a constant, `N` defaults sigma to 1.0, `T`
/// derives mean/sigma from its bounds and resamples until inside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dist {
    Exponential,
    Uniform,
    Normal,
    TruncNormal,
    Bernoulli,
    Choice,
}

impl Dist {
    pub fn from_name(name: &str) -> Option<Dist> {
        match name {
            "E" => Some(Dist::Exponential),
            "U" => Some(Dist::Uniform),
            "N" => Some(Dist::Normal),
            "T" => Some(Dist::TruncNormal),
            "B" => Some(Dist::Bernoulli),
            "C" => Some(Dist::Choice),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dist::Exponential => "E",
            Dist::Uniform => "U",
            Dist::Normal => "N",
            Dist::TruncNormal => "T",
            Dist::Bernoulli => "B",
            Dist::Choice => "C",
        }
    }

    /// Draws one value. Invalid parameters degrade to a neutral result with a
    /// warning instead of panicking; simulation errors are never fatal here.
    pub fn sample(&self, rng: &mut impl Rng, params: &[f64]) -> Value {
        match self {
            Dist::Exponential => {
                let mean = params.first().copied().unwrap_or(1.0);
                match Exp::new(1.0 / mean) {
                    Ok(d) if mean > 0.0 => Value::Num(rng.sample(d)),
                    _ => {
                        warn!(mean, "exponential mean must be positive; sampling 0");
                        Value::Num(0.0)
                    }
                }
            }
            Dist::Uniform => {
                let lo = params.first().copied().unwrap_or(1.0);
                let hi = params.get(1).copied().unwrap_or(lo);
                Value::Num(lo + rng.gen::<f64>() * (hi - lo))
            }
            Dist::Normal => {
                let mean = params.first().copied().unwrap_or(3.0);
                let std = params.get(1).copied().unwrap_or(1.0);
                match Normal::new(mean, std) {
                    Ok(d) => Value::Num(rng.sample(d)),
                    Err(_) => {
                        warn!(mean, std, "invalid normal parameters; sampling mean");
                        Value::Num(mean)
                    }
                }
            }
            Dist::TruncNormal => {
                let lo = params.first().copied().unwrap_or(1.0);
                let hi = params.get(1).copied().unwrap_or(lo);
                if !(hi > lo) {
                    return Value::Num(lo);
                }
                let (mean, std) = ((hi + lo) / 2.0, (hi - lo) / 2.0);
                match Normal::new(mean, std) {
                    Ok(d) => loop {
                        let x = rng.sample(d);
                        if (lo..=hi).contains(&x) {
                            return Value::Num(x);
                        }
                    },
                    Err(_) => Value::Num(mean),
                }
            }
            Dist::Bernoulli => {
                let p = params.first().copied().unwrap_or(0.5);
                Value::Bool(rng.gen::<f64>() < p)
            }
            Dist::Choice => {
                let weights: &[f64] = if params.is_empty() { &[1.0, 1.0, 1.0] } else { params };
                match WeightedIndex::new(weights) {
                    Ok(d) => Value::Num(d.sample(rng) as f64),
                    Err(_) => {
                        warn!(?weights, "unusable choice weights; picking index 0");
                        Value::Num(0.0)
                    }
                }
            }
        }
    }
}

/// A sampled delay. The periodic form comes from list-valued timer
/// parameters `[period, phase]` and means "fire at the next boundary".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Scalar(f64),
    Periodic { period: f64, phase: f64 },
}

/// A node's delay source: an optional distribution plus parameter
/// expressions re-evaluated against the live scopes on every draw, so a
/// service time may reference scenario or token variables.
#[derive(Debug, Clone)]
pub struct Sampler {
    pub dist: Option<Dist>,
    pub params: Vec<Expr>,
    /// A bare list delay (`[period]` or `[period, phase]`) means "fire at
    /// the next period boundary" rather than "wait this long". The list
    /// spelling itself selects the mode, so the flag comes from the parser.
    pub periodic: bool,
}

impl Sampler {
    pub fn new(dist: Option<Dist>, params: Vec<Expr>) -> Self {
        Self {
            dist,
            params,
            periodic: false,
        }
    }

    pub fn constant(v: f64) -> Self {
        Self {
            dist: None,
            params: vec![Expr::number(v)],
            periodic: false,
        }
    }

    pub fn periodic(params: Vec<Expr>) -> Self {
        Self {
            dist: None,
            params,
            periodic: true,
        }
    }

    pub fn sample(&self, scope: &mut Scope<'_>) -> Sample {
        let mut values = Vec::with_capacity(self.params.len());
        for p in &self.params {
            match p.eval(scope) {
                Ok(v) => values.push(v),
                Err(err) => {
                    warn!(%err, "sampler parameter failed to evaluate; using delay 0");
                    return Sample::Scalar(0.0);
                }
            }
        }
        // A single list parameter is the parameter vector itself.
        if values.len() == 1 {
            if let Value::List(items) = &values[0] {
                values = items.clone();
            }
        }
        let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        if nums.len() != values.len() {
            warn!("non-numeric sampler parameter; using delay 0");
            return Sample::Scalar(0.0);
        }
        match self.dist {
            Some(dist) => {
                let drawn = dist.sample(&mut scope.ctx.rng, &nums);
                Sample::Scalar(drawn.as_f64().unwrap_or(0.0))
            }
            None if self.periodic => Sample::Periodic {
                period: nums.first().copied().unwrap_or(0.0),
                phase: nums.get(1).copied().unwrap_or(0.0),
            },
            None => Sample::Scalar(nums.first().copied().unwrap_or(0.0)),
        }
    }
}
