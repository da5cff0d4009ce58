use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Support,
    Resistance,
}

#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub kind: LevelKind,
}

/// Support sorted ascending, resistance sorted descending.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Levels {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

impl Levels {
    pub fn new(support: Vec<f64>, resistance: Vec<f64>) -> Self {
        Self {
            support,
            resistance,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.support.is_empty() && self.resistance.is_empty()
    }

    pub fn side(&self, kind: LevelKind) -> &[f64] {
        match kind {
            LevelKind::Support => &self.support,
            LevelKind::Resistance => &self.resistance,
        }
    }

    /// First `per_side` levels of each side, support first.
    pub fn leading(&self, per_side: usize) -> impl Iterator<Item = Level> + '_ {
        let support = self.support.iter().take(per_side).map(|&price| Level {
            price,
            kind: LevelKind::Support,
        });
        let resistance = self.resistance.iter().take(per_side).map(|&price| Level {
            price,
            kind: LevelKind::Resistance,
        });
        support.chain(resistance)
    }

    /// First offending price, if any level is non-positive or non-finite.
    pub fn first_invalid(&self) -> Option<f64> {
        self.support
            .iter()
            .chain(&self.resistance)
            .copied()
            .find(|p| !p.is_finite() || *p <= 0.0)
    }
}
