//! Direct-versus-optimized strategy advice.
//!
//! Some pairs convert noticeably better through an intermediate format
//! (`csv → html → pdf` keeps table layout that a direct `csv → pdf` loses).
//! The advisor prices both routes with the cost model and recommends the
//! optimized one only when it clears both thresholds below.

use super::{calculate_credits, QualityTier};
use crate::format::FormatId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum relative quality gain for recommending an optimized route.
pub const MIN_QUALITY_GAIN: f64 = 0.10;

/// Maximum relative cost increase accepted for an optimized route.
pub const MAX_COST_INCREASE: f64 = 1.0;

/// File size used to price offers.
pub const REFERENCE_SIZE_BYTES: u64 = 1024 * 1024;

/// Quality tier used to price offers.
pub const REFERENCE_QUALITY: QualityTier = QualityTier::Standard;

/// Expected quality of a direct conversion with no table entry.
pub const DEFAULT_DIRECT_QUALITY: f64 = 0.85;

struct KnownRoute {
    source: &'static str,
    target: &'static str,
    via: &'static [&'static str],
    direct_quality: f64,
    optimized_quality: f64,
}

const KNOWN_ROUTES: &[KnownRoute] = &[
    KnownRoute {
        source: "csv",
        target: "pdf",
        via: &["html"],
        direct_quality: 0.70,
        optimized_quality: 0.90,
    },
    KnownRoute {
        source: "xlsx",
        target: "pdf",
        via: &["html"],
        direct_quality: 0.75,
        optimized_quality: 0.88,
    },
    KnownRoute {
        source: "md",
        target: "pdf",
        via: &["html"],
        direct_quality: 0.80,
        optimized_quality: 0.92,
    },
    KnownRoute {
        source: "txt",
        target: "epub",
        via: &["html"],
        direct_quality: 0.78,
        optimized_quality: 0.85,
    },
    KnownRoute {
        source: "json",
        target: "xlsx",
        via: &["csv"],
        direct_quality: 0.70,
        optimized_quality: 0.82,
    },
];

fn known_route(source: &FormatId, target: &FormatId) -> Option<&'static KnownRoute> {
    KNOWN_ROUTES
        .iter()
        .find(|r| r.source == source.as_str() && r.target == target.as_str())
}

/// A priced conversion route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Formats visited, source first and target last.
    pub steps: Vec<FormatId>,
    /// Sum of per-hop credits at the reference size and quality.
    pub credits: u32,
    /// Expected output quality in `0.0..=1.0`.
    pub quality: f64,
    /// Whether every hop has a registered capability. The advisor itself
    /// knows nothing about the registry and leaves this `false`;
    /// [`crate::engine::ConversionEngine`] fills it in.
    pub executable: bool,
}

impl Offer {
    fn priced(steps: Vec<FormatId>, quality: f64) -> Self {
        let credits = if steps.len() < 2 {
            // identity: priced like a single self-hop
            calculate_credits(&steps[0], &steps[0], REFERENCE_SIZE_BYTES, REFERENCE_QUALITY).0
        } else {
            steps
                .windows(2)
                .map(|w| calculate_credits(&w[0], &w[1], REFERENCE_SIZE_BYTES, REFERENCE_QUALITY).0)
                .sum()
        };
        Self {
            steps,
            credits,
            quality,
            executable: false,
        }
    }

    pub fn hops(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Direct,
    Optimized,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => f.write_str("direct"),
            Strategy::Optimized => f.write_str("optimized"),
        }
    }
}

/// The advisor's verdict with its reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub strategy: Strategy,
    pub justification: String,
    /// Relative quality gain of the optimized route, when there is one.
    pub quality_gain: Option<f64>,
    /// Relative cost increase of the optimized route, when there is one.
    pub cost_increase: Option<f64>,
}

/// Both offers and the recommendation for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub direct: Offer,
    pub optimized: Option<Offer>,
    pub recommendation: Recommendation,
}

/// Compare a direct offer against an optional optimized one.
pub fn recommend(direct: &Offer, optimized: Option<&Offer>) -> Recommendation {
    let Some(opt) = optimized else {
        return Recommendation {
            strategy: Strategy::Direct,
            justification: "no better multi-step route is known for this pair".into(),
            quality_gain: None,
            cost_increase: None,
        };
    };

    let quality_gain = if direct.quality > 0.0 {
        (opt.quality - direct.quality) / direct.quality
    } else {
        f64::INFINITY
    };
    let cost_increase = if direct.credits > 0 {
        (opt.credits as f64 - direct.credits as f64) / direct.credits as f64
    } else {
        f64::INFINITY
    };

    let route = opt
        .steps
        .iter()
        .map(FormatId::as_str)
        .collect::<Vec<_>>()
        .join(" → ");

    let (strategy, justification) = if quality_gain < MIN_QUALITY_GAIN {
        (
            Strategy::Direct,
            format!(
                "{route} improves quality by only {:.0}% (needs at least {:.0}%)",
                quality_gain * 100.0,
                MIN_QUALITY_GAIN * 100.0
            ),
        )
    } else if cost_increase > MAX_COST_INCREASE {
        (
            Strategy::Direct,
            format!(
                "{route} costs {:.0}% more (at most {:.0}% accepted)",
                cost_increase * 100.0,
                MAX_COST_INCREASE * 100.0
            ),
        )
    } else {
        (
            Strategy::Optimized,
            format!(
                "{route} improves quality by {:.0}% for {} vs {} credits",
                quality_gain * 100.0,
                opt.credits,
                direct.credits
            ),
        )
    };

    Recommendation {
        strategy,
        justification,
        quality_gain: Some(quality_gain),
        cost_increase: Some(cost_increase),
    }
}

/// Price the direct route and, if the table knows one, an optimized route.
pub fn analyze_conversion_options(source: &FormatId, target: &FormatId) -> ConversionOptions {
    let known = known_route(source, target);

    let direct_steps = if source == target {
        vec![source.clone()]
    } else {
        vec![source.clone(), target.clone()]
    };
    let direct_quality = known.map_or(DEFAULT_DIRECT_QUALITY, |r| r.direct_quality);
    let direct = Offer::priced(direct_steps, direct_quality);

    let optimized = known.and_then(|r| {
        let mut steps = vec![source.clone()];
        for via in r.via {
            steps.push(FormatId::parse(via).ok()?);
        }
        steps.push(target.clone());
        Some(Offer::priced(steps, r.optimized_quality))
    });

    let recommendation = recommend(&direct, optimized.as_ref());
    ConversionOptions {
        direct,
        optimized,
        recommendation,
    }
}
