//! Credit pricing for conversions.
//!
//! ```text
//! credits = ceil( base(category)
//!               × Σ weight_f × score_f(category)
//!               × size_multiplier(bytes)
//!               × quality_multiplier(tier) )
//! ```
//!
//! Every function here is pure: same inputs, same output, no I/O. That lets
//! callers price "what-if" scenarios without running anything.

pub mod advisor;

pub use advisor::{analyze_conversion_options, ConversionOptions, Offer, Recommendation, Strategy};

use crate::format::FormatId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// FACTOR WEIGHTS
// =============================================================================

pub const WEIGHT_COMPLEXITY: f64 = 0.35;
pub const WEIGHT_PROCESSING_TIME: f64 = 0.25;
pub const WEIGHT_RESOURCE_INTENSITY: f64 = 0.20;
pub const WEIGHT_PERCEIVED_VALUE: f64 = 0.15;
pub const WEIGHT_DEMAND: f64 = 0.05;

/// Scores of one category on the five pricing factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub complexity: f64,
    pub processing_time: f64,
    pub resource_intensity: f64,
    pub perceived_value: f64,
    pub demand: f64,
}

impl FactorScores {
    const fn new(
        complexity: f64,
        processing_time: f64,
        resource_intensity: f64,
        perceived_value: f64,
        demand: f64,
    ) -> Self {
        Self {
            complexity,
            processing_time,
            resource_intensity,
            perceived_value,
            demand,
        }
    }

    /// Weighted sum over the five factors.
    pub fn weighted(&self) -> f64 {
        WEIGHT_COMPLEXITY * self.complexity
            + WEIGHT_PROCESSING_TIME * self.processing_time
            + WEIGHT_RESOURCE_INTENSITY * self.resource_intensity
            + WEIGHT_PERCEIVED_VALUE * self.perceived_value
            + WEIGHT_DEMAND * self.demand
    }
}

// =============================================================================
// CATEGORIES
// =============================================================================

/// A named group of conversion pairs sharing a base cost and factor scores.
#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    pub base_credits: f64,
    pub scores: FactorScores,
    /// `(source, target)` patterns; `"*"` matches any format.
    pairs: &'static [(&'static str, &'static str)],
}

impl Category {
    fn matches(&self, source: &str, target: &str) -> bool {
        self.pairs.iter().any(|(s, t)| {
            (*s == "*" || *s == source) && (*t == "*" || *t == target) && source != target
        })
    }
}

const SIMPLE_TEXT: Category = Category {
    name: "simple_text",
    base_credits: 1.0,
    scores: FactorScores::new(1.0, 1.0, 1.0, 1.0, 1.0),
    pairs: &[
        ("txt", "md"),
        ("md", "txt"),
        ("txt", "html"),
        ("md", "html"),
        ("html", "txt"),
        ("html", "md"),
        ("csv", "tsv"),
        ("tsv", "csv"),
        ("csv", "json"),
        ("json", "csv"),
        ("csv", "html"),
        ("tsv", "html"),
    ],
};

const STRUCTURED_DATA: Category = Category {
    name: "structured_data",
    base_credits: 1.0,
    scores: FactorScores::new(1.1, 0.9, 0.8, 0.9, 0.9),
    pairs: &[
        ("json", "xml"),
        ("xml", "json"),
        ("json", "yaml"),
        ("yaml", "json"),
        ("xml", "csv"),
        ("csv", "xml"),
    ],
};

const IMAGE_RASTER: Category = Category {
    name: "image_raster",
    base_credits: 1.0,
    scores: FactorScores::new(0.8, 0.7, 1.0, 0.8, 1.0),
    pairs: &[
        ("png", "jpg"),
        ("jpg", "png"),
        ("png", "webp"),
        ("jpg", "webp"),
        ("webp", "png"),
        ("webp", "jpg"),
        ("gif", "png"),
        ("bmp", "png"),
        ("bmp", "jpg"),
        ("tiff", "png"),
        ("tiff", "jpg"),
        ("png", "gif"),
    ],
};

const OFFICE_INTERCHANGE: Category = Category {
    name: "office_interchange",
    base_credits: 2.0,
    scores: FactorScores::new(1.3, 1.2, 1.2, 1.1, 1.0),
    pairs: &[
        ("docx", "odt"),
        ("odt", "docx"),
        ("xlsx", "ods"),
        ("ods", "xlsx"),
        ("docx", "html"),
        ("docx", "txt"),
        ("docx", "md"),
        ("html", "docx"),
        ("md", "docx"),
        ("xlsx", "csv"),
        ("csv", "xlsx"),
        ("json", "xlsx"),
        ("xlsx", "json"),
        ("xlsx", "html"),
        ("pptx", "odp"),
    ],
};

const IMAGE_TO_PDF: Category = Category {
    name: "image_to_pdf",
    base_credits: 2.0,
    scores: FactorScores::new(1.1, 1.0, 1.2, 1.0, 0.9),
    pairs: &[
        ("png", "pdf"),
        ("jpg", "pdf"),
        ("tiff", "pdf"),
        ("webp", "pdf"),
    ],
};

const DOCUMENT_TO_PDF: Category = Category {
    name: "document_to_pdf",
    base_credits: 3.0,
    scores: FactorScores::new(1.6, 1.4, 1.5, 1.3, 1.2),
    pairs: &[
        ("docx", "pdf"),
        ("odt", "pdf"),
        ("rtf", "pdf"),
        ("html", "pdf"),
        ("md", "pdf"),
        ("txt", "pdf"),
        ("csv", "pdf"),
        ("xlsx", "pdf"),
        ("ods", "pdf"),
        ("pptx", "pdf"),
        ("odp", "pdf"),
    ],
};

const EBOOK: Category = Category {
    name: "ebook",
    base_credits: 3.0,
    scores: FactorScores::new(1.5, 1.3, 1.2, 1.2, 0.8),
    pairs: &[
        ("epub", "*"),
        ("*", "epub"),
        ("mobi", "*"),
        ("*", "mobi"),
    ],
};

const PDF_EXTRACTION: Category = Category {
    name: "pdf_extraction",
    base_credits: 4.0,
    scores: FactorScores::new(1.8, 1.6, 1.5, 1.5, 1.1),
    pairs: &[("pdf", "*")],
};

const IMAGE_TEXT_RECOGNITION: Category = Category {
    name: "image_text_recognition",
    base_credits: 5.0,
    scores: FactorScores::new(2.0, 1.8, 1.7, 1.6, 0.9),
    pairs: &[
        ("png", "txt"),
        ("jpg", "txt"),
        ("tiff", "txt"),
        ("png", "docx"),
        ("jpg", "docx"),
        ("tiff", "docx"),
    ],
};

/// Fallback for pairs no category names.
pub const DEFAULT_CATEGORY: Category = Category {
    name: "default",
    base_credits: 2.0,
    scores: FactorScores::new(1.2, 1.2, 1.2, 1.0, 1.0),
    pairs: &[],
};

/// Category table, matched in order; the first match wins.
pub const CATEGORIES: &[Category] = &[
    SIMPLE_TEXT,
    STRUCTURED_DATA,
    IMAGE_RASTER,
    OFFICE_INTERCHANGE,
    IMAGE_TO_PDF,
    DOCUMENT_TO_PDF,
    EBOOK,
    PDF_EXTRACTION,
    IMAGE_TEXT_RECOGNITION,
];

/// Category for `source → target`, falling back to [`DEFAULT_CATEGORY`].
pub fn category_for(source: &FormatId, target: &FormatId) -> &'static Category {
    CATEGORIES
        .iter()
        .find(|c| c.matches(source.as_str(), target.as_str()))
        .unwrap_or(&DEFAULT_CATEGORY)
}

// =============================================================================
// MULTIPLIERS
// =============================================================================

const MIB: u64 = 1024 * 1024;

/// Upper bound (inclusive) of each size tier and its multiplier.
const SIZE_TIERS: &[(u64, f64)] = &[(MIB, 1.0), (10 * MIB, 1.25), (50 * MIB, 1.5), (100 * MIB, 2.0)];

/// Multiplier for files above the last tier.
const SIZE_MULTIPLIER_MAX: f64 = 3.0;

/// Step function over [`SIZE_TIERS`]; non-decreasing in `size_bytes`.
pub fn size_multiplier(size_bytes: u64) -> f64 {
    SIZE_TIERS
        .iter()
        .find(|(limit, _)| size_bytes <= *limit)
        .map(|(_, m)| *m)
        .unwrap_or(SIZE_MULTIPLIER_MAX)
}

/// Requested output quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Draft,
    #[default]
    Standard,
    High,
    Premium,
}

impl QualityTier {
    pub fn multiplier(&self) -> f64 {
        match self {
            QualityTier::Draft => 0.8,
            QualityTier::Standard => 1.0,
            QualityTier::High => 1.3,
            QualityTier::Premium => 1.6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Draft => "draft",
            QualityTier::Standard => "standard",
            QualityTier::High => "high",
            QualityTier::Premium => "premium",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" | "basic" | "low" => Ok(QualityTier::Draft),
            "standard" | "normal" | "medium" => Ok(QualityTier::Standard),
            "high" => Ok(QualityTier::High),
            "premium" | "maximum" | "max" => Ok(QualityTier::Premium),
            other => Err(format!(
                "unknown quality tier '{other}' (expected draft, standard, high or premium)"
            )),
        }
    }
}

// =============================================================================
// CALCULATION
// =============================================================================

/// Every intermediate value of a price calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub source_format: FormatId,
    pub target_format: FormatId,
    pub category: String,
    pub base_credits: f64,
    pub factor_scores: FactorScores,
    pub weighted_factor_score: f64,
    pub size_bytes: u64,
    pub size_multiplier: f64,
    pub quality_tier: QualityTier,
    pub quality_multiplier: f64,
    /// Product before rounding.
    pub raw_credits: f64,
    /// Whole credits charged: `raw_credits` rounded up, at least 1.
    pub credits: u32,
}

/// Price `source → target` for a file of `size_bytes` at `quality`.
pub fn calculate_credits(
    source: &FormatId,
    target: &FormatId,
    size_bytes: u64,
    quality: QualityTier,
) -> (u32, CostBreakdown) {
    let category = category_for(source, target);
    let weighted = category.scores.weighted();
    let size_mult = size_multiplier(size_bytes);
    let quality_mult = quality.multiplier();

    let raw = category.base_credits * weighted * size_mult * quality_mult;
    let credits = (raw.ceil() as u32).max(1);

    let breakdown = CostBreakdown {
        source_format: source.clone(),
        target_format: target.clone(),
        category: category.name.to_string(),
        base_credits: category.base_credits,
        factor_scores: category.scores,
        weighted_factor_score: weighted,
        size_bytes,
        size_multiplier: size_mult,
        quality_tier: quality,
        quality_multiplier: quality_mult,
        raw_credits: raw,
        credits,
    };
    (credits, breakdown)
}
