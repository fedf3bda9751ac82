use std::fmt;

/// How samples that land in the same bucket are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    Sum,
    Mean,
}

/// Semantic type of a series, inferred from its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Activity,
    Basal,
    Bolus,
    Cgm,
    Hr,
    Meal,
    Smbg,
    Unknown,
}

/// Keywords in priority order; the first one contained in the identifier wins.
const KEYWORDS: [(&str, SourceType); 7] = [
    ("activity", SourceType::Activity),
    ("basal", SourceType::Basal),
    ("bolus", SourceType::Bolus),
    ("cgm", SourceType::Cgm),
    ("hr", SourceType::Hr),
    ("meal", SourceType::Meal),
    ("smbg", SourceType::Smbg),
];

impl SourceType {
    /// Case-insensitive substring match against the keyword list.
    pub fn classify(id: &str) -> SourceType {
        let lower = id.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|&(_, ty)| ty)
            .unwrap_or(SourceType::Unknown)
    }

    /// `None` for [`SourceType::Unknown`]; callers must not pick a default.
    pub fn policy(self) -> Option<AggregationPolicy> {
        match self {
            SourceType::Activity | SourceType::Bolus | SourceType::Meal => {
                Some(AggregationPolicy::Sum)
            }
            SourceType::Smbg | SourceType::Hr | SourceType::Cgm | SourceType::Basal => {
                Some(AggregationPolicy::Mean)
            }
            SourceType::Unknown => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceType::Activity => "activity",
            SourceType::Basal => "basal",
            SourceType::Bolus => "bolus",
            SourceType::Cgm => "cgm",
            SourceType::Hr => "hr",
            SourceType::Meal => "meal",
            SourceType::Smbg => "smbg",
            SourceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
