//! Index settings the engine can update individually.
//!
//! Each configured setting key maps to exactly one engine operation. Keys
//! outside this set are rejected rather than ignored.

use std::fmt;
use std::str::FromStr;

use crate::errors::SearchError;

/// An updatable Meilisearch index setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKind {
    DisplayedAttributes,
    SearchableAttributes,
    FilterableAttributes,
    SortableAttributes,
    RankingRules,
    StopWords,
    Synonyms,
    DistinctAttribute,
    TypoTolerance,
    Faceting,
    Pagination,
    ProximityPrecision,
    SeparatorTokens,
    NonSeparatorTokens,
    Dictionary,
    Embedders,
    SearchCutoffMs,
}

impl SettingKind {
    pub const ALL: [SettingKind; 17] = [
        Self::DisplayedAttributes,
        Self::SearchableAttributes,
        Self::FilterableAttributes,
        Self::SortableAttributes,
        Self::RankingRules,
        Self::StopWords,
        Self::Synonyms,
        Self::DistinctAttribute,
        Self::TypoTolerance,
        Self::Faceting,
        Self::Pagination,
        Self::ProximityPrecision,
        Self::SeparatorTokens,
        Self::NonSeparatorTokens,
        Self::Dictionary,
        Self::Embedders,
        Self::SearchCutoffMs,
    ];

    /// The setting's name as it appears in configuration and in the engine's
    /// settings object.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisplayedAttributes => "displayedAttributes",
            Self::SearchableAttributes => "searchableAttributes",
            Self::FilterableAttributes => "filterableAttributes",
            Self::SortableAttributes => "sortableAttributes",
            Self::RankingRules => "rankingRules",
            Self::StopWords => "stopWords",
            Self::Synonyms => "synonyms",
            Self::DistinctAttribute => "distinctAttribute",
            Self::TypoTolerance => "typoTolerance",
            Self::Faceting => "faceting",
            Self::Pagination => "pagination",
            Self::ProximityPrecision => "proximityPrecision",
            Self::SeparatorTokens => "separatorTokens",
            Self::NonSeparatorTokens => "nonSeparatorTokens",
            Self::Dictionary => "dictionary",
            Self::Embedders => "embedders",
            Self::SearchCutoffMs => "searchCutoffMs",
        }
    }

    /// Sub-route under `/indexes/{uid}/settings/`.
    pub fn route(&self) -> &'static str {
        match self {
            Self::DisplayedAttributes => "displayed-attributes",
            Self::SearchableAttributes => "searchable-attributes",
            Self::FilterableAttributes => "filterable-attributes",
            Self::SortableAttributes => "sortable-attributes",
            Self::RankingRules => "ranking-rules",
            Self::StopWords => "stop-words",
            Self::Synonyms => "synonyms",
            Self::DistinctAttribute => "distinct-attribute",
            Self::TypoTolerance => "typo-tolerance",
            Self::Faceting => "faceting",
            Self::Pagination => "pagination",
            Self::ProximityPrecision => "proximity-precision",
            Self::SeparatorTokens => "separator-tokens",
            Self::NonSeparatorTokens => "non-separator-tokens",
            Self::Dictionary => "dictionary",
            Self::Embedders => "embedders",
            Self::SearchCutoffMs => "search-cutoff-ms",
        }
    }

    /// Object-valued settings are merged with PATCH; everything else is
    /// replaced with PUT.
    pub fn is_partial_update(&self) -> bool {
        matches!(
            self,
            Self::TypoTolerance | Self::Faceting | Self::Pagination | Self::Embedders
        )
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SearchError::invalid_setting(s))
    }
}
