//! Citation evidence extracted from a single engine result.

use serde::{Deserialize, Serialize};

/// How the citation decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceBasis {
    /// Found in the engine's structured source list
    StructuredSource,

    /// Found only in the answer text (domain string or canonical title)
    TextMention,

    /// Engine answered, domain absent
    NotCited,

    /// Engine answered with an explicitly empty source list
    EmptySourceList,

    /// No usable answer (call failed or response malformed).
    ///
    /// Distinct from `NotCited`: nothing can be said about visibility.
    Unknown,
}

/// Evidence that an engine's answer used the tracked domain as a source.
///
/// Invariants: `confidence <= 100`; `position` is `Some` only when `cited`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEvidence {
    pub cited: bool,

    /// 1-based rank among the engine's sources
    pub position: Option<u32>,

    /// URL or text fragment that matched
    pub snippet: Option<String>,

    /// 0-100
    pub confidence: u8,

    pub basis: EvidenceBasis,
}

impl CitationEvidence {
    /// Structured citation at a given rank.
    pub fn structured(position: u32, confidence: u8, snippet: impl Into<String>) -> Self {
        Self {
            cited: true,
            position: Some(position.max(1)),
            snippet: Some(snippet.into()),
            confidence: confidence.min(100),
            basis: EvidenceBasis::StructuredSource,
        }
    }

    /// Textual mention without a rank.
    pub fn text_mention(confidence: u8, snippet: impl Into<String>) -> Self {
        Self {
            cited: true,
            position: None,
            snippet: Some(snippet.into()),
            confidence: confidence.min(100),
            basis: EvidenceBasis::TextMention,
        }
    }

    /// Engine answered without citing the domain.
    pub fn not_cited() -> Self {
        Self::absent(EvidenceBasis::NotCited)
    }

    /// Engine reported zero sources.
    pub fn empty_source_list() -> Self {
        Self::absent(EvidenceBasis::EmptySourceList)
    }

    /// Nothing usable came back.
    pub fn unknown() -> Self {
        Self::absent(EvidenceBasis::Unknown)
    }

    fn absent(basis: EvidenceBasis) -> Self {
        Self {
            cited: false,
            position: None,
            snippet: None,
            confidence: 0,
            basis,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.basis == EvidenceBasis::Unknown
    }
}
