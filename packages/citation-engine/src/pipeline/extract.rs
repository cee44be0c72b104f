//! Citation extraction: did an engine use the tracked domain as a source?
//!
//! Decision order:
//!
//! 1. Structured source list: first URL whose host matches the domain
//!    (`www.` stripped, subdomains allowed) is a citation at that rank.
//! 2. Answer text, only when the engine reports no source list: the domain
//!    string or one of its canonical titles. A text match has no rank and
//!    earns less confidence.
//! 3. Otherwise not cited. An explicitly empty source list is recorded as
//!    such so the scorer can tell "no sources at all" from "other sources".
//!
//! Failed calls and uninterpretable answers produce `Unknown` evidence, which
//! is excluded from scoring rather than counted as "not cited".

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::types::citation::CitationEvidence;
use crate::types::config::ExtractorConfig;
use crate::types::domain::{HostMatch, TrackedDomain};
use crate::types::engine::{EngineResult, RawAnswer, SourceRef};

/// Confidence for a structured (source-list) citation.
const STRUCTURED_POINTS: i32 = 40;
/// Confidence for an exact host or exact domain-string match.
const EXACT_MATCH_POINTS: i32 = 20;
/// Confidence at rank 1, decaying linearly to 0 at rank 10.
const RANK_POINTS: i32 = 20;
/// Awarded to every match.
const BASE_POINTS: i32 = 10;
/// Awarded to substantive answers.
const LENGTH_BONUS: i32 = 10;
/// Charged to answers that barely do more than echo the domain.
const ECHO_PENALTY: i32 = 30;

const SNIPPET_RADIUS: usize = 60;

/// How a text match was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextMatch {
    /// The domain string itself as a whole token
    Domain,
    /// A subdomain of it, or a canonical title
    Partial,
}

/// Extracts [`CitationEvidence`] from engine results. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct CitationExtractor {
    config: ExtractorConfig,
}

impl CitationExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Evidence for one engine result.
    pub fn extract(&self, domain: &TrackedDomain, result: &EngineResult) -> CitationEvidence {
        let Some(answer) = result.outcome.answer() else {
            return CitationEvidence::unknown();
        };

        if is_malformed(answer) {
            warn!(
                engine = %result.engine,
                query = %result.query,
                "Engine answer has neither text nor parsable sources; treating as error"
            );
            return CitationEvidence::unknown();
        }

        let evidence = self.extract_from_answer(domain, answer);
        debug!(
            engine = %result.engine,
            domain = %domain,
            cited = evidence.cited,
            position = ?evidence.position,
            confidence = evidence.confidence,
            basis = ?evidence.basis,
            "Extracted citation evidence"
        );
        evidence
    }

    fn extract_from_answer(&self, domain: &TrackedDomain, answer: &RawAnswer) -> CitationEvidence {
        let words = answer.text.split_whitespace().count();

        let Some(sources) = &answer.sources else {
            return match find_in_text(domain, &answer.text) {
                Some((kind, snippet)) => {
                    let confidence = self.confidence(false, kind == TextMatch::Domain, None, words);
                    CitationEvidence::text_mention(confidence, snippet)
                }
                None => CitationEvidence::not_cited(),
            };
        };

        // A source list is authoritative; text mentions alongside it don't count
        if sources.is_empty() {
            return CitationEvidence::empty_source_list();
        }
        match find_in_sources(domain, sources) {
            Some((rank, source, host_match)) => {
                let confidence = self.confidence(true, host_match == HostMatch::Exact, Some(rank), words);
                CitationEvidence::structured(rank, confidence, source.url.clone())
            }
            None => CitationEvidence::not_cited(),
        }
    }

    /// Confidence in [0, 100] from the strength of the evidence.
    fn confidence(&self, structured: bool, exact: bool, rank: Option<u32>, words: usize) -> u8 {
        let mut points = BASE_POINTS;

        if structured {
            points += STRUCTURED_POINTS;
        }
        if exact {
            points += EXACT_MATCH_POINTS;
        }
        if let Some(rank) = rank {
            let rank = rank.clamp(1, 10) as i32;
            points += RANK_POINTS * (10 - rank) / 9;
        }
        if words >= self.config.substantive_answer_words {
            points += LENGTH_BONUS;
        } else if words < self.config.short_answer_words {
            points -= ECHO_PENALTY;
        }

        points.clamp(0, 100) as u8
    }
}

/// An `ok` answer with no text and no usable sources carries no information.
fn is_malformed(answer: &RawAnswer) -> bool {
    if !answer.text.trim().is_empty() {
        return false;
    }
    match &answer.sources {
        None => true,
        Some(sources) if sources.is_empty() => false,
        Some(sources) => sources.iter().all(|s| Url::parse(&s.url).is_err()),
    }
}

/// First matching source with its 1-based rank in the engine's list.
fn find_in_sources<'a>(
    domain: &TrackedDomain,
    sources: &'a [SourceRef],
) -> Option<(u32, &'a SourceRef, HostMatch)> {
    sources.iter().enumerate().find_map(|(i, source)| {
        let host = Url::parse(&source.url).ok()?.host_str()?.to_string();
        let host_match = domain.match_host(&host);
        host_match
            .is_match()
            .then(|| ((i + 1) as u32, source, host_match))
    })
}

/// Look for the domain or a canonical title in free text.
fn find_in_text(domain: &TrackedDomain, text: &str) -> Option<(TextMatch, String)> {
    if text.trim().is_empty() {
        return None;
    }

    // `(sub.)?(www.)?example.com` as a whole token, case-insensitive
    let pattern = format!(
        r"(?i)(?:^|[^a-z0-9.\-])((?:[a-z0-9\-]+\.)*?)(?:www\.)?{}(?:$|[^a-z0-9\-])",
        regex::escape(domain.host())
    );
    if let Ok(re) = Regex::new(&pattern) {
        if let Some(caps) = re.captures(text) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            let subdomain = caps.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);
            let kind = if subdomain {
                TextMatch::Partial
            } else {
                TextMatch::Domain
            };
            return Some((kind, snippet(text, whole.0, whole.1)));
        }
    }

    let lower = text.to_lowercase();
    domain.canonical_titles.iter().find_map(|title| {
        let needle = title.to_lowercase();
        lower
            .find(&needle)
            .map(|start| (TextMatch::Partial, snippet(&lower, start, start + needle.len())))
    })
}

/// Text around a match, cut on char boundaries.
fn snippet(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(SNIPPET_RADIUS);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + SNIPPET_RADIUS).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::citation::EvidenceBasis;
    use crate::types::engine::{CallOutcome, EngineId};
    use proptest::prelude::*;

    const LONG_ANSWER: &str = "There are several good options for small teams. Many reviewers \
        recommend starting with a tool that has a generous free tier, solid integrations, \
        clear pricing and responsive support. Compare onboarding time, reporting features, \
        mobile apps and how well each option handles a growing contact list before deciding.";

    fn domain() -> TrackedDomain {
        TrackedDomain::parse("example.com")
            .unwrap()
            .with_title("The Example Field Guide")
    }

    fn ok_result(answer: RawAnswer) -> EngineResult {
        EngineResult::new(EngineId::new("test"), "best crm", CallOutcome::Ok(answer))
    }

    fn extract(answer: RawAnswer) -> CitationEvidence {
        CitationExtractor::default().extract(&domain(), &ok_result(answer))
    }

    #[test]
    fn test_structured_citation_rank() {
        let evidence = extract(RawAnswer::text(LONG_ANSWER).with_source_urls(&[
            "https://other.org/a",
            "https://www.Example.com/pricing",
            "https://example.com/blog",
        ]));

        assert!(evidence.cited);
        assert_eq!(evidence.position, Some(2));
        assert_eq!(evidence.basis, EvidenceBasis::StructuredSource);
        // base 10 + structured 40 + exact 20 + rank 2 => 17 + length 10
        assert_eq!(evidence.confidence, 97);
    }

    #[test]
    fn test_subdomain_citation_is_not_exact() {
        let evidence =
            extract(RawAnswer::text(LONG_ANSWER).with_source_urls(&["https://docs.example.com/x"]));
        assert!(evidence.cited);
        assert_eq!(evidence.position, Some(1));
        assert_eq!(evidence.confidence, 10 + 40 + 20 + 10);
    }

    #[test]
    fn test_lookalike_host_not_cited() {
        let evidence = extract(
            RawAnswer::text(LONG_ANSWER).with_source_urls(&["https://notexample.com", "https://example.com.evil.io"]),
        );
        assert!(!evidence.cited);
        assert_eq!(evidence.basis, EvidenceBasis::NotCited);
    }

    #[test]
    fn test_text_mention_has_no_position_and_lower_confidence() {
        let text = format!("{} A popular pick is example.com for its templates.", LONG_ANSWER);
        let evidence = extract(RawAnswer::text(text));

        assert!(evidence.cited);
        assert!(evidence.position.is_none());
        assert_eq!(evidence.basis, EvidenceBasis::TextMention);
        assert_eq!(evidence.confidence, 10 + 20 + 10);
        assert!(evidence.snippet.unwrap().contains("example.com"));
    }

    #[test]
    fn test_title_mention() {
        let text = format!("{} See the example field guide for details.", LONG_ANSWER);
        let evidence = extract(RawAnswer::text(text));
        assert!(evidence.cited);
        assert_eq!(evidence.confidence, 10 + 10);
    }

    #[test]
    fn test_echo_answer_down_weighted() {
        let evidence = extract(RawAnswer::text("example.com"));
        assert!(evidence.cited);
        // base 10 + exact 20 - echo 30
        assert_eq!(evidence.confidence, 0);
    }

    #[test]
    fn test_domain_inside_other_word_is_not_a_mention() {
        let evidence = extract(RawAnswer::text(format!("{} Try myexample.com today.", LONG_ANSWER)));
        assert!(!evidence.cited);
    }

    #[test]
    fn test_empty_source_list() {
        let evidence = extract(RawAnswer::text(LONG_ANSWER).with_sources(vec![]));
        assert!(!evidence.cited);
        assert_eq!(evidence.basis, EvidenceBasis::EmptySourceList);
    }

    #[test]
    fn test_source_list_without_domain_ignores_text_mention() {
        let text = format!("{} A popular pick is example.com for its templates.", LONG_ANSWER);
        let evidence = extract(
            RawAnswer::text(text).with_source_urls(&["https://other.org/a", "https://third.net/b"]),
        );
        assert!(!evidence.cited);
        assert!(evidence.position.is_none());
        assert_eq!(evidence.basis, EvidenceBasis::NotCited);
    }

    #[test]
    fn test_empty_source_list_ignores_text_mention() {
        let text = format!("{} A popular pick is example.com for its templates.", LONG_ANSWER);
        let evidence = extract(RawAnswer::text(text).with_sources(vec![]));
        assert!(!evidence.cited);
        assert_eq!(evidence.basis, EvidenceBasis::EmptySourceList);
    }

    #[test]
    fn test_failed_call_is_unknown() {
        let result = EngineResult::new(EngineId::new("test"), "q", CallOutcome::Timeout);
        let evidence = CitationExtractor::default().extract(&domain(), &result);
        assert!(evidence.is_unknown());
        assert!(!evidence.cited);
        assert_eq!(evidence.confidence, 0);
    }

    #[test]
    fn test_blank_answer_is_malformed() {
        assert!(extract(RawAnswer::text("   ")).is_unknown());
        assert!(extract(RawAnswer::text("").with_source_urls(&["not a url"])).is_unknown());
    }

    proptest! {
        #[test]
        fn prop_confidence_bounded_and_position_only_when_cited(
            text in ".{0,400}",
            urls in proptest::collection::vec("(https://)?[a-z]{1,8}\\.(com|org|example\\.com)(/[a-z]{0,5})?", 0..12),
            with_sources in any::<bool>(),
        ) {
            let mut answer = RawAnswer::text(text);
            if with_sources {
                answer = answer.with_sources(urls.iter().map(SourceRef::new).collect());
            }
            let evidence = extract(answer);
            prop_assert!(evidence.confidence <= 100);
            if !evidence.cited {
                prop_assert!(evidence.position.is_none());
            }
            if let Some(p) = evidence.position {
                prop_assert!(p >= 1);
            }
        }
    }
}
