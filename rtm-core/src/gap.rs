//! Gap analysis: matching unlinked artifacts to requirements
//!
//! Items not yet attached to any requirement are scored against the catalog.
//! Strong matches are pre-accepted; weak ones get a drafted new requirement
//! instead. All state changes go through [`GapAnalysis::apply`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::error::{RtmError, RtmResult};
use crate::models::Priority;
use crate::requirement::Requirement;

/// Default score at which a recommendation is pre-accepted
pub const DEFAULT_MATCH_THRESHOLD: u8 = 50;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "when", "should", "must", "will",
    "are", "not", "can", "has", "have", "was", "but", "all", "any", "via", "per", "its",
];

/// Kind of artifact waiting to be linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Task,
    TestCase,
    Issue,
    Document,
    Meeting,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Task => write!(f, "Task"),
            ItemKind::TestCase => write!(f, "Test Case"),
            ItemKind::Issue => write!(f, "Issue"),
            ItemKind::Document => write!(f, "Document"),
            ItemKind::Meeting => write!(f, "Meeting"),
        }
    }
}

/// Best requirement match for an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub req_id: String,
    pub req_title: String,
    /// Confidence in `[0, 100]`
    pub score: u8,
}

/// Requirement reference an item gets linked to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub req_id: String,
    pub title: String,
    pub number: Option<u32>,
}

impl LinkTarget {
    pub fn from_requirement(req: &Requirement) -> Self {
        Self {
            req_id: req.req_id.clone(),
            title: req.title.clone(),
            number: req.number(),
        }
    }
}

/// Requirement category guessed from item text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementCategory {
    Functional,
    Performance,
    Security,
    Usability,
    Compliance,
}

impl fmt::Display for RequirementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementCategory::Functional => write!(f, "Functional"),
            RequirementCategory::Performance => write!(f, "Performance"),
            RequirementCategory::Security => write!(f, "Security"),
            RequirementCategory::Usability => write!(f, "Usability"),
            RequirementCategory::Compliance => write!(f, "Compliance"),
        }
    }
}

/// Proposed new requirement for an item without a good match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDraft {
    pub draft_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: RequirementCategory,
    pub priority: Priority,
    /// Id of the item the draft was derived from
    pub source_item: String,
}

/// An artifact not yet attached to any requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlinkedItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    #[serde(default)]
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<RequirementDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_to: Option<LinkTarget>,
}

impl UnlinkedItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: String::new(),
            source: String::new(),
            recommendation: None,
            accepted: false,
            draft: None,
            linked_to: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_linked(&self) -> bool {
        self.linked_to.is_some()
    }

    pub fn score(&self) -> Option<u8> {
        self.recommendation.as_ref().map(|r| r.score)
    }
}

/// Scores items against requirements
pub trait Recommender: Send + Sync {
    /// Best match for `item`, `None` when there is nothing to compare against
    fn recommend(&self, item: &UnlinkedItem, requirements: &[Requirement]) -> Option<Recommendation>;
}

/// Keyword-overlap recommender
///
/// Title words count double. The score is the weighted share of item words
/// that also appear in the requirement's title or description.
#[derive(Debug, Clone, Default)]
pub struct KeywordRecommender;

impl KeywordRecommender {
    pub fn score(&self, item: &UnlinkedItem, req: &Requirement) -> u8 {
        let title_words = keywords(&item.title);
        let desc_words: Vec<String> = keywords(&item.description)
            .into_iter()
            .filter(|w| !title_words.contains(w))
            .collect();
        let weight = 2 * title_words.len() + desc_words.len();
        if weight == 0 {
            return 0;
        }

        let req_words: HashSet<String> = keywords(&format!("{} {}", req.title, req.description))
            .into_iter()
            .collect();
        let hits = 2 * title_words.iter().filter(|w| req_words.contains(*w)).count()
            + desc_words.iter().filter(|w| req_words.contains(*w)).count();
        ((hits * 100) / weight).min(100) as u8
    }
}

impl Recommender for KeywordRecommender {
    fn recommend(&self, item: &UnlinkedItem, requirements: &[Requirement]) -> Option<Recommendation> {
        let mut best: Option<(u8, &Requirement)> = None;
        for req in requirements {
            let score = self.score(item, req);
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, req));
            }
        }
        best.map(|(score, req)| Recommendation {
            req_id: req.req_id.clone(),
            req_title: req.title.clone(),
            score,
        })
    }
}

/// Lowercase words of at least three characters, stopwords removed, deduplicated
fn keywords(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in words(text) {
        if word.len() >= 3 && !STOPWORDS.contains(&word.as_str()) && !out.contains(&word) {
            out.push(word);
        }
    }
    out
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn has_word(words: &[String], prefixes: &[&str]) -> bool {
    words
        .iter()
        .any(|w| prefixes.iter().any(|p| w.starts_with(p)))
}

/// Guesses a requirement category from free text
pub fn classify(text: &str) -> RequirementCategory {
    let words = words(text);
    if has_word(&words, &["secur", "auth", "password", "encrypt", "permission", "login", "token", "xss", "csrf"]) {
        RequirementCategory::Security
    } else if has_word(&words, &["perform", "slow", "latency", "timeout", "load", "speed", "throughput", "memory"]) {
        RequirementCategory::Performance
    } else if has_word(&words, &["compliance", "audit", "gdpr", "regulat", "retention", "legal"]) {
        RequirementCategory::Compliance
    } else if has_word(&words, &["ui", "ux", "screen", "button", "layout", "display", "accessib", "usability"]) {
        RequirementCategory::Usability
    } else {
        RequirementCategory::Functional
    }
}

/// Guesses a priority from free text
pub fn estimate_priority(text: &str) -> Priority {
    let words = words(text);
    if has_word(&words, &["crash", "outage", "breach", "critical", "corrupt"]) {
        Priority::Critical
    } else if has_word(&words, &["secur", "fail", "error", "block", "urgent", "broken"]) {
        Priority::High
    } else if has_word(&words, &["minor", "cosmetic", "typo", "nice"]) {
        Priority::Low
    } else {
        Priority::Medium
    }
}

/// Drafts a new requirement from an item that matched nothing well
pub fn suggest_requirement(item: &UnlinkedItem) -> RequirementDraft {
    let text = format!("{} {}", item.title, item.description);
    let words: Vec<&str> = item.title.split_whitespace().collect();
    let mut title = words.iter().take(8).copied().collect::<Vec<_>>().join(" ");
    if words.len() > 8 {
        title.push_str("...");
    }
    let mut chars = title.chars();
    let title = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => format!("Requirement for {}", item.id),
    };

    let basis = if item.description.trim().is_empty() {
        item.title.trim()
    } else {
        item.description.trim()
    };

    RequirementDraft {
        draft_id: Uuid::new_v4(),
        title,
        description: format!("The system shall address {} {}: {}", item.kind, item.id, basis),
        category: classify(&text),
        priority: estimate_priority(&text),
        source_item: item.id.clone(),
    }
}

/// Per-item recommendation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationResult {
    pub item_id: String,
    pub recommendation: Option<Recommendation>,
}

/// Runs a recommender over a batch of items
pub fn recommend_batch(
    recommender: &dyn Recommender,
    items: &[UnlinkedItem],
    requirements: &[Requirement],
) -> Vec<RecommendationResult> {
    items
        .iter()
        .map(|item| RecommendationResult {
            item_id: item.id.clone(),
            recommendation: recommender.recommend(item, requirements),
        })
        .collect()
}

/// State transitions of the gap analysis
#[derive(Debug, Clone, PartialEq)]
pub enum GapAction {
    RecommendationsReady(Vec<RecommendationResult>),
    Accept(String),
    Reject(String),
    Linked(Vec<(String, LinkTarget)>),
    RequirementCreated { item_id: String, target: LinkTarget },
}

/// Link results, split by whether the item was already linked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub linked: Vec<String>,
    pub already_linked: Vec<String>,
}

/// What an action changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapOutcome {
    Updated { items: usize },
    Linked(LinkReport),
}

/// Counts for the gap-analysis header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapStats {
    pub total: usize,
    pub linked: usize,
    pub unlinked: usize,
    pub accepted: usize,
    pub needs_new_requirement: usize,
}

/// All unlinked items and their review state
#[derive(Debug, Clone)]
pub struct GapAnalysis {
    items: Vec<UnlinkedItem>,
    threshold: u8,
}

impl GapAnalysis {
    pub fn new(items: Vec<UnlinkedItem>, threshold: u8) -> Self {
        Self {
            items,
            threshold: threshold.min(100),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn items(&self) -> &[UnlinkedItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&UnlinkedItem> {
        self.items.iter().find(|i| i.id == id)
    }

    fn get_mut(&mut self, id: &str) -> RtmResult<&mut UnlinkedItem> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RtmError::ItemNotFound(id.to_string()))
    }

    /// Items still waiting for a link
    pub fn unlinked(&self) -> impl Iterator<Item = &UnlinkedItem> {
        self.items.iter().filter(|i| !i.is_linked())
    }

    /// Accepted, not yet linked items with their targets
    pub fn accepted_links(&self) -> Vec<(String, LinkTarget)> {
        self.unlinked()
            .filter(|i| i.accepted)
            .filter_map(|i| {
                let rec = i.recommendation.as_ref()?;
                Some((
                    i.id.clone(),
                    LinkTarget {
                        req_id: rec.req_id.clone(),
                        title: rec.req_title.clone(),
                        number: crate::requirement::trailing_number(&rec.req_id),
                    },
                ))
            })
            .collect()
    }

    /// Items to send to the recommender
    ///
    /// An empty id list selects every unlinked item. Linked items are never
    /// returned, unknown ids are an error.
    pub fn candidates(&self, ids: &[String]) -> RtmResult<Vec<UnlinkedItem>> {
        if ids.is_empty() {
            return Ok(self.unlinked().cloned().collect());
        }
        let mut out = Vec::new();
        for id in ids {
            let item = self
                .get(id)
                .ok_or_else(|| RtmError::ItemNotFound(id.clone()))?;
            if !item.is_linked() {
                out.push(item.clone());
            }
        }
        Ok(out)
    }

    pub fn stats(&self) -> GapStats {
        let linked = self.items.iter().filter(|i| i.is_linked()).count();
        GapStats {
            total: self.items.len(),
            linked,
            unlinked: self.items.len() - linked,
            accepted: self.unlinked().filter(|i| i.accepted).count(),
            needs_new_requirement: self.unlinked().filter(|i| i.draft.is_some()).count(),
        }
    }

    /// Applies one state transition
    pub fn apply(&mut self, action: GapAction) -> RtmResult<GapOutcome> {
        match action {
            GapAction::RecommendationsReady(results) => {
                let threshold = self.threshold;
                let mut updated = 0;
                for result in results {
                    let Some(item) = self.items.iter_mut().find(|i| i.id == result.item_id) else {
                        log::warn!("recommendation for unknown item {}", result.item_id);
                        continue;
                    };
                    if item.is_linked() {
                        continue;
                    }
                    let strong = result
                        .recommendation
                        .as_ref()
                        .map(|r| r.score >= threshold)
                        .unwrap_or(false);
                    item.recommendation = result.recommendation;
                    item.accepted = strong;
                    item.draft = if strong {
                        None
                    } else {
                        Some(suggest_requirement(item))
                    };
                    updated += 1;
                }
                Ok(GapOutcome::Updated { items: updated })
            }
            GapAction::Accept(id) => {
                let item = self.get_mut(&id)?;
                if item.recommendation.is_none() {
                    return Err(RtmError::NoRecommendation(id));
                }
                item.accepted = true;
                Ok(GapOutcome::Updated { items: 1 })
            }
            GapAction::Reject(id) => {
                let item = self.get_mut(&id)?;
                item.recommendation = None;
                item.accepted = false;
                Ok(GapOutcome::Updated { items: 1 })
            }
            GapAction::Linked(pairs) => {
                if let Some((missing, _)) = pairs.iter().find(|(id, _)| self.get(id).is_none()) {
                    return Err(RtmError::ItemNotFound(missing.clone()));
                }
                let mut report = LinkReport::default();
                for (id, target) in pairs {
                    let item = self.get_mut(&id)?;
                    if item.is_linked() {
                        report.already_linked.push(id);
                    } else {
                        item.linked_to = Some(target);
                        item.accepted = false;
                        report.linked.push(id);
                    }
                }
                Ok(GapOutcome::Linked(report))
            }
            GapAction::RequirementCreated { item_id, target } => {
                let item = self.get_mut(&item_id)?;
                if item.is_linked() {
                    return Ok(GapOutcome::Linked(LinkReport {
                        linked: Vec::new(),
                        already_linked: vec![item_id],
                    }));
                }
                item.linked_to = Some(target);
                item.draft = None;
                item.accepted = false;
                Ok(GapOutcome::Linked(LinkReport {
                    linked: vec![item_id],
                    already_linked: Vec::new(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Requirement> {
        let mut reset = Requirement::new("REQ-003", "Password reset via email");
        reset.description = "Users can reset a forgotten password".into();
        let export = Requirement::new("REQ-005", "Export monthly statements");
        vec![reset, export]
    }

    fn items() -> Vec<UnlinkedItem> {
        vec![
            UnlinkedItem::new("TC-101", ItemKind::TestCase, "Password reset email arrives"),
            UnlinkedItem::new("ISS-7", ItemKind::Issue, "Dashboard crashes on resize")
                .with_description("Layout breaks and the app crashes"),
            UnlinkedItem::new("T-9", ItemKind::Task, "Tune search latency"),
        ]
    }

    fn rec(req_id: &str, score: u8) -> Option<Recommendation> {
        Some(Recommendation {
            req_id: req_id.into(),
            req_title: format!("Title of {}", req_id),
            score,
        })
    }

    #[test]
    fn test_keyword_score_full_overlap() {
        let item = UnlinkedItem::new("X", ItemKind::Task, "Password reset email");
        let score = KeywordRecommender.score(&item, &catalog()[0]);
        assert_eq!(score, 100);
    }

    #[test]
    fn test_keyword_recommender_picks_best() {
        let rec = KeywordRecommender
            .recommend(&items()[0], &catalog())
            .unwrap();
        assert_eq!(rec.req_id, "REQ-003");
        assert!(rec.score >= DEFAULT_MATCH_THRESHOLD);
        assert!(rec.score <= 100);
    }

    #[test]
    fn test_keyword_recommender_without_requirements() {
        assert!(KeywordRecommender.recommend(&items()[0], &[]).is_none());
    }

    #[test]
    fn test_score_72_is_pre_accepted_and_reject_clears_it() {
        let mut gap = GapAnalysis::new(items(), DEFAULT_MATCH_THRESHOLD);
        gap.apply(GapAction::RecommendationsReady(vec![RecommendationResult {
            item_id: "TC-101".into(),
            recommendation: rec("REQ-003", 72),
        }]))
        .unwrap();

        let item = gap.get("TC-101").unwrap();
        assert!(item.accepted);
        assert_eq!(item.score(), Some(72));
        assert!(item.draft.is_none());

        gap.apply(GapAction::Reject("TC-101".into())).unwrap();
        let item = gap.get("TC-101").unwrap();
        assert!(item.recommendation.is_none());
        assert_eq!(item.score(), None);
        assert!(!item.accepted);
        assert!(gap.unlinked().any(|i| i.id == "TC-101"));
    }

    #[test]
    fn test_threshold_boundary() {
        let mut gap = GapAnalysis::new(items(), DEFAULT_MATCH_THRESHOLD);
        gap.apply(GapAction::RecommendationsReady(vec![
            RecommendationResult {
                item_id: "TC-101".into(),
                recommendation: rec("REQ-003", 50),
            },
            RecommendationResult {
                item_id: "ISS-7".into(),
                recommendation: rec("REQ-005", 49),
            },
        ]))
        .unwrap();
        assert!(gap.get("TC-101").unwrap().accepted);
        let weak = gap.get("ISS-7").unwrap();
        assert!(!weak.accepted);
        assert_eq!(weak.score(), Some(49));
        assert!(weak.draft.is_some());
    }

    #[test]
    fn test_weak_match_gets_draft() {
        let mut gap = GapAnalysis::new(items(), DEFAULT_MATCH_THRESHOLD);
        gap.apply(GapAction::RecommendationsReady(vec![RecommendationResult {
            item_id: "ISS-7".into(),
            recommendation: None,
        }]))
        .unwrap();
        let draft = gap.get("ISS-7").unwrap().draft.clone().unwrap();
        assert_eq!(draft.source_item, "ISS-7");
        assert_eq!(draft.priority, Priority::Critical);
        assert_eq!(draft.category, RequirementCategory::Usability);
        assert_eq!(draft.title, "Dashboard crashes on resize");
        assert_eq!(gap.stats().needs_new_requirement, 1);
    }

    #[test]
    fn test_classify_and_priority_heuristics() {
        assert_eq!(classify("Login token expires"), RequirementCategory::Security);
        assert_eq!(classify("Tune search latency"), RequirementCategory::Performance);
        assert_eq!(classify("GDPR retention rules"), RequirementCategory::Compliance);
        assert_eq!(classify("Add CSV export"), RequirementCategory::Functional);
        assert_eq!(estimate_priority("Minor typo in footer"), Priority::Low);
        assert_eq!(estimate_priority("Upload fails"), Priority::High);
        assert_eq!(estimate_priority("Add CSV export"), Priority::Medium);
    }

    #[test]
    fn test_accept_requires_recommendation() {
        let mut gap = GapAnalysis::new(items(), DEFAULT_MATCH_THRESHOLD);
        assert_eq!(
            gap.apply(GapAction::Accept("T-9".into())).unwrap_err(),
            RtmError::NoRecommendation("T-9".into())
        );
        assert_eq!(
            gap.apply(GapAction::Accept("nope".into())).unwrap_err(),
            RtmError::ItemNotFound("nope".into())
        );
    }

    #[test]
    fn test_link_is_idempotent_and_allows_many_to_one() {
        let mut gap = GapAnalysis::new(items(), DEFAULT_MATCH_THRESHOLD);
        let target = LinkTarget::from_requirement(&catalog()[0]);
        let outcome = gap
            .apply(GapAction::Linked(vec![
                ("TC-101".into(), target.clone()),
                ("T-9".into(), target.clone()),
            ]))
            .unwrap();
        assert_eq!(
            outcome,
            GapOutcome::Linked(LinkReport {
                linked: vec!["TC-101".into(), "T-9".into()],
                already_linked: Vec::new(),
            })
        );

        let again = gap
            .apply(GapAction::Linked(vec![("TC-101".into(), target)]))
            .unwrap();
        assert_eq!(
            again,
            GapOutcome::Linked(LinkReport {
                linked: Vec::new(),
                already_linked: vec!["TC-101".into()],
            })
        );
        assert_eq!(gap.stats().linked, 2);
        assert_eq!(gap.get("TC-101").unwrap().linked_to.as_ref().unwrap().number, Some(3));
    }

    #[test]
    fn test_linked_items_excluded_from_recommendation() {
        let mut gap = GapAnalysis::new(items(), DEFAULT_MATCH_THRESHOLD);
        let target = LinkTarget::from_requirement(&catalog()[0]);
        gap.apply(GapAction::Linked(vec![("TC-101".into(), target)]))
            .unwrap();

        let all = gap.candidates(&[]).unwrap();
        assert!(all.iter().all(|i| i.id != "TC-101"));
        let picked = gap.candidates(&["TC-101".into(), "T-9".into()]).unwrap();
        assert_eq!(picked.len(), 1);

        let outcome = gap
            .apply(GapAction::RecommendationsReady(vec![RecommendationResult {
                item_id: "TC-101".into(),
                recommendation: rec("REQ-005", 90),
            }]))
            .unwrap();
        assert_eq!(outcome, GapOutcome::Updated { items: 0 });
        assert!(gap.get("TC-101").unwrap().recommendation.is_none());
    }

    #[test]
    fn test_link_with_unknown_item_changes_nothing() {
        let mut gap = GapAnalysis::new(items(), DEFAULT_MATCH_THRESHOLD);
        let target = LinkTarget::from_requirement(&catalog()[0]);
        let err = gap
            .apply(GapAction::Linked(vec![
                ("TC-101".into(), target.clone()),
                ("ghost".into(), target),
            ]))
            .unwrap_err();
        assert_eq!(err, RtmError::ItemNotFound("ghost".into()));
        assert!(!gap.get("TC-101").unwrap().is_linked());
    }

    #[test]
    fn test_accepted_links_and_requirement_created() {
        let mut gap = GapAnalysis::new(items(), DEFAULT_MATCH_THRESHOLD);
        gap.apply(GapAction::RecommendationsReady(vec![
            RecommendationResult {
                item_id: "TC-101".into(),
                recommendation: rec("REQ-003", 80),
            },
            RecommendationResult {
                item_id: "T-9".into(),
                recommendation: rec("REQ-005", 10),
            },
        ]))
        .unwrap();
        let links = gap.accepted_links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, "TC-101");
        assert_eq!(links[0].1.number, Some(3));

        let target = LinkTarget {
            req_id: "REQ-020".into(),
            title: "Tune search latency".into(),
            number: Some(20),
        };
        gap.apply(GapAction::RequirementCreated {
            item_id: "T-9".into(),
            target,
        })
        .unwrap();
        let item = gap.get("T-9").unwrap();
        assert!(item.is_linked());
        assert!(item.draft.is_none());
    }

    #[test]
    fn test_recommend_batch_covers_every_item() {
        let results = recommend_batch(&KeywordRecommender, &items(), &catalog());
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.recommendation.is_some()));
    }
}
