//! Picks the content a finished quiz recommends.

use async_trait::async_trait;
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use super::{Approach, ContentId, DurationRange, Goal, MeditationObject, PracticeType, QuizState};
use crate::error::{CatalogError, MatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Audio,
}

impl ContentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Video => "video",
            ContentKind::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentCandidate {
    pub id: ContentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Seconds.
    pub duration: u32,
    pub kind: ContentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RuleRow {
    pub priority: i32,
    pub content_id: ContentId,
}

/// Which rule rows a query selects. Unset fields don't constrain the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFilter {
    pub practice_type: PracticeType,
    pub goal: Option<Goal>,
    pub approach: Option<Approach>,
    pub duration: Option<DurationRange>,
}

impl RuleFilter {
    pub fn strict(practice_type: PracticeType, state: &QuizState) -> Self {
        Self {
            practice_type,
            goal: state.goal,
            approach: state.approach,
            duration: state.duration,
        }
    }

    pub fn relaxed(practice_type: PracticeType) -> Self {
        Self {
            practice_type,
            goal: None,
            approach: None,
            duration: None,
        }
    }
}

/// Read access to recommendable content.
///
/// `query_rules` returns rows ordered by priority, highest first. An empty
/// result is not an error; errors mean the catalog couldn't be searched.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    async fn query_rules(&self, filter: &RuleFilter, limit: usize) -> Result<Vec<RuleRow>, CatalogError>;

    async fn get_content(&self, id: &str) -> Result<ContentCandidate, CatalogError>;
}

/// Row limits of the two query passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    pub exact_limit: usize,
    pub fallback_limit: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            exact_limit: 10,
            fallback_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerPractice {
    /// Seconds.
    pub duration: u32,
    pub object: MeditationObject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recommendation {
    Timer(TimerPractice),
    Content(ContentCandidate),
}

/// Self-guided meditation skips the catalog and goes straight to a timer.
pub fn self_guided(state: &QuizState) -> Option<TimerPractice> {
    match (state.practice_type, state.approach, state.self_meditation_settings) {
        (Some(PracticeType::Meditation), Some(Approach::SelfGuided), Some(settings)) => {
            Some(TimerPractice {
                duration: settings.duration,
                object: settings.object,
            })
        }
        _ => None,
    }
}

/// Keeps the rows sharing the highest priority and picks one of them at random,
/// so equally good content takes turns.
pub fn pick_top_priority<'a, R: Rng + ?Sized>(rows: &'a [RuleRow], rng: &mut R) -> Option<&'a RuleRow> {
    let top = rows.iter().map(|row| row.priority).max()?;
    let best = rows
        .iter()
        .filter(|row| row.priority == top)
        .collect::<Vec<_>>();
    best.choose(rng).copied()
}

pub struct Matcher<C> {
    catalog: C,
    policy: MatchPolicy,
}

impl<C: ContentCatalog> Matcher<C> {
    pub fn new(catalog: C, policy: MatchPolicy) -> Self {
        Self { catalog, policy }
    }

    #[cfg(test)]
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub async fn recommend<R: Rng + Send>(
        &self,
        state: &QuizState,
        rng: &mut R,
    ) -> Result<Recommendation, MatchError> {
        if let Some(practice) = self_guided(state) {
            debug!("Self-guided meditation, starting a timer instead of searching");
            return Ok(Recommendation::Timer(practice));
        }
        let practice_type = state.practice_type.ok_or(MatchError::Incomplete)?;

        let strict = RuleFilter::strict(practice_type, state);
        let mut rows = self.query(&strict, self.policy.exact_limit).await?;
        if rows.is_empty() {
            debug!("No exact rule for {:?}, relaxing to practice type only", strict);
            rows = self
                .query(&RuleFilter::relaxed(practice_type), self.policy.fallback_limit)
                .await?;
        }

        let content_id = match pick_top_priority(&rows, rng) {
            Some(row) => row.content_id.clone(),
            None => return Err(MatchError::NoMatch),
        };
        debug!("Recommending content {}", content_id);

        let content = self.catalog.get_content(&content_id).await.map_err(|e| {
            warn!("Failed to fetch content {}: {}", content_id, e);
            MatchError::Transport(e)
        })?;
        Ok(Recommendation::Content(content))
    }

    async fn query(&self, filter: &RuleFilter, limit: usize) -> Result<Vec<RuleRow>, MatchError> {
        let rows = self.catalog.query_rules(filter, limit).await.map_err(|e| {
            warn!("Catalog query failed: {}", e);
            MatchError::Transport(e)
        })?;
        debug!("{} rule rows for {:?}", rows.len(), filter);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::quiz::catalog::{CatalogRule, JsonCatalog};
    use crate::quiz::SelfMeditationSettings;

    fn content(id: &str) -> ContentCandidate {
        ContentCandidate {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            thumbnail: None,
            duration: 600,
            kind: ContentKind::Video,
        }
    }

    fn rule(content_id: &str, practice_type: PracticeType, priority: i32) -> CatalogRule {
        CatalogRule {
            content_id: content_id.to_string(),
            practice_type,
            goal: None,
            approach: None,
            duration_min: None,
            duration_max: None,
            priority,
        }
    }

    /// Counts how often the catalog is touched.
    struct CountingCatalog {
        inner: JsonCatalog,
        calls: AtomicUsize,
    }

    impl CountingCatalog {
        fn new(inner: JsonCatalog) -> Self {
            Self {
                inner,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentCatalog for CountingCatalog {
        async fn query_rules(&self, filter: &RuleFilter, limit: usize) -> Result<Vec<RuleRow>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.query_rules(filter, limit).await
        }

        async fn get_content(&self, id: &str) -> Result<ContentCandidate, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_content(id).await
        }
    }

    struct UnreachableCatalog;

    fn refused() -> CatalogError {
        CatalogError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
    }

    #[async_trait]
    impl ContentCatalog for UnreachableCatalog {
        async fn query_rules(&self, _: &RuleFilter, _: usize) -> Result<Vec<RuleRow>, CatalogError> {
            Err(refused())
        }

        async fn get_content(&self, _: &str) -> Result<ContentCandidate, CatalogError> {
            Err(refused())
        }
    }

    fn physical_energize() -> QuizState {
        QuizState {
            practice_type: Some(PracticeType::Physical),
            duration: Some(DurationRange::new(0, 420)),
            goal: Some(Goal::Energize),
            step: 3,
            max_step: 3,
            ..QuizState::default()
        }
    }

    #[test]
    fn tie_break_only_considers_top_priority() {
        let rows = vec![
            RuleRow { priority: 1, content_id: "low".to_string() },
            RuleRow { priority: 7, content_id: "a".to_string() },
            RuleRow { priority: 7, content_id: "b".to_string() },
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(pick_top_priority(&rows, &mut rng).unwrap().content_id.clone());
        }
        assert_eq!(seen, HashSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn tie_break_on_empty_rows() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pick_top_priority(&[], &mut rng).is_none());
    }

    #[tokio::test]
    async fn equal_priorities_are_spread_across_calls() {
        let mut first = rule("first", PracticeType::Breathing, 3);
        first.goal = Some(Goal::Sleep);
        let mut second = rule("second", PracticeType::Breathing, 3);
        second.goal = Some(Goal::Sleep);
        let catalog = JsonCatalog::new(vec![content("first"), content("second")], vec![first, second]);
        let matcher = Matcher::new(catalog, MatchPolicy::default());

        let state = QuizState {
            practice_type: Some(PracticeType::Breathing),
            goal: Some(Goal::Sleep),
            step: 2,
            max_step: 2,
            ..QuizState::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = HashSet::new();
        for _ in 0..100 {
            match matcher.recommend(&state, &mut rng).await.unwrap() {
                Recommendation::Content(content) => {
                    seen.insert(content.id);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn no_rows_at_all_is_no_match() {
        let catalog = JsonCatalog::new(
            vec![content("calm-breath")],
            vec![rule("calm-breath", PracticeType::Breathing, 1)],
        );
        let matcher = Matcher::new(catalog, MatchPolicy::default());
        let mut rng = StdRng::seed_from_u64(0);

        let result = matcher.recommend(&physical_energize(), &mut rng).await;
        assert!(matches!(result, Err(MatchError::NoMatch)));
    }

    #[tokio::test]
    async fn self_guided_meditation_never_touches_the_catalog() {
        let catalog = CountingCatalog::new(JsonCatalog::default());
        let matcher = Matcher::new(catalog, MatchPolicy::default());
        let state = QuizState {
            practice_type: Some(PracticeType::Meditation),
            approach: Some(Approach::SelfGuided),
            duration: Some(DurationRange::exact(600)),
            self_meditation_settings: Some(SelfMeditationSettings {
                duration: 600,
                object: MeditationObject::Breath,
            }),
            step: 4,
            max_step: 4,
            ..QuizState::default()
        };
        let mut rng = StdRng::seed_from_u64(0);

        let result = matcher.recommend(&state, &mut rng).await.unwrap();
        assert_eq!(
            result,
            Recommendation::Timer(TimerPractice {
                duration: 600,
                object: MeditationObject::Breath,
            })
        );
        assert_eq!(matcher.catalog().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exact_match_beats_fallback() {
        let mut exact = rule("morning-flow", PracticeType::Physical, 5);
        exact.goal = Some(Goal::Energize);
        exact.duration_min = Some(300);
        exact.duration_max = Some(600);
        // outranks the exact row, but only the relaxed pass can see it
        let fallback = rule("gentle-stretch", PracticeType::Physical, 9);
        let catalog = JsonCatalog::new(
            vec![content("morning-flow"), content("gentle-stretch")],
            vec![fallback, exact],
        );
        let matcher = Matcher::new(catalog, MatchPolicy::default());
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..20 {
            let result = matcher.recommend(&physical_energize(), &mut rng).await.unwrap();
            assert_eq!(result, Recommendation::Content(content("morning-flow")));
        }
    }

    #[tokio::test]
    async fn falls_back_to_practice_type_only() {
        let mut other_goal = rule("deep-stretch", PracticeType::Physical, 4);
        other_goal.goal = Some(Goal::Flexibility);
        let catalog = JsonCatalog::new(vec![content("deep-stretch")], vec![other_goal]);
        let matcher = Matcher::new(catalog, MatchPolicy::default());
        let mut rng = StdRng::seed_from_u64(3);

        let result = matcher.recommend(&physical_energize(), &mut rng).await.unwrap();
        assert_eq!(result, Recommendation::Content(content("deep-stretch")));
    }

    #[tokio::test]
    async fn fallback_respects_its_limit() {
        // three equally good rows, but the fallback pass only returns the first two
        let rows = vec![
            rule("a", PracticeType::Short, 3),
            rule("b", PracticeType::Short, 3),
            rule("c", PracticeType::Short, 3),
        ];
        let catalog = JsonCatalog::new(vec![content("a"), content("b"), content("c")], rows);
        let policy = MatchPolicy {
            exact_limit: 10,
            fallback_limit: 2,
        };
        let matcher = Matcher::new(catalog, policy);
        let state = QuizState {
            practice_type: Some(PracticeType::Short),
            goal: Some(Goal::Focus),
            step: 2,
            max_step: 2,
            ..QuizState::default()
        };
        let mut rng = StdRng::seed_from_u64(11);

        let mut seen = HashSet::new();
        for _ in 0..100 {
            if let Recommendation::Content(content) = matcher.recommend(&state, &mut rng).await.unwrap() {
                seen.insert(content.id);
            }
        }
        assert!(!seen.contains("c"));
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn transport_errors_are_not_no_match() {
        let matcher = Matcher::new(UnreachableCatalog, MatchPolicy::default());
        let mut rng = StdRng::seed_from_u64(0);

        let result = matcher.recommend(&physical_energize(), &mut rng).await;
        assert!(matches!(result, Err(MatchError::Transport(CatalogError::Io(_)))));
    }

    #[tokio::test]
    async fn missing_practice_type_is_incomplete() {
        let matcher = Matcher::new(JsonCatalog::default(), MatchPolicy::default());
        let mut rng = StdRng::seed_from_u64(0);

        let result = matcher.recommend(&QuizState::default(), &mut rng).await;
        assert!(matches!(result, Err(MatchError::Incomplete)));
    }

    #[tokio::test]
    async fn dangling_rule_is_a_transport_error() {
        let catalog = JsonCatalog::new(vec![], vec![rule("gone", PracticeType::Physical, 1)]);
        let matcher = Matcher::new(catalog, MatchPolicy::default());
        let mut rng = StdRng::seed_from_u64(0);

        let result = matcher.recommend(&physical_energize(), &mut rng).await;
        assert!(matches!(
            result,
            Err(MatchError::Transport(CatalogError::MissingContent(_)))
        ));
    }
}
