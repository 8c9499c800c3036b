use super::*;
use crate::mapping::TimeSettings;
use crate::matchers::{MatchContext, MatcherError, RequestMatcher, RequestMessageMatcher};
use crate::random::{SeededRandom, SequenceRandom};
use chrono::Duration;
use tracing_test::traced_test;

/// Matcher with a fixed score.
#[derive(Debug)]
struct Scored(f64);

impl RequestMessageMatcher for Scored {
    fn name(&self) -> &'static str {
        "scored"
    }

    fn matching_score(
        &self,
        _request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        Ok(self.0)
    }
}

#[derive(Debug)]
struct Failing;

impl RequestMessageMatcher for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn matching_score(
        &self,
        _request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        Err(MatcherError::Failed {
            matcher: "failing".into(),
            message: "boom".into(),
        })
    }
}

#[derive(Debug)]
struct Exploding;

impl RequestMessageMatcher for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    fn matching_score(
        &self,
        _request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        panic!("exploding matcher")
    }
}

fn scored(score: f64) -> crate::mapping::MappingBuilder {
    Mapping::builder(RequestMatcher::new().with_custom(Arc::new(Scored(score))))
}

struct Fixture {
    registry: Arc<MappingRegistry>,
    scenarios: Arc<ScenarioStore>,
}

impl Fixture {
    fn new(mappings: Vec<Mapping>) -> Self {
        let registry = Arc::new(MappingRegistry::new());
        for mapping in mappings {
            registry.upsert(mapping).unwrap();
        }
        Self {
            registry,
            scenarios: Arc::new(ScenarioStore::new()),
        }
    }

    fn selector(&self, allow_partial_mapping: bool) -> MappingSelector {
        let settings = MatchingConfig {
            allow_partial_mapping,
            ..Default::default()
        };
        MappingSelector::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.scenarios),
            settings,
        )
    }
}

fn request() -> RequestMessage {
    RequestMessage::new("GET", "/api/items")
}

fn id_of(m: &Option<MappingMatch>) -> Option<uuid::Uuid> {
    m.as_ref().map(|m| m.mapping.id)
}

#[test]
fn test_strict_mode_prefers_lower_priority() {
    let low = scored(1.0).priority(2).build();
    let high = scored(1.0).priority(1).build();
    let high_id = high.id;
    let fixture = Fixture::new(vec![low, high]);

    let resolution = fixture.selector(false).resolve(&request());
    assert_eq!(id_of(&resolution.matched), Some(high_id));
}

#[test]
fn test_permissive_mode_prefers_quality() {
    let better = scored(0.8).priority(5).build();
    let worse = scored(0.5).priority(1).build();
    let better_id = better.id;
    let fixture = Fixture::new(vec![worse, better]);

    let resolution = fixture.selector(true).resolve(&request());
    assert_eq!(id_of(&resolution.matched), Some(better_id));
    assert_eq!(id_of(&resolution.partial), Some(better_id));
}

#[test]
fn test_probability_gating() {
    let never = scored(1.0).probability(0.0).priority(0).build();
    let always = scored(1.0).probability(1.0).priority(1).build();
    let never_id = never.id;
    let always_id = always.id;
    let fixture = Fixture::new(vec![never, always]);
    let selector = fixture
        .selector(false)
        .with_random(Arc::new(SeededRandom::new(7)));

    for _ in 0..200 {
        let resolution = selector.resolve(&request());
        assert_eq!(id_of(&resolution.matched), Some(always_id));
        assert_ne!(id_of(&resolution.partial), Some(never_id));
    }
}

#[test]
fn test_probability_draw_is_inclusive() {
    let half = scored(1.0).probability(0.5).build();
    let half_id = half.id;
    let fixture = Fixture::new(vec![half]);
    let selector = fixture
        .selector(false)
        .with_random(Arc::new(SequenceRandom::new(vec![0.5, 0.51])));

    assert_eq!(id_of(&selector.resolve(&request()).matched), Some(half_id));
    assert_eq!(id_of(&selector.resolve(&request()).matched), None);
}

#[test]
fn test_expired_mapping_never_selected() {
    let now = Utc::now();
    let expired = scored(1.0)
        .time_settings(TimeSettings {
            end: Some(now - Duration::seconds(1)),
            ..Default::default()
        })
        .build();
    let not_started = scored(1.0)
        .time_settings(TimeSettings {
            start: Some(now + Duration::hours(1)),
            ..Default::default()
        })
        .build();
    let fixture = Fixture::new(vec![expired, not_started]);

    for allow_partial in [false, true] {
        let resolution = fixture.selector(allow_partial).resolve_at(&request(), now);
        assert!(resolution.matched.is_none());
        assert!(resolution.partial.is_none());
    }
}

#[test]
fn test_unbounded_ttl_does_not_break_resolution() {
    let forever = scored(0.5)
        .time_settings(TimeSettings {
            ttl: Some(Duration::MAX),
            ..Default::default()
        })
        .build();
    let healthy = scored(1.0).build();
    let forever_id = forever.id;
    let healthy_id = healthy.id;
    let fixture = Fixture::new(vec![forever, healthy]);

    let strict = fixture.selector(false).resolve(&request());
    assert_eq!(id_of(&strict.matched), Some(healthy_id));

    // Still eligible: it is the best partial candidate after the healthy one
    let candidates: Vec<MappingMatch> = fixture
        .registry
        .snapshot()
        .iter()
        .filter(|m| m.is_time_valid(Utc::now()))
        .map(|m| MappingMatch {
            mapping: Arc::clone(m),
            result: evaluator::evaluate(m, &request(), None).unwrap(),
        })
        .collect();
    let ranked = rank_partial(&candidates);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[1].mapping.id, forever_id);
}

#[test]
fn test_admin_mapping_partial_only_when_perfect() {
    let admin_partial = scored(0.9).admin_interface().build();
    let regular = scored(0.5).build();
    let regular_id = regular.id;
    let fixture = Fixture::new(vec![admin_partial, regular]);

    let resolution = fixture.selector(true).resolve(&request());
    assert_eq!(id_of(&resolution.partial), Some(regular_id));

    let admin_perfect = scored(1.0).admin_interface().build();
    let admin_id = admin_perfect.id;
    fixture.registry.upsert(admin_perfect).unwrap();

    let resolution = fixture.selector(true).resolve(&request());
    assert_eq!(id_of(&resolution.partial), Some(admin_id));
}

#[test]
fn test_failing_mapping_is_never_a_candidate() {
    let failing = Mapping::builder(
        RequestMatcher::new()
            .with_path("/api/items")
            .with_custom(Arc::new(Failing)),
    )
    .priority(-10)
    .build();
    let exploding = Mapping::builder(RequestMatcher::new().with_custom(Arc::new(Exploding)))
        .priority(-20)
        .build();
    let healthy = Mapping::builder(RequestMatcher::new().with_path("/api/items")).build();
    let healthy_id = healthy.id;
    let fixture = Fixture::new(vec![failing, exploding, healthy]);

    for allow_partial in [false, true] {
        let resolution = fixture.selector(allow_partial).resolve(&request());
        assert_eq!(id_of(&resolution.matched), Some(healthy_id));
        assert_eq!(id_of(&resolution.partial), Some(healthy_id));
    }
}

#[test]
fn test_matcher_errors_are_counted_by_kind() {
    use crate::metrics::MATCHER_ERRORS_TOTAL;

    let failing = Mapping::builder(RequestMatcher::new().with_custom(Arc::new(Failing))).build();
    let exploding = Mapping::builder(RequestMatcher::new().with_custom(Arc::new(Exploding))).build();
    let failing_id = failing.id;
    let fixture = Fixture::new(vec![failing, exploding]);

    let errors_before = MATCHER_ERRORS_TOTAL.with_label_values(&["matcher_error"]).get();
    let panics_before = MATCHER_ERRORS_TOTAL.with_label_values(&["panic"]).get();
    fixture.selector(false).resolve(&request());

    assert!(MATCHER_ERRORS_TOTAL.with_label_values(&["matcher_error"]).get() > errors_before);
    assert!(MATCHER_ERRORS_TOTAL.with_label_values(&["panic"]).get() > panics_before);
    assert!(!crate::metrics::collect_metrics().contains(&failing_id.to_string()));
}

#[test]
fn test_strict_no_match_keeps_partial() {
    let weak = scored(0.3).build();
    let weak_id = weak.id;
    let zero = scored(0.0).build();
    let fixture = Fixture::new(vec![weak, zero]);

    let resolution = fixture.selector(false).resolve(&request());
    assert!(resolution.matched.is_none());
    let partial = resolution.partial.unwrap();
    assert_eq!(partial.mapping.id, weak_id);
    assert_eq!(partial.result.average_score(), 0.3);
}

#[test]
fn test_resolution_is_idempotent() {
    let fixture = Fixture::new(vec![
        scored(1.0).priority(3).build(),
        scored(1.0).priority(3).build(),
        scored(0.7).build(),
        scored(0.4).probability(0.9).build(),
    ]);
    let selector = fixture.selector(false);
    let now = Utc::now();

    let first = selector.resolve_at(&request(), now);
    for _ in 0..20 {
        let again = selector.resolve_at(&request(), now);
        assert_eq!(id_of(&again.matched), id_of(&first.matched));
        assert_eq!(id_of(&again.partial), id_of(&first.partial));
    }
}

#[test]
fn test_empty_mapping_matches_strictly_but_is_never_partial() {
    let empty = Mapping::builder(RequestMatcher::new()).build();
    let empty_id = empty.id;
    let fixture = Fixture::new(vec![empty]);

    let strict = fixture.selector(false).resolve(&request());
    assert_eq!(id_of(&strict.matched), Some(empty_id));
    assert!(strict.partial.is_none());

    let permissive = fixture.selector(true).resolve(&request());
    assert!(permissive.matched.is_none());
}

#[test]
fn test_scenario_gating() {
    let entry = Mapping::builder(RequestMatcher::new().with_path("/api/items"))
        .in_scenario("cart")
        .will_set_state_to("Paid")
        .build();
    let paid = Mapping::builder(RequestMatcher::new().with_path("/api/items"))
        .in_scenario("cart")
        .when_state_is("Paid")
        .priority(-1)
        .build();
    let entry_id = entry.id;
    let paid_id = paid.id;
    let fixture = Fixture::new(vec![entry, paid]);
    let selector = fixture.selector(false);

    // Not entry: only the entry point matches, despite its worse priority
    assert_eq!(id_of(&selector.resolve(&request()).matched), Some(entry_id));

    fixture.scenarios.advance("cart", "Paid");
    assert_eq!(id_of(&selector.resolve(&request()).matched), Some(paid_id));

    fixture.scenarios.advance("cart", "Shipped");
    let resolution = selector.resolve(&request());
    assert!(resolution.matched.is_none());
    assert_eq!(resolution.partial.unwrap().result.average_score(), 0.5);
}

#[traced_test]
#[test]
fn test_matcher_errors_are_logged() {
    let fixture = Fixture::new(vec![
        Mapping::builder(RequestMatcher::new().with_custom(Arc::new(Failing))).build(),
    ]);
    fixture.selector(false).resolve(&request());
    assert!(logs_contain("Matcher failed"));
}

#[traced_test]
#[test]
fn test_admin_requests_do_not_log_matcher_errors() {
    let fixture = Fixture::new(vec![
        Mapping::builder(RequestMatcher::new().with_custom(Arc::new(Failing))).build(),
    ]);
    let resolution = fixture
        .selector(false)
        .resolve(&RequestMessage::new("GET", "/__ADMIN/mappings"));
    assert!(resolution.matched.is_none());
    assert!(!logs_contain("Matcher failed"));
}

// Pure ranking

fn candidate(mapping: Mapping, scores: &[f64]) -> MappingMatch {
    let mut result = MatchResult::new();
    for score in scores {
        result.add_score("scored", *score);
    }
    MappingMatch {
        mapping: Arc::new(mapping),
        result,
    }
}

fn ids(ranked: &[MappingMatch]) -> Vec<uuid::Uuid> {
    ranked.iter().map(|c| c.mapping.id).collect()
}

#[test]
fn test_rank_partial_tie_breaks() {
    let base = Utc::now();
    let fewer = candidate(scored(1.0).build(), &[0.5]);
    let more = candidate(scored(1.0).build(), &[0.5, 0.5]);
    assert_eq!(
        ids(&rank_partial(&[more.clone(), fewer.clone()])),
        vec![fewer.mapping.id, more.mapping.id]
    );

    let low_priority = candidate(scored(1.0).priority(1).build(), &[0.5]);
    let high_priority = candidate(scored(1.0).priority(-1).build(), &[0.5]);
    assert_eq!(
        ids(&rank_partial(&[low_priority.clone(), high_priority.clone()])),
        vec![high_priority.mapping.id, low_priority.mapping.id]
    );

    let undefined = candidate(scored(1.0).build(), &[0.5]);
    let unlikely = candidate(scored(1.0).probability(0.2).build(), &[0.5]);
    let likely = candidate(scored(1.0).probability(0.9).build(), &[0.5]);
    assert_eq!(
        ids(&rank_partial(&[undefined.clone(), unlikely.clone(), likely.clone()])),
        vec![likely.mapping.id, unlikely.mapping.id, undefined.mapping.id]
    );

    let older = candidate(scored(1.0).updated_at(base).build(), &[0.5]);
    let newer = candidate(
        scored(1.0).updated_at(base + Duration::seconds(5)).build(),
        &[0.5],
    );
    assert_eq!(
        ids(&rank_partial(&[older.clone(), newer.clone()])),
        vec![newer.mapping.id, older.mapping.id]
    );
}

#[test]
fn test_rank_partial_drops_zero_scores() {
    let zero = candidate(scored(0.0).build(), &[0.0, 0.0]);
    let some = candidate(scored(0.1).build(), &[0.1]);
    assert_eq!(ids(&rank_partial(&[zero, some.clone()])), vec![some.mapping.id]);
}

#[test]
fn test_rank_perfect_priority_before_quality() {
    let precise = candidate(scored(1.0).priority(5).build(), &[1.0, 1.0, 1.0]);
    let preferred = candidate(scored(1.0).priority(1).build(), &[1.0, 1.0, 1.0, 1.0]);
    let partial = candidate(scored(1.0).priority(-5).build(), &[1.0, 0.5]);
    assert_eq!(
        ids(&rank_perfect(&[precise.clone(), partial, preferred.clone()])),
        vec![preferred.mapping.id, precise.mapping.id]
    );
}

#[test]
fn test_ranking_is_stable() {
    let first = candidate(scored(1.0).updated_at(Utc::now()).build(), &[1.0]);
    let mut second_mapping = (*first.mapping).clone();
    second_mapping.id = uuid::Uuid::new_v4();
    let second = candidate(second_mapping, &[1.0]);

    assert_eq!(
        ids(&rank_perfect(&[first.clone(), second.clone()])),
        vec![first.mapping.id, second.mapping.id]
    );
    assert_eq!(
        ids(&rank_partial(&[second.clone(), first.clone()])),
        vec![second.mapping.id, first.mapping.id]
    );
}
