use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use feedrank::algorithms::ranker::{rank_by_popularity, FeedRanker};
use feedrank::algorithms::similarity::{
    embedding_similarity, fallback_similarity, ContentSimilarityScorer,
};
use feedrank::algorithms::{NeutralLocation, RankingWeights};
use feedrank::config::Config;
use feedrank::services::embedding::DisabledEmbeddingClient;
use feedrank::services::profile::aggregate_profile;
use feedrank::*;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

const CUISINES: [&str; 6] = ["indian", "thai", "italian", "mexican", "korean", "greek"];

fn random_candidates(n: usize) -> Vec<Candidate> {
    let mut rng = rand::thread_rng();
    let now = Utc::now();
    (0..n)
        .map(|i| {
            let views = rng.gen_range(0..10_000);
            Candidate::new(Uuid::new_v4(), Uuid::new_v4(), format!("Recipe {i}"))
                .with_tags(vec![CUISINES[rng.gen_range(0..CUISINES.len())].to_string()])
                .with_duration(rng.gen_range(10.0..900.0))
                .with_engagement(views, rng.gen_range(0..=views), rng.gen_range(0..50))
                .created(now - Duration::hours(rng.gen_range(0..1000)))
        })
        .collect()
}

fn random_history(user: Uuid, n: usize) -> Vec<InteractionEvent> {
    let mut rng = rand::thread_rng();
    let now = Utc::now();
    let creators: Vec<Uuid> = (0..20).map(|_| Uuid::new_v4()).collect();
    let kinds = [
        InteractionType::View,
        InteractionType::Like,
        InteractionType::Share,
        InteractionType::Order,
    ];
    (0..n)
        .map(|_| {
            InteractionEvent::new(user, Uuid::new_v4(), kinds[rng.gen_range(0..kinds.len())])
                .with_creator(creators[rng.gen_range(0..creators.len())])
                .with_tags(vec![CUISINES[rng.gen_range(0..CUISINES.len())].to_string()])
                .with_watch_time(rng.gen_range(5.0..300.0))
                .at(now - Duration::minutes(rng.gen_range(0..100_000)))
        })
        .collect()
}

fn benchmark_feed_ranking(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let profile = UserProfile::empty(Uuid::new_v4(), 2)
        .with_cuisines(vec!["indian".to_string(), "thai".to_string()])
        .with_avg_watch_time(120.0);
    let candidates = random_candidates(100);
    let weights = RankingWeights::default();
    let ranker = FeedRanker::new(
        ContentSimilarityScorer::new(
            Arc::new(DisabledEmbeddingClient),
            std::time::Duration::from_secs(2),
        ),
        Arc::new(NeutralLocation),
        num_cpus::get() * 4,
    );

    c.bench_function("rank_100_candidates", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                ranker
                    .rank(&profile, candidates.clone(), &weights, 20, Utc::now())
                    .await,
            );
        });
    });

    c.bench_function("trending_100_candidates", |b| {
        b.iter(|| black_box(rank_by_popularity(candidates.clone(), 10, Utc::now())));
    });
}

fn benchmark_profile_aggregation(c: &mut Criterion) {
    let user = Uuid::new_v4();
    let events = random_history(user, 1000);
    let config = Config::default().profile;

    c.bench_function("aggregate_profile_1000_events", |b| {
        b.iter(|| black_box(aggregate_profile(user, &events, &[], &config, Utc::now())));
    });
}

fn benchmark_similarity(c: &mut Criterion) {
    let profile = UserProfile::empty(Uuid::new_v4(), 2)
        .with_cuisines(CUISINES.iter().map(|c| c.to_string()).collect());
    let candidate = random_candidates(1).remove(0);
    let a: Vec<f32> = (0..1536).map(|i| (i as f32).sin()).collect();
    let b_vec: Vec<f32> = (0..1536).map(|i| (i as f32).cos()).collect();

    c.bench_function("fallback_similarity", |b| {
        b.iter(|| black_box(fallback_similarity(&profile, &candidate)));
    });

    c.bench_function("embedding_similarity_1536", |b| {
        b.iter(|| black_box(embedding_similarity(&a, &b_vec)));
    });
}

criterion_group!(
    benches,
    benchmark_feed_ranking,
    benchmark_profile_aggregation,
    benchmark_similarity
);
criterion_main!(benches);
