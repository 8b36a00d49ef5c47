use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use newsloom_core::config::TrendsConfig;
use newsloom_core::domain::Trend;
use storage::Repository;

#[derive(Debug, Clone)]
struct Candidate {
    article_id: i64,
    text: String,
    embedding: Vec<f32>,
    published_at: DateTime<Utc>,
}

/// Builds ranked trends for the given window (§4.7): fetch candidates, cluster with
/// DBSCAN over unit-normalized embeddings, keyword/label each cluster with
/// class-TF-IDF, compute momentum/burst/volume dynamics, score, and rank.
pub async fn build_trends(
    repo: &Repository,
    config: &TrendsConfig,
    limit: i64,
    top_n: usize,
) -> Result<Vec<Trend>, storage::StorageError> {
    let rows = repo.fetch_trend_candidates(config.window_hours, limit).await?;
    let candidates: Vec<Candidate> = rows
        .into_iter()
        .map(|(article_id, text, embedding, published_at)| Candidate {
            article_id,
            text,
            embedding,
            published_at,
        })
        .collect();

    if candidates.len() < config.min_samples {
        return Ok(Vec::new());
    }

    let normalized: Vec<Vec<f32>> = candidates.iter().map(|c| normalize(&c.embedding)).collect();
    let labels = dbscan(&normalized, config.eps, config.min_samples);

    let mut clusters: HashMap<i32, Vec<usize>> = HashMap::new();
    for (idx, label) in labels.iter().enumerate() {
        if *label >= 0 {
            clusters.entry(*label).or_default().push(idx);
        }
    }

    let all_docs: Vec<HashSet<String>> = candidates.iter().map(|c| tokenize(&c.text)).collect();

    let mut trends: Vec<Trend> = clusters
        .iter()
        .map(|(cluster_id, member_indices)| {
            let keywords = class_tf_idf_keywords(member_indices, &all_docs, config.keyword_count);
            let members: Vec<&Candidate> = member_indices.iter().map(|&i| &candidates[i]).collect();
            let (momentum, burst_intensity, volume) =
                compute_dynamics(&members, config.window_hours);
            Trend {
                cluster_id: *cluster_id as usize,
                size: members.len(),
                keywords,
                momentum,
                burst_intensity,
                score: 0.0,
                sample_article_ids: members.iter().take(5).map(|c| c.article_id).collect(),
                extra: HashMap::from([("volume".to_string(), volume.to_string())]),
            }
        })
        .collect();

    score_and_rank(&mut trends);
    trends.truncate(top_n);
    Ok(trends)
}

fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    1.0 - dot.clamp(-1.0, 1.0)
}

/// DBSCAN over unit-normalized embeddings with cosine distance (§4.7 step 2). No
/// clustering crate appears anywhere in the retrieved corpus, so this is hand-rolled
/// with the textbook region-query/expand-cluster structure; noise stays labeled -1.
fn dbscan(points: &[Vec<f32>], eps: f32, min_samples: usize) -> Vec<i32> {
    let n = points.len();
    let mut labels = vec![-2i32; n]; // -2 = unvisited, -1 = noise, >=0 = cluster id
    let mut next_cluster = 0i32;

    let region_query = |idx: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| j != idx && cosine_distance(&points[idx], &points[j]) <= eps)
            .collect()
    };

    for i in 0..n {
        if labels[i] != -2 {
            continue;
        }
        let neighbors = region_query(i);
        if neighbors.len() + 1 < min_samples {
            labels[i] = -1;
            continue;
        }

        labels[i] = next_cluster;
        let mut seed_set = neighbors;
        let mut cursor = 0;
        while cursor < seed_set.len() {
            let q = seed_set[cursor];
            cursor += 1;
            if labels[q] == -1 {
                labels[q] = next_cluster;
            }
            if labels[q] != -2 {
                continue;
            }
            labels[q] = next_cluster;
            let q_neighbors = region_query(q);
            if q_neighbors.len() + 1 >= min_samples {
                for neighbor in q_neighbors {
                    if !seed_set.contains(&neighbor) {
                        seed_set.push(neighbor);
                    }
                }
            }
        }
        next_cluster += 1;
    }

    labels
}

/// Splits on non-alphanumeric boundaries, then adds adjacent-word bigrams. Grounded
/// on the corpus's own simple tokenizer shape (splitting on non-alphanumerics and
/// adding bigrams for scripts without whitespace word boundaries); extended here with
/// unigram+bigram keyword candidates for class-TF-IDF per §4.7.
fn tokenize(text: &str) -> HashSet<String> {
    let mut unigrams = Vec::new();
    let mut buf = String::new();
    for ch in text.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_alphanumeric() {
            buf.push(ch);
        } else if !buf.is_empty() {
            unigrams.push(std::mem::take(&mut buf));
        }
    }
    if !buf.is_empty() {
        unigrams.push(buf);
    }

    let mut tokens: HashSet<String> = unigrams.iter().cloned().collect();
    for window in unigrams.windows(2) {
        tokens.insert(format!("{} {}", window[0], window[1]));
    }
    tokens
}

/// Class-TF-IDF (§4.7 step 3): term frequency within the cluster's combined text,
/// weighted down by how broadly the term appears across the rest of the corpus.
fn class_tf_idf_keywords(
    member_indices: &[usize],
    all_docs: &[HashSet<String>],
    keyword_count: usize,
) -> Vec<String> {
    let mut term_freq: HashMap<String, usize> = HashMap::new();
    for &idx in member_indices {
        for term in &all_docs[idx] {
            *term_freq.entry(term.clone()).or_insert(0) += 1;
        }
    }

    let total_docs = all_docs.len().max(1);
    let mut scored: Vec<(String, f32)> = term_freq
        .into_iter()
        .map(|(term, class_count)| {
            let doc_freq = all_docs.iter().filter(|doc| doc.contains(&term)).count();
            let idf = ((total_docs as f32) / (1.0 + doc_freq as f32)).ln() + 1.0;
            (term, class_count as f32 * idf)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(keyword_count).map(|(t, _)| t).collect()
}

/// Bins cluster members into hourly buckets and computes momentum, burst intensity,
/// and raw volume (§4.7 step 4). `momentum` compares the last quarter of the window to
/// the first quarter; `burst_intensity` is peak-bucket-count over mean-bucket-count.
fn compute_dynamics(members: &[&Candidate], window_hours: i64) -> (f32, f32, usize) {
    let window_hours = window_hours.max(1) as usize;
    let mut buckets = vec![0usize; window_hours];
    let now = Utc::now();

    for candidate in members {
        let age_hours = (now - candidate.published_at).num_hours().max(0) as usize;
        if age_hours < window_hours {
            let bucket = window_hours - 1 - age_hours;
            buckets[bucket] += 1;
        }
    }

    let quarter = (window_hours / 4).max(1);
    let first_quarter: usize = buckets[..quarter].iter().sum();
    let last_quarter: usize = buckets[window_hours.saturating_sub(quarter)..].iter().sum();
    let momentum = (last_quarter as f32 - first_quarter as f32) / (first_quarter.max(1) as f32);

    let peak = *buckets.iter().max().unwrap_or(&0) as f32;
    let mean = buckets.iter().sum::<usize>() as f32 / window_hours as f32;
    let burst_intensity = if mean > 0.0 { peak / mean } else { 0.0 };

    (momentum, burst_intensity, members.len())
}

/// Normalizes burst/momentum/volume across the clusters in this call to [0, 1] and
/// combines them per §4.7 step 5, then sorts descending by score (step 6).
fn score_and_rank(trends: &mut [Trend]) {
    if trends.is_empty() {
        return;
    }

    let burst_max = trends.iter().map(|t| t.burst_intensity).fold(0.0f32, f32::max);
    let momentum_max = trends.iter().map(|t| t.momentum).fold(0.0f32, f32::max);
    let volume_max = trends.iter().map(|t| t.size).max().unwrap_or(1) as f32;

    for trend in trends.iter_mut() {
        let burst_norm = if burst_max > 0.0 {
            trend.burst_intensity / burst_max
        } else {
            0.0
        };
        let momentum_norm = if momentum_max > 0.0 {
            (trend.momentum / momentum_max).max(0.0)
        } else {
            0.0
        };
        let volume_norm = if volume_max > 0.0 {
            trend.size as f32 / volume_max
        } else {
            0.0
        };
        trend.score = 0.5 * burst_norm + 0.3 * momentum_norm + 0.2 * volume_norm;
    }

    trends.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, text: &str, embedding: Vec<f32>, hours_ago: i64) -> Candidate {
        Candidate {
            article_id: id,
            text: text.to_string(),
            embedding,
            published_at: Utc::now() - chrono::Duration::hours(hours_ago),
        }
    }

    #[test]
    fn dbscan_groups_nearby_points_and_labels_outlier_as_noise() {
        let points: Vec<Vec<f32>> = vec![
            normalize(&[1.0, 0.0, 0.0]),
            normalize(&[0.99, 0.01, 0.0]),
            normalize(&[0.98, 0.02, 0.0]),
            normalize(&[0.97, 0.03, 0.0]),
            normalize(&[0.96, 0.04, 0.0]),
            normalize(&[0.0, 0.0, 1.0]),
        ];
        let labels = dbscan(&points, 0.05, 5);
        assert!(labels[..5].iter().all(|&l| l == 0));
        assert_eq!(labels[5], -1);
    }

    #[test]
    fn tokenize_extracts_unigrams_and_bigrams() {
        let tokens = tokenize("electric vehicles");
        assert!(tokens.contains("electric"));
        assert!(tokens.contains("vehicles"));
        assert!(tokens.contains("electric vehicles"));
    }

    #[test]
    fn class_tf_idf_prefers_cluster_specific_terms() {
        let docs = vec![
            tokenize("battery recycling policy"),
            tokenize("battery recycling policy"),
            tokenize("sports match result"),
        ];
        let keywords = class_tf_idf_keywords(&[0, 1], &docs, 3);
        assert!(keywords.contains(&"battery".to_string()));
        assert!(!keywords.contains(&"sports".to_string()));
    }

    #[test]
    fn momentum_is_high_for_a_late_burst() {
        let members: Vec<Candidate> = (0..5).map(|_| candidate(1, "x", vec![1.0], 1)).collect();
        let refs: Vec<&Candidate> = members.iter().collect();
        let (momentum, burst_intensity, volume) = compute_dynamics(&refs, 24);
        assert!(momentum > 0.0);
        assert!(burst_intensity > 1.0);
        assert_eq!(volume, 5);
    }

    #[test]
    fn score_and_rank_orders_by_descending_score() {
        let mut trends = vec![
            Trend {
                cluster_id: 0,
                size: 5,
                keywords: vec![],
                momentum: 0.1,
                burst_intensity: 1.0,
                score: 0.0,
                sample_article_ids: vec![],
                extra: HashMap::new(),
            },
            Trend {
                cluster_id: 1,
                size: 20,
                keywords: vec![],
                momentum: 5.0,
                burst_intensity: 8.0,
                score: 0.0,
                sample_article_ids: vec![],
                extra: HashMap::new(),
            },
        ];
        score_and_rank(&mut trends);
        assert_eq!(trends[0].cluster_id, 1);
        assert!(trends[0].score >= trends[1].score);
    }
}
