use std::collections::HashSet;

use crate::models::CatalogItem;

const GENRE_WEIGHT: f64 = 2.5;
const DIRECTOR_BONUS: f64 = 3.5;
const ACTOR_WEIGHT: f64 = 0.6;
const RATING_DELTA_WEIGHT: f64 = 1.2;
const ERA_PENALTY: f64 = 0.02;
const QUALITY_WEIGHT: f64 = 0.4;

/// Taste profile aggregated from the history sample
#[derive(Debug, Default)]
pub struct HistoryProfile<'a> {
    genres: HashSet<&'a str>,
    directors: HashSet<&'a str>,
    actors: HashSet<&'a str>,
    avg_year: Option<f64>,
    avg_rating: Option<f64>,
}

impl<'a> HistoryProfile<'a> {
    pub fn from_history(history: &'a [CatalogItem]) -> Self {
        let genres = history
            .iter()
            .flat_map(|item| item.genres.iter().map(String::as_str))
            .collect();
        let directors = history
            .iter()
            .filter_map(|item| item.director.as_deref())
            .filter(|d| !d.is_empty())
            .collect();
        let actors = history
            .iter()
            .flat_map(|item| item.actors.iter().map(String::as_str))
            .collect();

        Self {
            genres,
            directors,
            actors,
            avg_year: mean(history.iter().filter_map(|item| item.year.map(f64::from))),
            avg_rating: mean(history.iter().filter_map(|item| item.rating)),
        }
    }

    /// Content-similarity score of one candidate against this profile
    pub fn score(&self, candidate: &CatalogItem) -> f64 {
        let candidate_genres: HashSet<&str> =
            candidate.genres.iter().map(String::as_str).collect();
        let genre_overlap = candidate_genres.intersection(&self.genres).count();

        let candidate_actors: HashSet<&str> =
            candidate.actors.iter().map(String::as_str).collect();
        let actor_overlap = candidate_actors.intersection(&self.actors).count();

        let director_match = candidate
            .director
            .as_deref()
            .is_some_and(|d| !d.is_empty() && self.directors.contains(d));

        let mut score = GENRE_WEIGHT * genre_overlap as f64 + ACTOR_WEIGHT * actor_overlap as f64;

        if director_match {
            score += DIRECTOR_BONUS;
        }

        if let (Some(rating), Some(avg_rating)) = (candidate.rating, self.avg_rating) {
            score += RATING_DELTA_WEIGHT * (rating - avg_rating);
        }

        if let (Some(year), Some(avg_year)) = (candidate.year, self.avg_year) {
            score -= ERA_PENALTY * (f64::from(year) - avg_year).abs();
        }

        score + QUALITY_WEIGHT * candidate.rating.unwrap_or(0.0)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Ranks `candidates` by similarity to `history`, best first, at most `limit` items
///
/// Ties keep input order. With an empty history there is nothing to
/// personalize on and the first `limit` candidates are returned unchanged.
pub fn score_and_rank(
    history: &[CatalogItem],
    candidates: Vec<CatalogItem>,
    limit: usize,
) -> Vec<CatalogItem> {
    if history.is_empty() {
        return candidates.into_iter().take(limit).collect();
    }

    let profile = HistoryProfile::from_history(history);

    let mut scored: Vec<(f64, CatalogItem)> = candidates
        .into_iter()
        .map(|candidate| (profile.score(&candidate), candidate))
        .collect();

    // sort_by is stable, so equal scores stay in candidate order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    tracing::debug!(
        candidates = scored.len(),
        top_score = scored.first().map(|(s, _)| *s),
        "Candidates scored"
    );

    scored.into_iter().take(limit).map(|(_, item)| item).collect()
}
