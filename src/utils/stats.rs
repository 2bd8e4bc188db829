//! Aggregation math shared by the stat-maintenance routines and the
//! on-demand statistics endpoints. Everything here is pure: the db layer
//! fetches rows, these functions fold them, the db layer persists (or the
//! handler serializes) the result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::WatchlistStatus;

/// Round to one decimal place, the precision used for every stored or
/// reported average rating.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Star-value histogram over the 1..=5 rating domain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDistribution {
    #[serde(rename = "1")]
    pub one: i64,
    #[serde(rename = "2")]
    pub two: i64,
    #[serde(rename = "3")]
    pub three: i64,
    #[serde(rename = "4")]
    pub four: i64,
    #[serde(rename = "5")]
    pub five: i64,
}

impl RatingDistribution {
    pub fn from_counts(counts: [i64; 5]) -> Self {
        RatingDistribution {
            one: counts[0],
            two: counts[1],
            three: counts[2],
            four: counts[3],
            five: counts[4],
        }
    }

    pub fn as_counts(&self) -> [i64; 5] {
        [self.one, self.two, self.three, self.four, self.five]
    }
}

/// Derived rating fields for one movie (or one user's review history).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    #[serde(rename = "averageRating")]
    pub average_rating: f64,
    #[serde(rename = "totalReviews")]
    pub total_reviews: i64,
    #[serde(rename = "ratingDistribution")]
    pub distribution: RatingDistribution,
}

/// Fold a set of active review ratings into the derived fields: empty
/// input yields the all-zero summary, otherwise the mean rounded to one
/// decimal plus a per-star count. Ratings outside 1..=5 cannot exist past
/// validation and are skipped by the histogram.
pub fn rating_summary(ratings: &[i32]) -> RatingSummary {
    if ratings.is_empty() {
        return RatingSummary {
            average_rating: 0.0,
            total_reviews: 0,
            distribution: RatingDistribution::default(),
        };
    }

    let mut counts = [0i64; 5];
    let mut sum = 0i64;
    for &rating in ratings {
        sum += rating as i64;
        if (1..=5).contains(&rating) {
            counts[(rating - 1) as usize] += 1;
        }
    }

    RatingSummary {
        average_rating: round1(sum as f64 / ratings.len() as f64),
        total_reviews: ratings.len() as i64,
        distribution: RatingDistribution::from_counts(counts),
    }
}

/// Count occurrences preserving first-encounter order, then sort by count
/// descending. The sort is stable, so ties keep the order in which the
/// values were first seen.
pub fn tally<'a, I>(items: I) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<(String, i64)> = Vec::new();
    for item in items {
        match order.iter_mut().find(|(value, _)| value == item) {
            Some((_, count)) => *count += 1,
            None => order.push((item.to_string(), 1)),
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

/// Top `n` values of a tally, counts dropped.
pub fn top_n(tallies: &[(String, i64)], n: usize) -> Vec<String> {
    tallies.iter().take(n).map(|(value, _)| value.clone()).collect()
}

/// One watchlist row joined with its (active) movie, as consumed by
/// `watchlist_stats`.
#[derive(Debug, Clone)]
pub struct WatchlistSnapshot {
    pub status: WatchlistStatus,
    pub personal_rating: Option<i32>,
    pub genres: Vec<String>,
    pub duration_minutes: i32,
}

/// On-demand watchlist statistics. Computed per request, never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistStats {
    pub total_movies: i64,
    pub watched_movies: i64,
    pub want_to_watch: i64,
    pub currently_watching: i64,
    pub on_hold: i64,
    pub dropped: i64,
    pub average_personal_rating: f64,
    pub favorite_genres: Vec<String>,
    pub total_watch_time: i64,
}

impl WatchlistStats {
    pub fn empty() -> Self {
        WatchlistStats {
            total_movies: 0,
            watched_movies: 0,
            want_to_watch: 0,
            currently_watching: 0,
            on_hold: 0,
            dropped: 0,
            average_personal_rating: 0.0,
            favorite_genres: Vec::new(),
            total_watch_time: 0,
        }
    }
}

/// Fold a user's watchlist (active movies only) into its statistics block.
///
/// averagePersonalRating only considers set, nonzero personal ratings;
/// favoriteGenres is the top 5 by occurrence with first-encounter tie
/// order; totalWatchTime sums durations of watched items.
pub fn watchlist_stats(snapshots: &[WatchlistSnapshot]) -> WatchlistStats {
    if snapshots.is_empty() {
        return WatchlistStats::empty();
    }

    let mut stats = WatchlistStats::empty();
    let mut rating_sum = 0i64;
    let mut rating_count = 0i64;

    for snapshot in snapshots {
        stats.total_movies += 1;
        match snapshot.status {
            WatchlistStatus::Watched => {
                stats.watched_movies += 1;
                stats.total_watch_time += snapshot.duration_minutes as i64;
            }
            WatchlistStatus::WantToWatch => stats.want_to_watch += 1,
            WatchlistStatus::Watching => stats.currently_watching += 1,
            WatchlistStatus::OnHold => stats.on_hold += 1,
            WatchlistStatus::Dropped => stats.dropped += 1,
        }
        if let Some(rating) = snapshot.personal_rating {
            if rating != 0 {
                rating_sum += rating as i64;
                rating_count += 1;
            }
        }
    }

    if rating_count > 0 {
        stats.average_personal_rating = round1(rating_sum as f64 / rating_count as f64);
    }

    let genre_tally = tally(
        snapshots
            .iter()
            .flat_map(|s| s.genres.iter().map(String::as_str)),
    );
    stats.favorite_genres = top_n(&genre_tally, 5);

    stats
}

/// Genre/director/rating view of one watchlisted movie, input to
/// `taste_profile`.
#[derive(Debug, Clone)]
pub struct TasteInput {
    pub genres: Vec<String>,
    pub director: String,
    pub average_rating: f64,
}

/// Preference profile derived from a watchlist.
#[derive(Debug, Clone, PartialEq)]
pub struct TasteProfile {
    pub top_genres: Vec<String>,
    pub top_directors: Vec<String>,
    /// Unrounded mean of the watchlisted movies' average ratings. Callers
    /// subtract 0.5 for the candidate threshold and round for display.
    pub average_rating_preference: f64,
}

pub fn taste_profile(movies: &[TasteInput]) -> Option<TasteProfile> {
    if movies.is_empty() {
        return None;
    }

    let genre_tally = tally(
        movies
            .iter()
            .flat_map(|m| m.genres.iter().map(String::as_str)),
    );
    let director_tally = tally(movies.iter().map(|m| m.director.as_str()));
    let rating_sum: f64 = movies.iter().map(|m| m.average_rating).sum();

    Some(TasteProfile {
        top_genres: top_n(&genre_tally, 3),
        top_directors: top_n(&director_tally, 2),
        average_rating_preference: rating_sum / movies.len() as f64,
    })
}

/// "1990s"-style label used by the reviews-by-decade breakdown.
pub fn decade_label(year: i32) -> String {
    format!("{}s", (year / 10) * 10)
}

pub fn tally_decades<I: IntoIterator<Item = i32>>(years: I) -> BTreeMap<String, i64> {
    let mut decades = BTreeMap::new();
    for year in years {
        *decades.entry(decade_label(year)).or_insert(0) += 1;
    }
    decades
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_summary_of_empty_set_is_all_zero() {
        let summary = rating_summary(&[]);
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.total_reviews, 0);
        assert_eq!(summary.distribution.as_counts(), [0, 0, 0, 0, 0]);
    }

    #[test]
    fn rating_summary_of_single_review() {
        let summary = rating_summary(&[4]);
        assert_eq!(summary.average_rating, 4.0);
        assert_eq!(summary.total_reviews, 1);
        assert_eq!(summary.distribution.as_counts(), [0, 0, 0, 1, 0]);
    }

    #[test]
    fn rating_summary_rounds_mean_to_one_decimal() {
        // (1 + 2 + 2) / 3 = 1.666... -> 1.7
        let summary = rating_summary(&[1, 2, 2]);
        assert_eq!(summary.average_rating, 1.7);
        assert_eq!(summary.distribution.as_counts(), [1, 2, 0, 0, 0]);

        // (4 + 5) / 2 = 4.5 stays exact
        assert_eq!(rating_summary(&[4, 5]).average_rating, 4.5);
    }

    #[test]
    fn rating_summary_counts_every_star_bucket() {
        let summary = rating_summary(&[1, 1, 2, 3, 3, 3, 5]);
        assert_eq!(summary.distribution.as_counts(), [2, 1, 3, 0, 1]);
        assert_eq!(summary.total_reviews, 7);
    }

    #[test]
    fn distribution_serializes_with_star_keys() {
        let summary = rating_summary(&[4]);
        let json = serde_json::to_value(summary.distribution).unwrap();
        assert_eq!(json["4"], 1);
        assert_eq!(json["1"], 0);
    }

    #[test]
    fn tally_sorts_by_count_with_stable_tie_order() {
        let counts = tally(["Drama", "Action", "Drama", "Comedy", "Action", "Drama"]);
        assert_eq!(counts[0], ("Drama".to_string(), 3));
        assert_eq!(counts[1], ("Action".to_string(), 2));
        assert_eq!(counts[2], ("Comedy".to_string(), 1));

        // Ties keep first-encounter order.
        let tied = tally(["Western", "Horror", "Western", "Horror"]);
        assert_eq!(top_n(&tied, 2), vec!["Western", "Horror"]);
    }

    fn snapshot(
        status: WatchlistStatus,
        personal_rating: Option<i32>,
        genres: &[&str],
        duration: i32,
    ) -> WatchlistSnapshot {
        WatchlistSnapshot {
            status,
            personal_rating,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            duration_minutes: duration,
        }
    }

    #[test]
    fn empty_watchlist_yields_zero_stats_not_error() {
        let stats = watchlist_stats(&[]);
        assert_eq!(stats, WatchlistStats::empty());
        assert!(stats.favorite_genres.is_empty());
    }

    #[test]
    fn watchlist_stats_counts_statuses_and_watch_time() {
        let stats = watchlist_stats(&[
            snapshot(WatchlistStatus::Watched, Some(5), &["Action"], 120),
            snapshot(WatchlistStatus::Watched, None, &["Action", "Sci-Fi"], 90),
            snapshot(WatchlistStatus::WantToWatch, None, &["Drama"], 100),
            snapshot(WatchlistStatus::Watching, Some(3), &["Action"], 140),
            snapshot(WatchlistStatus::OnHold, None, &["Sci-Fi"], 80),
            snapshot(WatchlistStatus::Dropped, None, &["Horror"], 95),
        ]);

        assert_eq!(stats.total_movies, 6);
        assert_eq!(stats.watched_movies, 2);
        assert_eq!(stats.want_to_watch, 1);
        assert_eq!(stats.currently_watching, 1);
        assert_eq!(stats.on_hold, 1);
        assert_eq!(stats.dropped, 1);
        // Only watched items count toward watch time.
        assert_eq!(stats.total_watch_time, 210);
        // (5 + 3) / 2 = 4.0; unrated items are excluded.
        assert_eq!(stats.average_personal_rating, 4.0);
        assert_eq!(stats.favorite_genres[0], "Action");
    }

    #[test]
    fn watchlist_stats_ignores_zero_personal_ratings() {
        let stats = watchlist_stats(&[
            snapshot(WatchlistStatus::Watched, Some(0), &["Drama"], 100),
            snapshot(WatchlistStatus::Watched, None, &["Drama"], 100),
        ]);
        assert_eq!(stats.average_personal_rating, 0.0);
    }

    #[test]
    fn favorite_genres_caps_at_five() {
        let rows: Vec<WatchlistSnapshot> = [
            "Action", "Drama", "Comedy", "Horror", "Sci-Fi", "Western", "Crime",
        ]
        .iter()
        .map(|&g| snapshot(WatchlistStatus::WantToWatch, None, &[g], 100))
        .collect();
        assert_eq!(watchlist_stats(&rows).favorite_genres.len(), 5);
    }

    fn taste(genres: &[&str], director: &str, rating: f64) -> TasteInput {
        TasteInput {
            genres: genres.iter().map(|g| g.to_string()).collect(),
            director: director.to_string(),
            average_rating: rating,
        }
    }

    #[test]
    fn taste_profile_of_empty_watchlist_is_none() {
        assert!(taste_profile(&[]).is_none());
    }

    #[test]
    fn taste_profile_picks_top_genres_and_directors() {
        let profile = taste_profile(&[
            taste(&["Action", "Sci-Fi"], "Villeneuve", 4.5),
            taste(&["Action"], "Villeneuve", 4.0),
            taste(&["Drama", "Action"], "Nolan", 4.2),
            taste(&["Comedy"], "Gerwig", 3.9),
        ])
        .unwrap();

        assert_eq!(profile.top_genres.len(), 3);
        assert_eq!(profile.top_genres[0], "Action");
        assert_eq!(profile.top_directors, vec!["Villeneuve", "Nolan"]);
        let expected = (4.5 + 4.0 + 4.2 + 3.9) / 4.0;
        assert!((profile.average_rating_preference - expected).abs() < 1e-9);
    }

    #[test]
    fn decades_fold_into_labeled_buckets() {
        let decades = tally_decades([1994, 1999, 2008, 2001, 1995]);
        assert_eq!(decades.get("1990s"), Some(&3));
        assert_eq!(decades.get("2000s"), Some(&2));
        assert_eq!(decade_label(1888), "1880s");
    }

    #[test]
    fn round1_behaves_at_the_boundaries() {
        assert_eq!(round1(4.449), 4.4);
        assert_eq!(round1(4.45), 4.5);
        assert_eq!(round1(0.0), 0.0);
        assert_eq!(round1(5.0), 5.0);
    }
}
