//! Aggregate stored scores into per-presenter result breakdowns.

use crate::source::ScoringData;
use crate::{
    CategoryRecord, CategoryResult, JudgeScore, QuestionRecord, QuestionResult, ScoreRecord,
    ScoreResult, UNCATEGORIZED_NAME, UserRecord, UserRole,
};
use anyhow::Result;
use itertools::Itertools;
use log::debug;
use std::collections::{HashMap, HashSet};

/// Scores keyed by `(question_id, judge_id)` for a single presenter.
type PresenterScores = HashMap<(u32, u32), f64>;

/// Questions that share a category, in display order.
#[derive(Debug)]
struct QuestionGroup<'a> {
    category_id: Option<u32>,
    category_name: &'a str,
    questions: Vec<&'a QuestionRecord>,
}

/// Round to one decimal place, halves away from zero.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Zero is the "not yet scored" sentinel. Anything not strictly positive is ignored.
fn is_scored(value: f64) -> bool {
    value > 0.0
}

/// Mean of the scored values, rounded to one decimal. Zero when nothing is scored.
#[allow(clippy::cast_precision_loss)]
fn mean_of_scored(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| is_scored(*v))
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        round_to_tenth(sum / count as f64)
    }
}

/// Partition questions into groups: every defined category by sort order,
/// then one uncategorized group last. Empty groups are dropped.
///
/// Questions pointing at a category that no longer exists are treated as uncategorized.
fn group_questions<'a>(
    questions: &'a [QuestionRecord],
    categories: &'a [CategoryRecord],
) -> Vec<QuestionGroup<'a>> {
    // sorted_by_key is stable, so equal sort orders keep their listed order
    let mut groups: Vec<QuestionGroup<'a>> = categories
        .iter()
        .sorted_by_key(|c| c.sort_order)
        .map(|c| QuestionGroup {
            category_id: Some(c.category_id),
            category_name: c.name.as_str(),
            questions: questions
                .iter()
                .filter(|q| q.category_id == Some(c.category_id))
                .collect(),
        })
        .collect();

    let known: HashSet<u32> = categories.iter().map(|c| c.category_id).collect();
    groups.push(QuestionGroup {
        category_id: None,
        category_name: UNCATEGORIZED_NAME,
        questions: questions
            .iter()
            .filter(|q| q.category_id.is_none_or(|id| !known.contains(&id)))
            .collect(),
    });

    groups.retain(|g| !g.questions.is_empty());
    groups
}

/// Build one category block for one presenter.
fn aggregate_category(
    group: &QuestionGroup<'_>,
    judges: &[UserRecord],
    presenter_scores: &PresenterScores,
) -> CategoryResult {
    // Running sum of each judge's scored values across the category
    let mut judge_totals = vec![0.0; judges.len()];
    let mut scores = Vec::with_capacity(group.questions.len());

    for question in &group.questions {
        let mut judge_scores = Vec::with_capacity(judges.len());
        for (judge, total) in judges.iter().zip(judge_totals.iter_mut()) {
            let score = presenter_scores
                .get(&(question.question_id, judge.user_id))
                .copied()
                .filter(|v| is_scored(*v))
                .unwrap_or(0.0);
            *total += score;
            judge_scores.push(JudgeScore {
                judge_id: judge.user_id,
                judge_name: judge.name.clone(),
                score,
            });
        }

        scores.push(QuestionResult {
            question_id: question.question_id,
            question_title: question.title.clone(),
            average_score: mean_of_scored(judge_scores.iter().map(|js| js.score)),
            judge_scores,
        });
    }

    CategoryResult {
        category_id: group.category_id,
        category_name: group.category_name.to_string(),
        scores,
        // Sum per judge first, then average the judges that scored anything
        category_total: mean_of_scored(judge_totals),
    }
}

/// Aggregate one period's scores into a breakdown per presenter.
///
/// `scores` should already be limited to a single period. If the same
/// (question, judge, presenter) appears more than once, the later row wins.
/// Presenters are returned in the order given. Nothing here fails: missing
/// scores, judges, questions or categories all degrade to zeros and empty lists.
pub fn aggregate_results(
    scores: &[ScoreRecord],
    presenters: &[UserRecord],
    judges: &[UserRecord],
    questions: &[QuestionRecord],
    categories: &[CategoryRecord],
) -> Vec<ScoreResult> {
    let groups = group_questions(questions, categories);

    // Index scores by presenter, then by (question, judge)
    let mut by_presenter: HashMap<u32, PresenterScores> = HashMap::new();
    for score in scores {
        by_presenter
            .entry(score.presenter_id)
            .or_default()
            .insert((score.question_id, score.judge_id), score.value);
    }
    let no_scores = PresenterScores::new();

    presenters
        .iter()
        .map(|presenter| {
            let presenter_scores = by_presenter.get(&presenter.user_id).unwrap_or(&no_scores);
            let categories: Vec<CategoryResult> = groups
                .iter()
                .map(|group| aggregate_category(group, judges, presenter_scores))
                .collect();
            let total_average = mean_of_scored(categories.iter().map(|c| c.category_total));

            ScoreResult {
                presenter_id: presenter.user_id,
                presenter_name: presenter.name.clone(),
                categories,
                total_average,
            }
        })
        .collect()
}

/// Fetch everything for a period from the data source and aggregate it.
///
/// An unknown `period_id` is not an error, it aggregates like a period with no scores.
///
/// # Errors
/// Returns an error if any of the underlying fetches fail.
pub fn calculate_results<S: ScoringData + ?Sized>(
    source: &mut S,
    period_id: u32,
) -> Result<Vec<ScoreResult>> {
    let scores = source.fetch_scores(period_id)?;
    let presenters = source.fetch_users_by_role(UserRole::Presenter)?;
    let judges = source.fetch_users_by_role(UserRole::Judge)?;
    let questions = source.fetch_questions()?;
    let categories = source.fetch_categories()?;

    debug!(
        "Aggregating period {period_id}: {} scores, {} presenters, {} judges, {} questions, {} categories",
        scores.len(),
        presenters.len(),
        judges.len(),
        questions.len(),
        categories.len()
    );

    Ok(aggregate_results(
        &scores,
        &presenters,
        &judges,
        &questions,
        &categories,
    ))
}

/// Pick out a single presenter's result, for the presenter's own view.
pub fn results_for_presenter(results: Vec<ScoreResult>, presenter_id: u32) -> Option<ScoreResult> {
    results.into_iter().find(|r| r.presenter_id == presenter_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(user_id: u32, name: &str, role: UserRole) -> UserRecord {
        UserRecord {
            user_id,
            name: name.to_string(),
            role,
            category_id: None,
        }
    }

    fn category(category_id: u32, name: &str, sort_order: i32) -> CategoryRecord {
        CategoryRecord {
            category_id,
            name: name.to_string(),
            description: None,
            sort_order,
        }
    }

    fn question(question_id: u32, category_id: Option<u32>) -> QuestionRecord {
        QuestionRecord {
            question_id,
            title: format!("Question {question_id}"),
            description: None,
            category_id,
            min_score: 0.0,
            max_score: 10.0,
            step: 0.1,
        }
    }

    fn score(question_id: u32, judge_id: u32, presenter_id: u32, value: f64) -> ScoreRecord {
        ScoreRecord {
            score_id: 0,
            question_id,
            judge_id,
            presenter_id,
            period_id: 1,
            value,
            updated_at: Utc::now(),
        }
    }

    fn judges() -> Vec<UserRecord> {
        vec![
            user(10, "Judge A", UserRole::Judge),
            user(11, "Judge B", UserRole::Judge),
        ]
    }

    fn presenters() -> Vec<UserRecord> {
        vec![user(20, "Presenter", UserRole::Presenter)]
    }

    #[test_log::test]
    fn test_two_judges_one_category() {
        let categories = vec![category(1, "Delivery", 0)];
        let questions = vec![question(1, Some(1)), question(2, Some(1))];
        let scores = vec![
            score(1, 10, 20, 8.0),
            score(2, 10, 20, 6.0),
            score(1, 11, 20, 4.0),
            score(2, 11, 20, 0.0),
        ];

        let results = aggregate_results(&scores, &presenters(), &judges(), &questions, &categories);

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.categories.len(), 1);
        let block = &result.categories[0];
        assert_eq!(block.category_id, Some(1));
        assert_eq!(block.scores[0].average_score, 6.0);
        assert_eq!(block.scores[1].average_score, 6.0);
        // Judge B's unscored entry is still reported, as 0
        assert_eq!(block.scores[1].judge_scores[1].score, 0.0);
        assert_eq!(block.category_total, 9.0);
        assert_eq!(result.total_average, 9.0);
    }

    #[test_log::test]
    fn test_presenter_without_scores() {
        let categories = vec![category(1, "Delivery", 0)];
        let questions = vec![question(1, Some(1)), question(2, Some(1))];

        let results = aggregate_results(&[], &presenters(), &judges(), &questions, &categories);

        let result = &results[0];
        assert_eq!(result.total_average, 0.0);
        for q in &result.categories[0].scores {
            assert_eq!(q.average_score, 0.0);
            assert_eq!(q.judge_scores.len(), 2);
            assert!(q.judge_scores.iter().all(|js| js.score == 0.0));
        }
    }

    #[test_log::test]
    fn test_uncategorized_group_is_last() {
        let categories = vec![category(1, "Later", 5), category(2, "Earlier", 1)];
        let questions = vec![question(1, None), question(2, Some(1)), question(3, Some(2))];

        let results = aggregate_results(&[], &presenters(), &judges(), &questions, &categories);

        let ids: Vec<Option<u32>> = results[0]
            .categories
            .iter()
            .map(|c| c.category_id)
            .collect();
        assert_eq!(ids, vec![Some(2), Some(1), None]);
        assert_eq!(results[0].categories[2].category_name, UNCATEGORIZED_NAME);
    }

    #[test_log::test]
    fn test_empty_category_dropped_and_no_uncategorized() {
        let categories = vec![category(1, "Used", 0), category(2, "Empty", 1)];
        let questions = vec![question(1, Some(1))];

        let results = aggregate_results(&[], &presenters(), &judges(), &questions, &categories);

        assert_eq!(results[0].categories.len(), 1);
        assert_eq!(results[0].categories[0].category_id, Some(1));
    }

    #[test_log::test]
    fn test_unknown_category_falls_back_to_uncategorized() {
        let categories = vec![category(1, "Known", 0)];
        let questions = vec![question(1, Some(1)), question(2, Some(99))];
        let scores = vec![score(2, 10, 20, 7.0)];

        let results = aggregate_results(&scores, &presenters(), &judges(), &questions, &categories);

        let last = results[0].categories.last().unwrap();
        assert_eq!(last.category_id, None);
        assert_eq!(last.scores[0].question_id, 2);
        assert_eq!(last.scores[0].average_score, 7.0);
    }

    #[test_log::test]
    fn test_unscored_category_excluded_from_total() {
        let categories = vec![category(1, "Scored", 0), category(2, "Unscored", 1)];
        let questions = vec![question(1, Some(1)), question(2, Some(2))];
        let scores = vec![score(1, 10, 20, 8.0), score(1, 11, 20, 6.0)];

        let results = aggregate_results(&scores, &presenters(), &judges(), &questions, &categories);

        let result = &results[0];
        assert_eq!(result.categories[0].category_total, 7.0);
        assert_eq!(result.categories[1].category_total, 0.0);
        assert_eq!(result.total_average, 7.0);
    }

    #[test_log::test]
    fn test_total_average_across_categories() {
        let categories = vec![category(1, "First", 0), category(2, "Second", 1)];
        let questions = vec![question(1, Some(1)), question(2, Some(2)), question(3, Some(2))];
        let scores = vec![
            score(1, 10, 20, 5.0),
            score(2, 10, 20, 4.0),
            score(3, 10, 20, 4.0),
        ];

        let results = aggregate_results(&scores, &presenters(), &judges(), &questions, &categories);

        // Category totals are per-judge sums: 5.0 and 8.0
        assert_eq!(results[0].categories[0].category_total, 5.0);
        assert_eq!(results[0].categories[1].category_total, 8.0);
        assert_eq!(results[0].total_average, 6.5);
    }

    #[test_log::test]
    fn test_later_duplicate_replaces_earlier() {
        let questions = vec![question(1, None)];
        let scores = vec![score(1, 10, 20, 5.0), score(1, 10, 20, 7.0)];

        let results = aggregate_results(&scores, &presenters(), &judges(), &questions, &[]);

        assert_eq!(results[0].categories[0].scores[0].average_score, 7.0);
        assert_eq!(results[0].total_average, 7.0);
    }

    #[test_log::test]
    fn test_averages_rounded_to_one_decimal() {
        let questions = vec![question(1, None)];
        let judges = vec![
            user(10, "A", UserRole::Judge),
            user(11, "B", UserRole::Judge),
            user(12, "C", UserRole::Judge),
        ];
        let scores = vec![
            score(1, 10, 20, 7.0),
            score(1, 11, 20, 8.0),
            score(1, 12, 20, 8.0),
        ];

        let results = aggregate_results(&scores, &presenters(), &judges, &questions, &[]);

        // 23 / 3 = 7.666...
        assert_eq!(results[0].categories[0].scores[0].average_score, 7.7);
        assert_eq!(results[0].total_average, 7.7);
    }

    #[test_log::test]
    fn test_degenerate_inputs() {
        let questions = vec![question(1, None)];

        assert!(aggregate_results(&[], &[], &judges(), &questions, &[]).is_empty());

        let no_questions = aggregate_results(&[], &presenters(), &judges(), &[], &[]);
        assert!(no_questions[0].categories.is_empty());
        assert_eq!(no_questions[0].total_average, 0.0);

        let no_judges = aggregate_results(&[], &presenters(), &[], &questions, &[]);
        let q = &no_judges[0].categories[0].scores[0];
        assert!(q.judge_scores.is_empty());
        assert_eq!(q.average_score, 0.0);
        assert_eq!(no_judges[0].total_average, 0.0);
    }

    #[test_log::test]
    fn test_presenter_order_and_isolation() {
        let presenters = vec![
            user(21, "Second", UserRole::Presenter),
            user(20, "First", UserRole::Presenter),
        ];
        let questions = vec![question(1, None)];
        let scores = vec![score(1, 10, 20, 9.0), score(1, 10, 21, 3.0)];

        let results = aggregate_results(&scores, &presenters, &judges(), &questions, &[]);

        assert_eq!(results[0].presenter_id, 21);
        assert_eq!(results[0].total_average, 3.0);
        assert_eq!(results[1].presenter_id, 20);
        assert_eq!(results[1].total_average, 9.0);

        let own = results_for_presenter(results, 20).unwrap();
        assert_eq!(own.presenter_name, "First");
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(6.0), 6.0);
        assert_eq!(round_to_tenth(7.25), 7.3);
        assert_eq!(round_to_tenth(7.24), 7.2);
        assert_eq!(round_to_tenth(0.0), 0.0);
    }
}
