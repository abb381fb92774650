//! An in-memory store with the same behaviour as the database tables.
//! Used for tests and for running aggregation without a database.

use crate::source::ScoringData;
use crate::validate::{
    ValidationError, validate_name, validate_period_dates, validate_question_range,
    validate_score,
};
use crate::{
    CategoryPatch, CategoryRecord, NewCategory, NewPeriod, NewQuestion, NewUser, PeriodPatch,
    PeriodRecord, QuestionPatch, QuestionRecord, ScoreRecord, ScoreSubmission, UserPatch,
    UserRecord, UserRole,
};
use anyhow::Result;
use chrono::Utc;

/// Hands out increasing row ids, starting at 1.
#[derive(Debug, Default, Clone)]
struct IdSequence(u32);

impl IdSequence {
    fn next(&mut self) -> u32 {
        self.0 += 1;
        self.0
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    users: Vec<UserRecord>,
    categories: Vec<CategoryRecord>,
    questions: Vec<QuestionRecord>,
    periods: Vec<PeriodRecord>,
    scores: Vec<ScoreRecord>,
    user_ids: IdSequence,
    category_ids: IdSequence,
    question_ids: IdSequence,
    period_ids: IdSequence,
    score_ids: IdSequence,
}

fn not_found(entity: &'static str, id: u32) -> ValidationError {
    ValidationError::NotFound { entity, id }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_user(&self, id: u32) -> Result<&UserRecord, ValidationError> {
        self.users
            .iter()
            .find(|u| u.user_id == id)
            .ok_or_else(|| not_found("user", id))
    }

    fn find_question(&self, id: u32) -> Result<&QuestionRecord, ValidationError> {
        self.questions
            .iter()
            .find(|q| q.question_id == id)
            .ok_or_else(|| not_found("question", id))
    }

    fn find_period(&self, id: u32) -> Result<&PeriodRecord, ValidationError> {
        self.periods
            .iter()
            .find(|p| p.period_id == id)
            .ok_or_else(|| not_found("period", id))
    }

    fn check_category(&self, id: Option<u32>) -> Result<(), ValidationError> {
        match id {
            Some(id) if !self.categories.iter().any(|c| c.category_id == id) => {
                Err(not_found("category", id))
            }
            _ => Ok(()),
        }
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    /// Users filtered by role and, optionally, by the category they report under.
    pub fn users_by_role_and_category(
        &self,
        role: UserRole,
        category_id: Option<u32>,
    ) -> Vec<UserRecord> {
        self.users
            .iter()
            .filter(|u| u.role == role)
            .filter(|u| category_id.is_none() || u.category_id == category_id)
            .cloned()
            .collect()
    }

    pub fn add_user(&mut self, new: NewUser) -> Result<UserRecord, ValidationError> {
        validate_name("name", &new.name)?;
        self.check_category(new.category_id)?;
        let user = UserRecord {
            user_id: self.user_ids.next(),
            name: new.name,
            role: new.role,
            category_id: new.category_id,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    pub fn update_user(&mut self, id: u32, patch: UserPatch) -> Result<UserRecord, ValidationError> {
        let mut user = self.find_user(id)?.clone();
        patch.apply(&mut user);
        validate_name("name", &user.name)?;
        self.check_category(user.category_id)?;
        if let Some(slot) = self.users.iter_mut().find(|u| u.user_id == id) {
            *slot = user.clone();
        }
        Ok(user)
    }

    /// Remove a user along with every score they gave or received.
    pub fn delete_user(&mut self, id: u32) -> Result<(), ValidationError> {
        self.find_user(id)?;
        self.users.retain(|u| u.user_id != id);
        self.scores
            .retain(|s| s.judge_id != id && s.presenter_id != id);
        Ok(())
    }

    pub fn categories(&self) -> &[CategoryRecord] {
        &self.categories
    }

    pub fn add_category(&mut self, new: NewCategory) -> Result<CategoryRecord, ValidationError> {
        validate_name("name", &new.name)?;
        let category = CategoryRecord {
            category_id: self.category_ids.next(),
            name: new.name,
            description: new.description,
            sort_order: new.sort_order,
        };
        self.categories.push(category.clone());
        Ok(category)
    }

    pub fn update_category(
        &mut self,
        id: u32,
        patch: CategoryPatch,
    ) -> Result<CategoryRecord, ValidationError> {
        let slot = self
            .categories
            .iter_mut()
            .find(|c| c.category_id == id)
            .ok_or_else(|| not_found("category", id))?;
        let mut category = slot.clone();
        patch.apply(&mut category);
        validate_name("name", &category.name)?;
        *slot = category.clone();
        Ok(category)
    }

    /// Remove a category. Its questions and presenters become uncategorized.
    pub fn delete_category(&mut self, id: u32) -> Result<(), ValidationError> {
        self.check_category(Some(id))?;
        for question in self.questions.iter_mut().filter(|q| q.category_id == Some(id)) {
            question.category_id = None;
        }
        for user in self.users.iter_mut().filter(|u| u.category_id == Some(id)) {
            user.category_id = None;
        }
        self.categories.retain(|c| c.category_id != id);
        Ok(())
    }

    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    pub fn add_question(&mut self, new: NewQuestion) -> Result<QuestionRecord, ValidationError> {
        validate_name("title", &new.title)?;
        validate_question_range(new.min_score, new.max_score, new.step)?;
        self.check_category(new.category_id)?;
        let question = QuestionRecord {
            question_id: self.question_ids.next(),
            title: new.title,
            description: new.description,
            category_id: new.category_id,
            min_score: new.min_score,
            max_score: new.max_score,
            step: new.step,
        };
        self.questions.push(question.clone());
        Ok(question)
    }

    pub fn update_question(
        &mut self,
        id: u32,
        patch: QuestionPatch,
    ) -> Result<QuestionRecord, ValidationError> {
        let mut question = self.find_question(id)?.clone();
        patch.apply(&mut question);
        validate_name("title", &question.title)?;
        validate_question_range(question.min_score, question.max_score, question.step)?;
        self.check_category(question.category_id)?;
        if let Some(slot) = self.questions.iter_mut().find(|q| q.question_id == id) {
            *slot = question.clone();
        }
        Ok(question)
    }

    /// Remove a question and its scores.
    pub fn delete_question(&mut self, id: u32) -> Result<(), ValidationError> {
        self.find_question(id)?;
        self.questions.retain(|q| q.question_id != id);
        self.scores.retain(|s| s.question_id != id);
        Ok(())
    }

    pub fn periods(&self) -> &[PeriodRecord] {
        &self.periods
    }

    pub fn get_period(&self, id: u32) -> Option<&PeriodRecord> {
        self.find_period(id).ok()
    }

    pub fn add_period(&mut self, new: NewPeriod) -> Result<PeriodRecord, ValidationError> {
        validate_name("name", &new.name)?;
        validate_period_dates(new.start_date, new.end_date)?;
        let period = PeriodRecord {
            period_id: self.period_ids.next(),
            name: new.name,
            start_date: new.start_date,
            end_date: new.end_date,
            status: new.status,
        };
        self.periods.push(period.clone());
        Ok(period)
    }

    pub fn update_period(
        &mut self,
        id: u32,
        patch: PeriodPatch,
    ) -> Result<PeriodRecord, ValidationError> {
        let mut period = self.find_period(id)?.clone();
        patch.apply(&mut period);
        validate_name("name", &period.name)?;
        validate_period_dates(period.start_date, period.end_date)?;
        if let Some(slot) = self.periods.iter_mut().find(|p| p.period_id == id) {
            *slot = period.clone();
        }
        Ok(period)
    }

    /// Remove a period and every score recorded in it.
    pub fn delete_period(&mut self, id: u32) -> Result<(), ValidationError> {
        self.find_period(id)?;
        self.periods.retain(|p| p.period_id != id);
        self.scores.retain(|s| s.period_id != id);
        Ok(())
    }

    /// Insert a score, or replace the value if the tuple was already scored.
    pub fn submit_score(&mut self, sub: ScoreSubmission) -> Result<ScoreRecord, ValidationError> {
        let question = self.find_question(sub.question_id)?;
        let judge = self.find_user(sub.judge_id)?;
        let presenter = self.find_user(sub.presenter_id)?;
        let period = self.find_period(sub.period_id)?;
        validate_score(question, judge, presenter, period, sub.value)?;

        let existing = self.scores.iter_mut().find(|s| {
            s.question_id == sub.question_id
                && s.judge_id == sub.judge_id
                && s.presenter_id == sub.presenter_id
                && s.period_id == sub.period_id
        });
        if let Some(score) = existing {
            score.value = sub.value;
            score.updated_at = Utc::now();
            return Ok(score.clone());
        }

        let score = ScoreRecord {
            score_id: self.score_ids.next(),
            question_id: sub.question_id,
            judge_id: sub.judge_id,
            presenter_id: sub.presenter_id,
            period_id: sub.period_id,
            value: sub.value,
            updated_at: Utc::now(),
        };
        self.scores.push(score.clone());
        Ok(score)
    }
}

impl ScoringData for MemoryStore {
    fn fetch_scores(&mut self, period_id: u32) -> Result<Vec<ScoreRecord>> {
        Ok(self
            .scores
            .iter()
            .filter(|s| s.period_id == period_id)
            .cloned()
            .collect())
    }

    fn fetch_users_by_role(&mut self, role: UserRole) -> Result<Vec<UserRecord>> {
        Ok(self.users_by_role_and_category(role, None))
    }

    fn fetch_questions(&mut self) -> Result<Vec<QuestionRecord>> {
        Ok(self.questions.clone())
    }

    fn fetch_categories(&mut self) -> Result<Vec<CategoryRecord>> {
        let mut categories = self.categories.clone();
        categories.sort_by_key(|c| c.sort_order);
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::calculate_results;
    use crate::{PeriodStatus, UNCATEGORIZED_NAME};
    use chrono::NaiveDate;

    struct Fixture {
        store: MemoryStore,
        judge_a: u32,
        judge_b: u32,
        presenter: u32,
        period: u32,
    }

    fn fixture() -> Fixture {
        let mut store = MemoryStore::new();
        let judge_a = store
            .add_user(NewUser {
                name: "Judge A".to_string(),
                role: UserRole::Judge,
                category_id: None,
            })
            .unwrap()
            .user_id;
        let judge_b = store
            .add_user(NewUser {
                name: "Judge B".to_string(),
                role: UserRole::Judge,
                category_id: None,
            })
            .unwrap()
            .user_id;
        let presenter = store
            .add_user(NewUser {
                name: "Presenter".to_string(),
                role: UserRole::Presenter,
                category_id: None,
            })
            .unwrap()
            .user_id;
        let period = store
            .add_period(NewPeriod {
                name: "Q1".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
                status: PeriodStatus::Active,
            })
            .unwrap()
            .period_id;
        Fixture {
            store,
            judge_a,
            judge_b,
            presenter,
            period,
        }
    }

    fn new_question(title: &str, category_id: Option<u32>) -> NewQuestion {
        NewQuestion {
            title: title.to_string(),
            description: None,
            category_id,
            min_score: 0.0,
            max_score: 10.0,
            step: 0.1,
        }
    }

    impl Fixture {
        fn submit(&mut self, question_id: u32, judge_id: u32, value: f64) -> ScoreRecord {
            self.store
                .submit_score(ScoreSubmission {
                    question_id,
                    judge_id,
                    presenter_id: self.presenter,
                    period_id: self.period,
                    value,
                })
                .unwrap()
        }
    }

    #[test_log::test]
    fn test_resubmission_replaces_value() {
        let mut f = fixture();
        let q = f.store.add_question(new_question("Clarity", None)).unwrap();

        let first = f.submit(q.question_id, f.judge_a, 5.0);
        let second = f.submit(q.question_id, f.judge_a, 7.0);

        assert_eq!(first.score_id, second.score_id);
        assert_eq!(f.store.fetch_scores(f.period).unwrap().len(), 1);

        let results = calculate_results(&mut f.store, f.period).unwrap();
        assert_eq!(results[0].categories[0].scores[0].average_score, 7.0);
    }

    #[test_log::test]
    fn test_delete_category_moves_questions_to_uncategorized() {
        let mut f = fixture();
        let cat = f
            .store
            .add_category(NewCategory {
                name: "Delivery".to_string(),
                description: None,
                sort_order: 0,
            })
            .unwrap();
        let q1 = f
            .store
            .add_question(new_question("Pace", Some(cat.category_id)))
            .unwrap();
        let q2 = f
            .store
            .add_question(new_question("Tone", Some(cat.category_id)))
            .unwrap();
        f.submit(q1.question_id, f.judge_a, 8.0);
        f.submit(q2.question_id, f.judge_a, 6.0);
        f.submit(q1.question_id, f.judge_b, 4.0);

        let before = calculate_results(&mut f.store, f.period).unwrap();
        assert_eq!(before[0].categories[0].category_id, Some(cat.category_id));
        assert_eq!(before[0].categories[0].category_total, 9.0);

        f.store.delete_category(cat.category_id).unwrap();
        assert!(f.store.questions().iter().all(|q| q.category_id.is_none()));

        let after = calculate_results(&mut f.store, f.period).unwrap();
        assert_eq!(after[0].categories.len(), 1);
        let group = &after[0].categories[0];
        assert_eq!(group.category_id, None);
        assert_eq!(group.category_name, UNCATEGORIZED_NAME);
        assert_eq!(group.scores.len(), 2);
        assert_eq!(group.category_total, 9.0);
        assert_eq!(after[0].total_average, 9.0);
    }

    #[test_log::test]
    fn test_delete_period_cascades_scores() {
        let mut f = fixture();
        let q = f.store.add_question(new_question("Clarity", None)).unwrap();
        f.submit(q.question_id, f.judge_a, 9.0);

        f.store.delete_period(f.period).unwrap();

        assert!(f.store.fetch_scores(f.period).unwrap().is_empty());
        assert!(f.store.get_period(f.period).is_none());
        // an unknown period aggregates like an empty one
        let results = calculate_results(&mut f.store, f.period).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].total_average, 0.0);
    }

    #[test_log::test]
    fn test_delete_user_and_question_cascade_scores() {
        let mut f = fixture();
        let q1 = f.store.add_question(new_question("One", None)).unwrap();
        let q2 = f.store.add_question(new_question("Two", None)).unwrap();
        f.submit(q1.question_id, f.judge_a, 9.0);
        f.submit(q2.question_id, f.judge_b, 3.0);

        f.store.delete_user(f.judge_a).unwrap();
        assert_eq!(f.store.fetch_scores(f.period).unwrap().len(), 1);

        f.store.delete_question(q2.question_id).unwrap();
        assert!(f.store.fetch_scores(f.period).unwrap().is_empty());
    }

    #[test_log::test]
    fn test_scores_that_would_read_as_unscored_are_refused() {
        let mut f = fixture();

        let negative = NewQuestion {
            min_score: -5.0,
            max_score: 5.0,
            ..new_question("Balance", None)
        };
        assert!(matches!(
            f.store.add_question(negative),
            Err(ValidationError::InvalidQuestion(_))
        ));
        let fine_step = NewQuestion {
            step: 0.04,
            ..new_question("Pace", None)
        };
        assert!(f.store.add_question(fine_step).is_err());
        assert!(f.store.questions().is_empty());

        let q = f.store.add_question(new_question("Clarity", None)).unwrap();
        let err = f
            .store
            .submit_score(ScoreSubmission {
                question_id: q.question_id,
                judge_id: f.judge_a,
                presenter_id: f.presenter,
                period_id: f.period,
                value: 0.04,
            })
            .unwrap_err();
        assert!(matches!(err, ValidationError::TooPrecise { .. }));
        assert!(f.store.fetch_scores(f.period).unwrap().is_empty());

        let patch = QuestionPatch {
            min_score: Some(-1.0),
            ..QuestionPatch::default()
        };
        assert!(f.store.update_question(q.question_id, patch).is_err());
        assert_eq!(f.store.questions()[0].min_score, 0.0);
    }

    #[test_log::test]
    fn test_submission_rejections() {
        let mut f = fixture();
        let q = f.store.add_question(new_question("Clarity", None)).unwrap();

        let err = f
            .store
            .submit_score(ScoreSubmission {
                question_id: q.question_id,
                judge_id: f.judge_a,
                presenter_id: f.presenter,
                period_id: 999,
                value: 5.0,
            })
            .unwrap_err();
        assert!(err.is_not_found());

        let err = f
            .store
            .submit_score(ScoreSubmission {
                question_id: q.question_id,
                judge_id: f.presenter,
                presenter_id: f.judge_a,
                period_id: f.period,
                value: 5.0,
            })
            .unwrap_err();
        assert!(matches!(err, ValidationError::WrongRole { .. }));

        f.store
            .update_period(
                f.period,
                PeriodPatch {
                    status: Some(PeriodStatus::Closed),
                    ..PeriodPatch::default()
                },
            )
            .unwrap();
        let err = f
            .store
            .submit_score(ScoreSubmission {
                question_id: q.question_id,
                judge_id: f.judge_a,
                presenter_id: f.presenter,
                period_id: f.period,
                value: 5.0,
            })
            .unwrap_err();
        assert_eq!(err, ValidationError::PeriodClosed(f.period));
    }

    #[test_log::test]
    fn test_users_filtered_by_category() {
        let mut store = MemoryStore::new();
        let cat = store
            .add_category(NewCategory {
                name: "Engineering".to_string(),
                description: None,
                sort_order: 1,
            })
            .unwrap();
        store
            .add_user(NewUser {
                name: "In category".to_string(),
                role: UserRole::Presenter,
                category_id: Some(cat.category_id),
            })
            .unwrap();
        store
            .add_user(NewUser {
                name: "Elsewhere".to_string(),
                role: UserRole::Presenter,
                category_id: None,
            })
            .unwrap();

        let filtered = store.users_by_role_and_category(UserRole::Presenter, Some(cat.category_id));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "In category");

        assert!(
            store
                .add_user(NewUser {
                    name: "Dangling".to_string(),
                    role: UserRole::Presenter,
                    category_id: Some(42),
                })
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test_log::test]
    fn test_categories_fetched_in_sort_order() {
        let mut store = MemoryStore::new();
        for (name, sort_order) in [("Third", 3), ("First", 1), ("Second", 2)] {
            store
                .add_category(NewCategory {
                    name: name.to_string(),
                    description: None,
                    sort_order,
                })
                .unwrap();
        }
        let names: Vec<String> = store
            .fetch_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }
}
