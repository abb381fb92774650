use super::*;
use diesel::upsert::excluded;

table! {
    scores (id) {
        id -> Integer,
        question_id -> Integer,
        judge_id -> Integer,
        presenter_id -> Integer,
        period_id -> Integer,
        value -> Numeric,
        updated_at -> Timestamptz,
    }
}

#[derive(Queryable)]
#[diesel(table_name = scores)]
struct ScorePrivate {
    id: i32,
    question_id: i32,
    judge_id: i32,
    presenter_id: i32,
    period_id: i32,
    value: BigDecimal,
    updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = scores)]
struct ScorePrivateNew {
    question_id: i32,
    judge_id: i32,
    presenter_id: i32,
    period_id: i32,
    value: BigDecimal,
    updated_at: DateTime<Utc>,
}

fn private_to_public(p: ScorePrivate) -> Result<ScoreRecord> {
    use conversions::*;
    Ok(ScoreRecord {
        score_id: i32_to_u32(p.id)?,
        question_id: i32_to_u32(p.question_id)?,
        judge_id: i32_to_u32(p.judge_id)?,
        presenter_id: i32_to_u32(p.presenter_id)?,
        period_id: i32_to_u32(p.period_id)?,
        value: bigdec_to_f64(&p.value)?,
        updated_at: p.updated_at,
    })
}

fn build_new_row(submission: &ScoreSubmission, now: DateTime<Utc>) -> Result<ScorePrivateNew> {
    use conversions::*;
    Ok(ScorePrivateNew {
        question_id: u32_to_i32(submission.question_id)?,
        judge_id: u32_to_i32(submission.judge_id)?,
        presenter_id: u32_to_i32(submission.presenter_id)?,
        period_id: u32_to_i32(submission.period_id)?,
        value: f64_to_bigdec(submission.value)?,
        updated_at: now,
    })
}

/// Every score row recorded in a period, in insertion order.
pub fn get_scores_for_period(conn: &mut PgConnection, input_period_id: u32) -> Result<Vec<ScoreRecord>> {
    use self::scores::dsl::*;

    let key = conversions::u32_to_i32(input_period_id)?;

    let items_private: Vec<ScorePrivate> = scores
        .filter(period_id.eq(key))
        .order(id.asc())
        .load(conn)
        .map_err(|e| anyhow!("{e}"))?;

    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<ScoreRecord>>>()
}

/// Store a judge's score, replacing any earlier value for the same
/// question, judge, presenter and period.
pub fn upsert_score(conn: &mut PgConnection, submission: ScoreSubmission) -> Result<ScoreRecord> {
    use self::scores::dsl::*;

    let question = get_question_by_id(conn, submission.question_id)?;
    let judge = get_user_by_id(conn, submission.judge_id)?;
    let presenter = get_user_by_id(conn, submission.presenter_id)?;
    let period = get_period_by_id(conn, submission.period_id)?;
    validate::validate_score(&question, &judge, &presenter, &period, submission.value)?;

    let now = Utc::now();
    let insert_row = build_new_row(&submission, now)?;

    let result = diesel::insert_into(scores)
        .values(&insert_row)
        .on_conflict((question_id, judge_id, presenter_id, period_id))
        .do_update()
        .set((value.eq(excluded(value)), updated_at.eq(now)))
        .get_result::<ScorePrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;

    log::debug!(
        "Judge #{} scored presenter #{} on question #{} with {}",
        submission.judge_id,
        submission.presenter_id,
        submission.question_id,
        submission.value
    );
    private_to_public(result)
}

/// Remove scores a user gave as a judge or received as a presenter.
pub(super) fn delete_scores_for_user(conn: &mut PgConnection, key: i32) -> QueryResult<usize> {
    use self::scores::dsl::*;

    diesel::delete(scores.filter(judge_id.eq(key).or(presenter_id.eq(key)))).execute(conn)
}

pub(super) fn delete_scores_for_question(conn: &mut PgConnection, key: i32) -> QueryResult<usize> {
    use self::scores::dsl::*;

    diesel::delete(scores.filter(question_id.eq(key))).execute(conn)
}

pub(super) fn delete_scores_for_period(conn: &mut PgConnection, key: i32) -> QueryResult<usize> {
    use self::scores::dsl::*;

    diesel::delete(scores.filter(period_id.eq(key))).execute(conn)
}
