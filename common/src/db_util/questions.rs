use super::*;

table! {
    score_questions (id) {
        id -> Integer,
        title -> Varchar,
        description -> Nullable<Text>,
        category_id -> Nullable<Integer>,
        min_score -> Numeric,
        max_score -> Numeric,
        step -> Numeric,
    }
}

#[derive(Queryable, AsChangeset)]
#[diesel(table_name = score_questions)]
#[diesel(treat_none_as_null = true)]
struct QuestionPrivate {
    id: i32,
    title: String,
    description: Option<String>,
    category_id: Option<i32>,
    min_score: BigDecimal,
    max_score: BigDecimal,
    step: BigDecimal,
}

#[derive(Insertable)]
#[diesel(table_name = score_questions)]
struct QuestionPrivateNew {
    title: String,
    description: Option<String>,
    category_id: Option<i32>,
    min_score: BigDecimal,
    max_score: BigDecimal,
    step: BigDecimal,
}

fn private_to_public(p: QuestionPrivate) -> Result<QuestionRecord> {
    use conversions::*;
    Ok(QuestionRecord {
        question_id: i32_to_u32(p.id)?,
        title: p.title,
        description: p.description,
        category_id: opti32_to_optu32(p.category_id)?,
        min_score: bigdec_to_f64(&p.min_score)?,
        max_score: bigdec_to_f64(&p.max_score)?,
        step: bigdec_to_f64(&p.step)?,
    })
}

fn public_to_private(p: QuestionRecord) -> Result<QuestionPrivate> {
    use conversions::*;
    Ok(QuestionPrivate {
        id: u32_to_i32(p.question_id)?,
        title: p.title,
        description: p.description,
        category_id: optu32_to_opti32(p.category_id)?,
        min_score: f64_to_bigdec(p.min_score)?,
        max_score: f64_to_bigdec(p.max_score)?,
        step: f64_to_bigdec(p.step)?,
    })
}

fn build_new_row(new: NewQuestion) -> Result<QuestionPrivateNew> {
    use conversions::*;
    Ok(QuestionPrivateNew {
        title: new.title,
        description: new.description,
        category_id: optu32_to_opti32(new.category_id)?,
        min_score: f64_to_bigdec(new.min_score)?,
        max_score: f64_to_bigdec(new.max_score)?,
        step: f64_to_bigdec(new.step)?,
    })
}

fn check_question(conn: &mut PgConnection, q_title: &str, q_category: Option<u32>, min: f64, max: f64, q_step: f64) -> Result<()> {
    validate::validate_name("title", q_title)?;
    validate::validate_question_range(min, max, q_step)?;
    if let Some(cat) = q_category {
        get_category_by_id(conn, cat)?;
    }
    Ok(())
}

pub fn insert_question(conn: &mut PgConnection, new: NewQuestion) -> Result<QuestionRecord> {
    use self::score_questions::dsl::*;

    check_question(
        conn,
        &new.title,
        new.category_id,
        new.min_score,
        new.max_score,
        new.step,
    )?;
    let insert_row = build_new_row(new)?;

    let result = diesel::insert_into(score_questions)
        .values(&insert_row)
        .get_result::<QuestionPrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;
    private_to_public(result)
}

pub fn get_question_by_id(conn: &mut PgConnection, row_id: u32) -> Result<QuestionRecord> {
    use self::score_questions::dsl::*;

    let key = conversions::u32_to_i32(row_id)?;

    let result = score_questions
        .filter(id.eq(key))
        .first::<QuestionPrivate>(conn)
        .optional()
        .map_err(|e| anyhow!("{e}"))?
        .ok_or_else(|| not_found("question", row_id))?;
    private_to_public(result)
}

pub fn get_all_questions(conn: &mut PgConnection) -> Result<Vec<QuestionRecord>> {
    use self::score_questions::dsl::*;

    let items_private: Vec<QuestionPrivate> = score_questions
        .order(id.asc())
        .load(conn)
        .map_err(|e| anyhow!("{e}"))?;

    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<QuestionRecord>>>()
}

pub fn update_question(
    conn: &mut PgConnection,
    row_id: u32,
    patch: QuestionPatch,
) -> Result<QuestionRecord> {
    use self::score_questions::dsl::*;

    let mut record = get_question_by_id(conn, row_id)?;
    patch.apply(&mut record);
    check_question(
        conn,
        &record.title,
        record.category_id,
        record.min_score,
        record.max_score,
        record.step,
    )?;

    let key = conversions::u32_to_i32(row_id)?;
    let update_row = public_to_private(record)?;

    let result = diesel::update(score_questions.filter(id.eq(key)))
        .set(&update_row)
        .get_result::<QuestionPrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;
    private_to_public(result)
}

/// Delete a question and its scores.
pub fn delete_question(conn: &mut PgConnection, row_id: u32) -> Result<()> {
    let key = conversions::u32_to_i32(row_id)?;

    let deleted = conn
        .transaction::<usize, diesel::result::Error, _>(|conn| {
            super::scores::delete_scores_for_question(conn, key)?;
            diesel::delete(score_questions::table.filter(score_questions::id.eq(key)))
                .execute(conn)
        })
        .map_err(|e| anyhow!("{e}"))?;

    if deleted == 0 {
        return Err(not_found("question", row_id));
    }
    Ok(())
}

/// Move every question of a category into the uncategorized bucket.
pub(super) fn uncategorize_questions(conn: &mut PgConnection, key: i32) -> QueryResult<usize> {
    use self::score_questions::dsl::*;

    diesel::update(score_questions.filter(category_id.eq(key)))
        .set(category_id.eq(None::<i32>))
        .execute(conn)
}
