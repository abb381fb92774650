use super::*;

table! {
    score_categories (id) {
        id -> Integer,
        name -> Varchar,
        description -> Nullable<Text>,
        sort_order -> Integer,
    }
}

#[derive(Queryable, AsChangeset)]
#[diesel(table_name = score_categories)]
#[diesel(treat_none_as_null = true)]
struct CategoryPrivate {
    id: i32,
    name: String,
    description: Option<String>,
    sort_order: i32,
}

#[derive(Insertable)]
#[diesel(table_name = score_categories)]
struct CategoryPrivateNew {
    name: String,
    description: Option<String>,
    sort_order: i32,
}

fn private_to_public(p: CategoryPrivate) -> Result<CategoryRecord> {
    use conversions::*;
    Ok(CategoryRecord {
        category_id: i32_to_u32(p.id)?,
        name: p.name,
        description: p.description,
        sort_order: p.sort_order,
    })
}

fn public_to_private(p: CategoryRecord) -> Result<CategoryPrivate> {
    use conversions::*;
    Ok(CategoryPrivate {
        id: u32_to_i32(p.category_id)?,
        name: p.name,
        description: p.description,
        sort_order: p.sort_order,
    })
}

pub fn insert_category(conn: &mut PgConnection, new: NewCategory) -> Result<CategoryRecord> {
    use self::score_categories::dsl::*;

    validate::validate_name("name", &new.name)?;
    let insert_row = CategoryPrivateNew {
        name: new.name,
        description: new.description,
        sort_order: new.sort_order,
    };

    let result = diesel::insert_into(score_categories)
        .values(&insert_row)
        .get_result::<CategoryPrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;
    private_to_public(result)
}

pub fn get_category_by_id(conn: &mut PgConnection, row_id: u32) -> Result<CategoryRecord> {
    use self::score_categories::dsl::*;

    let key = conversions::u32_to_i32(row_id)?;

    let result = score_categories
        .filter(id.eq(key))
        .first::<CategoryPrivate>(conn)
        .optional()
        .map_err(|e| anyhow!("{e}"))?
        .ok_or_else(|| not_found("category", row_id))?;
    private_to_public(result)
}

/// All categories by sort order, ties broken by id.
pub fn get_all_categories(conn: &mut PgConnection) -> Result<Vec<CategoryRecord>> {
    use self::score_categories::dsl::*;

    let items_private: Vec<CategoryPrivate> = score_categories
        .order((sort_order.asc(), id.asc()))
        .load(conn)
        .map_err(|e| anyhow!("{e}"))?;

    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<CategoryRecord>>>()
}

pub fn update_category(
    conn: &mut PgConnection,
    row_id: u32,
    patch: CategoryPatch,
) -> Result<CategoryRecord> {
    use self::score_categories::dsl::*;

    let mut record = get_category_by_id(conn, row_id)?;
    patch.apply(&mut record);
    validate::validate_name("name", &record.name)?;

    let key = conversions::u32_to_i32(row_id)?;
    let update_row = public_to_private(record)?;

    let result = diesel::update(score_categories.filter(id.eq(key)))
        .set(&update_row)
        .get_result::<CategoryPrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;
    private_to_public(result)
}

/// Delete a category. Its questions and presenters are kept and become uncategorized.
pub fn delete_category(conn: &mut PgConnection, row_id: u32) -> Result<()> {
    let key = conversions::u32_to_i32(row_id)?;

    let (moved_questions, deleted) = conn
        .transaction::<(usize, usize), diesel::result::Error, _>(|conn| {
            let moved = super::questions::uncategorize_questions(conn, key)?;
            super::users::uncategorize_users(conn, key)?;
            let deleted = diesel::delete(
                score_categories::table.filter(score_categories::id.eq(key)),
            )
            .execute(conn)?;
            Ok((moved, deleted))
        })
        .map_err(|e| anyhow!("{e}"))?;

    if deleted == 0 {
        return Err(not_found("category", row_id));
    }
    log::info!("Deleted category #{row_id}, {moved_questions} questions moved to uncategorized");
    Ok(())
}
