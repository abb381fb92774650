use super::*;

table! {
    users (id) {
        id -> Integer,
        name -> Varchar,
        role -> Varchar,
        category_id -> Nullable<Integer>,
    }
}

#[derive(Queryable, AsChangeset)]
#[diesel(table_name = users)]
#[diesel(treat_none_as_null = true)]
struct UserPrivate {
    id: i32,
    name: String,
    role: String,
    category_id: Option<i32>,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct UserPrivateNew {
    name: String,
    role: String,
    category_id: Option<i32>,
}

fn private_to_public(p: UserPrivate) -> Result<UserRecord> {
    use conversions::*;
    Ok(UserRecord {
        user_id: i32_to_u32(p.id)?,
        name: p.name,
        role: deserialize_role(&p.role)?,
        category_id: opti32_to_optu32(p.category_id)?,
    })
}

fn public_to_private(p: UserRecord) -> Result<UserPrivate> {
    use conversions::*;
    Ok(UserPrivate {
        id: u32_to_i32(p.user_id)?,
        name: p.name,
        role: serialize_role(p.role),
        category_id: optu32_to_opti32(p.category_id)?,
    })
}

fn build_new_row(new: NewUser) -> Result<UserPrivateNew> {
    use conversions::*;
    Ok(UserPrivateNew {
        name: new.name,
        role: serialize_role(new.role),
        category_id: optu32_to_opti32(new.category_id)?,
    })
}

pub fn insert_user(conn: &mut PgConnection, new: NewUser) -> Result<UserRecord> {
    use self::users::dsl::*;

    validate::validate_name("name", &new.name)?;
    if let Some(cat) = new.category_id {
        get_category_by_id(conn, cat)?;
    }
    let insert_row = build_new_row(new)?;

    let result = diesel::insert_into(users)
        .values(&insert_row)
        .get_result::<UserPrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;
    private_to_public(result)
}

pub fn get_user_by_id(conn: &mut PgConnection, row_id: u32) -> Result<UserRecord> {
    use self::users::dsl::*;

    let key = conversions::u32_to_i32(row_id)?;

    let result = users
        .filter(id.eq(key))
        .first::<UserPrivate>(conn)
        .optional()
        .map_err(|e| anyhow!("{e}"))?
        .ok_or_else(|| not_found("user", row_id))?;
    private_to_public(result)
}

/// List users, optionally limited to a role and to the category they report under.
pub fn get_users(
    conn: &mut PgConnection,
    input_role: Option<UserRole>,
    input_category_id: Option<u32>,
) -> Result<Vec<UserRecord>> {
    use self::users::dsl::*;

    let mut query = users.order(id.asc()).into_boxed();
    if let Some(input_role) = input_role {
        query = query.filter(role.eq(conversions::serialize_role(input_role)));
    }
    if let Some(input_category_id) = input_category_id {
        query = query.filter(category_id.eq(conversions::u32_to_i32(input_category_id)?));
    }

    let items_private: Vec<UserPrivate> = query.load(conn).map_err(|e| anyhow!("{e}"))?;

    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<UserRecord>>>()
}

pub fn update_user(conn: &mut PgConnection, row_id: u32, patch: UserPatch) -> Result<UserRecord> {
    use self::users::dsl::*;

    let mut record = get_user_by_id(conn, row_id)?;
    patch.apply(&mut record);
    validate::validate_name("name", &record.name)?;
    if let Some(cat) = record.category_id {
        get_category_by_id(conn, cat)?;
    }

    let key = conversions::u32_to_i32(row_id)?;
    let update_row = public_to_private(record)?;

    let result = diesel::update(users.filter(id.eq(key)))
        .set(&update_row)
        .get_result::<UserPrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;
    private_to_public(result)
}

/// Delete a user and every score they gave or received.
pub fn delete_user(conn: &mut PgConnection, row_id: u32) -> Result<()> {
    let key = conversions::u32_to_i32(row_id)?;

    let deleted = conn
        .transaction::<usize, diesel::result::Error, _>(|conn| {
            super::scores::delete_scores_for_user(conn, key)?;
            diesel::delete(users::table.filter(users::id.eq(key))).execute(conn)
        })
        .map_err(|e| anyhow!("{e}"))?;

    if deleted == 0 {
        return Err(not_found("user", row_id));
    }
    Ok(())
}

pub fn count_users(conn: &mut PgConnection) -> Result<i64> {
    users::table
        .count()
        .get_result(conn)
        .map_err(|e| anyhow!("{e}"))
}

/// Detach every user from a category that is about to be removed.
pub(super) fn uncategorize_users(conn: &mut PgConnection, key: i32) -> QueryResult<usize> {
    use self::users::dsl::*;

    diesel::update(users.filter(category_id.eq(key)))
        .set(category_id.eq(None::<i32>))
        .execute(conn)
}
