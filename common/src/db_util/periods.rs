use super::*;

table! {
    score_periods (id) {
        id -> Integer,
        name -> Varchar,
        start_date -> Date,
        end_date -> Date,
        status -> Varchar,
    }
}

#[derive(Queryable, AsChangeset)]
#[diesel(table_name = score_periods)]
struct PeriodPrivate {
    id: i32,
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
}

#[derive(Insertable)]
#[diesel(table_name = score_periods)]
struct PeriodPrivateNew {
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
}

fn private_to_public(p: PeriodPrivate) -> Result<PeriodRecord> {
    use conversions::*;
    Ok(PeriodRecord {
        period_id: i32_to_u32(p.id)?,
        name: p.name,
        start_date: p.start_date,
        end_date: p.end_date,
        status: deserialize_status(&p.status)?,
    })
}

fn public_to_private(p: PeriodRecord) -> Result<PeriodPrivate> {
    use conversions::*;
    Ok(PeriodPrivate {
        id: u32_to_i32(p.period_id)?,
        name: p.name,
        start_date: p.start_date,
        end_date: p.end_date,
        status: serialize_status(p.status),
    })
}

pub fn insert_period(conn: &mut PgConnection, new: NewPeriod) -> Result<PeriodRecord> {
    use self::score_periods::dsl::*;

    validate::validate_name("name", &new.name)?;
    validate::validate_period_dates(new.start_date, new.end_date)?;
    let insert_row = PeriodPrivateNew {
        name: new.name,
        start_date: new.start_date,
        end_date: new.end_date,
        status: conversions::serialize_status(new.status),
    };

    let result = diesel::insert_into(score_periods)
        .values(&insert_row)
        .get_result::<PeriodPrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;
    private_to_public(result)
}

/// Look up a period, returning `None` if it does not exist.
pub fn find_period(conn: &mut PgConnection, row_id: u32) -> Result<Option<PeriodRecord>> {
    use self::score_periods::dsl::*;

    let key = conversions::u32_to_i32(row_id)?;

    score_periods
        .filter(id.eq(key))
        .first::<PeriodPrivate>(conn)
        .optional()
        .map_err(|e| anyhow!("{e}"))?
        .map(private_to_public)
        .transpose()
}

pub fn get_period_by_id(conn: &mut PgConnection, row_id: u32) -> Result<PeriodRecord> {
    find_period(conn, row_id)?.ok_or_else(|| not_found("period", row_id))
}

/// All periods, most recent first.
pub fn get_all_periods(conn: &mut PgConnection) -> Result<Vec<PeriodRecord>> {
    use self::score_periods::dsl::*;

    let items_private: Vec<PeriodPrivate> = score_periods
        .order((start_date.desc(), id.desc()))
        .load(conn)
        .map_err(|e| anyhow!("{e}"))?;

    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<PeriodRecord>>>()
}

pub fn update_period(
    conn: &mut PgConnection,
    row_id: u32,
    patch: PeriodPatch,
) -> Result<PeriodRecord> {
    use self::score_periods::dsl::*;

    let mut record = get_period_by_id(conn, row_id)?;
    patch.apply(&mut record);
    validate::validate_name("name", &record.name)?;
    validate::validate_period_dates(record.start_date, record.end_date)?;

    let key = conversions::u32_to_i32(row_id)?;
    let update_row = public_to_private(record)?;

    let result = diesel::update(score_periods.filter(id.eq(key)))
        .set(&update_row)
        .get_result::<PeriodPrivate>(conn)
        .map_err(|e| anyhow!("{e}"))?;

    let updated = private_to_public(result)?;
    if updated.status == PeriodStatus::Closed {
        log::info!("Period #{} ({}) is closed", updated.period_id, updated.name);
    }
    Ok(updated)
}

/// Delete a period and every score recorded in it.
pub fn delete_period(conn: &mut PgConnection, row_id: u32) -> Result<()> {
    let key = conversions::u32_to_i32(row_id)?;

    let deleted = conn
        .transaction::<usize, diesel::result::Error, _>(|conn| {
            let scores_removed = super::scores::delete_scores_for_period(conn, key)?;
            log::debug!("Removing {scores_removed} scores with period #{row_id}");
            diesel::delete(score_periods::table.filter(score_periods::id.eq(key))).execute(conn)
        })
        .map_err(|e| anyhow!("{e}"))?;

    if deleted == 0 {
        return Err(not_found("period", row_id));
    }
    Ok(())
}
