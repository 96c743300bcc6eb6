//! Reading schedule tables out of the game's master database.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use serde_json::{Map, Value};
use tracing::debug;

use super::tables::{
    CampaignRow, CharaFortuneRow, ClanBattleRow, FreeGachaRow, HatsuneRow, TowerRow,
};
use super::{ScheduleFeed, ScheduleTable};
use crate::error::CoreResult;

impl ScheduleFeed {
    /// Read every schedule table from a decompressed master database
    pub fn from_database(path: &Path, truth_version: &str) -> CoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(&conn, truth_version)
    }

    pub fn from_connection(conn: &Connection, truth_version: &str) -> CoreResult<Self> {
        let mut tables = HashMap::new();

        read_table::<ClanBattleRow>(conn, &mut tables)?;
        read_table::<FreeGachaRow>(conn, &mut tables)?;
        read_table::<CampaignRow>(conn, &mut tables)?;
        read_table::<TowerRow>(conn, &mut tables)?;
        read_table::<HatsuneRow>(conn, &mut tables)?;
        read_table::<CharaFortuneRow>(conn, &mut tables)?;

        Ok(ScheduleFeed {
            truth_version: truth_version.to_string(),
            tables,
        })
    }
}

fn read_table<T: ScheduleTable>(
    conn: &Connection,
    tables: &mut HashMap<String, Vec<Value>>,
) -> CoreResult<()> {
    // Older database versions predate some tables; build_records reports them
    if !table_exists(conn, T::NAME)? {
        debug!(table = T::NAME, "table not in database");
        return Ok(());
    }

    let mut stmt = conn.prepare(T::QUERY)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        values.push(row_to_value(row, &columns)?);
    }

    debug!(table = T::NAME, rows = values.len(), "read table");
    tables.insert(T::NAME.to_string(), values);
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> CoreResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [name],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

fn row_to_value(row: &Row<'_>, columns: &[String]) -> CoreResult<Value> {
    let mut object = Map::with_capacity(columns.len());

    for (index, name) in columns.iter().enumerate() {
        let value = match row.get_ref(index)? {
            ValueRef::Null | ValueRef::Blob(_) => Value::Null,
            ValueRef::Integer(i) => Value::from(i),
            ValueRef::Real(f) => Value::from(f),
            ValueRef::Text(text) => Value::from(String::from_utf8_lossy(text).into_owned()),
        };
        object.insert(name.clone(), value);
    }

    Ok(Value::Object(object))
}
