use crate::database::DbConn;
use crate::error::AppResult;

const SCHEMA: &str = include_str!("../../schema.sql");

pub fn init_database(conn: &DbConn) -> AppResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
