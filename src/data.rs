use crate::error::RosterResult;
use sqlx::{Pool, Sqlite, SqliteConnection};

pub mod student;

pub trait DataType: Sized {
    type Id;
    type FormForAdding;
    type FormForUpdating;

    async fn get_from_db_by_id(id: Self::Id, conn: &mut SqliteConnection) -> RosterResult<Option<Self>>;
    async fn get_all(pool: &Pool<Sqlite>) -> RosterResult<Vec<Self>>;
    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut SqliteConnection,
    ) -> RosterResult<Self::Id>;
    async fn update_in_database(
        id: Self::Id,
        to_be_updated: Self::FormForUpdating,
        conn: &mut SqliteConnection,
    ) -> RosterResult<()>;
    async fn remove_from_database(id: Self::Id, conn: &mut SqliteConnection) -> RosterResult<()>;
}

#[cfg(test)]
pub async fn test_pool() -> Pool<Sqlite> {
    use sqlx::sqlite::SqlitePoolOptions;

    //one connection, otherwise every connection gets its own empty in-memory db
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("unable to open in-memory db");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("unable to migrate in-memory db");
    pool
}
