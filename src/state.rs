use crate::{
    audio::{FfmpegTranscoder, Transcoder},
    config::RuntimeConfiguration,
    error::{GetDatabaseConnectionSnafu, MigrateSnafu, OpenDatabaseSnafu, RosterResult},
    files::FileManager,
    maud_conveniences::render_nav,
};
use maud::{DOCTYPE, Markup, html};
use snafu::ResultExt;
use sqlx::{Pool, Sqlite, Transaction, pool::PoolConnection, sqlite::SqlitePoolOptions};
use std::{ops::Deref, sync::Arc};

#[derive(Clone, Debug)]
pub struct RosterState {
    pool: Pool<Sqlite>,
    config: RuntimeConfiguration,
    files: FileManager,
    transcoder: Arc<dyn Transcoder>,
}

impl RosterState {
    /// Opens the database and brings the schema up to date. Nothing is served before this returns.
    pub async fn new(options: SqlitePoolOptions, config: RuntimeConfiguration) -> RosterResult<Self> {
        let db_config = config.db_config();
        let pool = options
            .max_connections(db_config.max_connections)
            .connect_with(db_config.connect_options())
            .await
            .context(OpenDatabaseSnafu)?;

        sqlx::migrate!().run(&pool).await.context(MigrateSnafu)?;
        info!(path = ?db_config.path, "Database migrated");

        let transcoder = Arc::new(FfmpegTranscoder::new(
            config.storage_config().ffmpeg_path.clone(),
        ));
        Ok(Self::from_parts(pool, config, transcoder))
    }

    pub fn from_parts(
        pool: Pool<Sqlite>,
        config: RuntimeConfiguration,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let files = FileManager::new(config.storage_config().qr_code_dir.clone());

        Self {
            pool,
            config,
            files,
            transcoder,
        }
    }

    #[allow(clippy::unused_self)] //in case self is ever needed :), and to allow direct html! usage
    pub fn render(&self, markup: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Roster" }
                }
                body class="bg-gray-900 min-h-screen flex flex-col items-center text-white" {
                    (render_nav())
                    main class="flex-1 flex flex-col items-center justify-center w-full p-4" {
                        (markup)
                    }
                }
            }
        }
    }

    pub async fn get_connection(&self) -> RosterResult<PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    /// Takes the write lock up front, so read-then-write transactions queue behind each other
    /// on the busy timeout instead of failing to upgrade with `SQLITE_BUSY`.
    pub async fn get_write_transaction(&self) -> RosterResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    pub const fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    pub const fn files(&self) -> &FileManager {
        &self.files
    }

    pub fn transcoder(&self) -> &dyn Transcoder {
        self.transcoder.as_ref()
    }

    pub async fn sensible_shutdown(&self) {
        self.pool.close().await;
    }
}

impl Deref for RosterState {
    type Target = Pool<Sqlite>;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}
