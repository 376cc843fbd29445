use crate::{
    data::DataType,
    error::{
        MakeQuerySnafu, MissingFieldSnafu, MissingStudentByEmailSnafu, MissingStudentSnafu,
        RosterError, RosterResult,
    },
};
use maud::Render;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, ensure};
use sqlx::{FromRow, Pool, Sqlite, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub email: String,
    pub audio: Option<AudioClip>,
    pub qr_code_file: Option<String>,
}

#[derive(FromRow)]
struct StudentRow {
    id: i64,
    first_name: String,
    last_name: String,
    department: String,
    email: String,
    audio_blob: Option<Vec<u8>>,
    audio_filename: Option<String>,
    qr_code_file: Option<String>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        //the table CHECK keeps these two in lockstep
        let audio = match (row.audio_blob, row.audio_filename) {
            (Some(bytes), Some(filename)) => Some(AudioClip { bytes, filename }),
            _ => None,
        };

        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            department: row.department,
            email: row.email,
            audio,
            qr_code_file: row.qr_code_file,
        }
    }
}

/// Raw fields for a new student, as they arrive from a form, JSON body or CSV row.
///
/// Nothing is checked until [`StudentFields::validate`] runs, which the insert does first.
#[derive(Debug, Default, Deserialize)]
pub struct StudentFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    #[serde(skip)]
    pub audio: Option<AudioClip>,
}

#[derive(Debug)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub email: String,
    pub audio: Option<AudioClip>,
}

impl StudentFields {
    pub fn validate(self) -> RosterResult<NewStudent> {
        Ok(NewStudent {
            first_name: required(self.first_name, "first_name")?,
            last_name: required(self.last_name, "last_name")?,
            department: required(self.department, "department")?,
            email: required(self.email, "email")?,
            audio: self.audio,
        })
    }
}

/// A partial update: `None` means "leave as is".
///
/// Audio is all-or-nothing, a supplied clip replaces both the bytes and the filename.
#[derive(Debug, Default, Deserialize)]
pub struct StudentUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    #[serde(skip)]
    pub audio: Option<AudioClip>,
}

impl StudentUpdate {
    fn validate(self) -> RosterResult<Self> {
        Ok(Self {
            first_name: supplied(self.first_name, "first_name")?,
            last_name: supplied(self.last_name, "last_name")?,
            department: supplied(self.department, "department")?,
            email: supplied(self.email, "email")?,
            audio: self.audio,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> RosterResult<String> {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    ensure!(!value.is_empty(), MissingFieldSnafu { field });
    Ok(value)
}

fn supplied(value: Option<String>, field: &'static str) -> RosterResult<Option<String>> {
    value.map(|v| required(Some(v), field)).transpose()
}

fn write_error(source: sqlx::Error, email: Option<&str>) -> RosterError {
    match (&source, email) {
        (sqlx::Error::Database(db), Some(email)) if db.is_unique_violation() => {
            RosterError::DuplicateEmail {
                email: email.to_string(),
            }
        }
        _ => RosterError::MakeQuery { source },
    }
}

impl DataType for Student {
    type Id = i64;
    type FormForAdding = StudentFields;
    type FormForUpdating = StudentUpdate;

    async fn get_from_db_by_id(id: Self::Id, conn: &mut SqliteConnection) -> RosterResult<Option<Self>> {
        let row = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?;
        Ok(row.map(Self::from))
    }

    async fn get_all(pool: &Pool<Sqlite>) -> RosterResult<Vec<Self>> {
        let rows = sqlx::query_as::<_, StudentRow>("SELECT * FROM students ORDER BY id")
            .fetch_all(pool)
            .await
            .context(MakeQuerySnafu)?;
        Ok(rows.into_iter().map(Self::from).collect())
    }

    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut SqliteConnection,
    ) -> RosterResult<Self::Id> {
        let NewStudent {
            first_name,
            last_name,
            department,
            email,
            audio,
        } = to_be_added.validate()?;

        let (audio_blob, audio_filename) = match &audio {
            Some(clip) => (Some(clip.bytes.as_slice()), Some(clip.filename.as_str())),
            None => (None, None),
        };

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO students (first_name, last_name, department, email, audio_blob, audio_filename) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&first_name)
        .bind(&last_name)
        .bind(&department)
        .bind(&email)
        .bind(audio_blob)
        .bind(audio_filename)
        .fetch_one(conn)
        .await
        .map_err(|e| write_error(e, Some(&email)))?;

        info!(id, %email, "Added student");
        Ok(id)
    }

    async fn update_in_database(
        id: Self::Id,
        to_be_updated: Self::FormForUpdating,
        conn: &mut SqliteConnection,
    ) -> RosterResult<()> {
        let StudentUpdate {
            first_name,
            last_name,
            department,
            email,
            audio,
        } = to_be_updated.validate()?;

        //single statement so a concurrent delete either happens before or after, never halfway
        let result = sqlx::query(
            "UPDATE students SET
                first_name = COALESCE(?1, first_name),
                last_name = COALESCE(?2, last_name),
                department = COALESCE(?3, department),
                email = COALESCE(?4, email),
                audio_blob = CASE WHEN ?5 THEN ?6 ELSE audio_blob END,
                audio_filename = CASE WHEN ?5 THEN ?7 ELSE audio_filename END
            WHERE id = ?8",
        )
        .bind(first_name.as_deref())
        .bind(last_name.as_deref())
        .bind(department.as_deref())
        .bind(email.as_deref())
        .bind(audio.is_some())
        .bind(audio.as_ref().map(|clip| clip.bytes.as_slice()))
        .bind(audio.as_ref().map(|clip| clip.filename.as_str()))
        .bind(id)
        .execute(conn)
        .await
        .map_err(|e| write_error(e, email.as_deref()))?;

        ensure!(result.rows_affected() > 0, MissingStudentSnafu { id });
        debug!(id, "Updated student");
        Ok(())
    }

    ///the QR file is not touched here, see `FileManager::delete_all_for`
    async fn remove_from_database(id: Self::Id, conn: &mut SqliteConnection) -> RosterResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        ensure!(result.rows_affected() > 0, MissingStudentSnafu { id });
        info!(id, "Removed student");
        Ok(())
    }
}

impl Student {
    pub async fn get(id: i64, conn: &mut SqliteConnection) -> RosterResult<Self> {
        Self::get_from_db_by_id(id, conn)
            .await?
            .context(MissingStudentSnafu { id })
    }

    pub async fn get_from_db_by_email(
        email: &str,
        conn: &mut SqliteConnection,
    ) -> RosterResult<Option<Self>> {
        let row = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?;
        Ok(row.map(Self::from))
    }

    pub async fn find_by_email(email: &str, conn: &mut SqliteConnection) -> RosterResult<Self> {
        Self::get_from_db_by_email(email, conn)
            .await?
            .context(MissingStudentByEmailSnafu { email })
    }

    pub fn audio_url(&self) -> Option<String> {
        self.audio
            .as_ref()
            .map(|_| format!("/student/{}/audio", self.id))
    }
}

impl Render for Student {
    fn render_to(&self, buffer: &mut String) {
        self.first_name.render_to(buffer);
        buffer.push(' ');
        self.last_name.render_to(buffer);
    }
}
