use crate::{
    data::student::AudioClip,
    error::{FileIoSnafu, MakeQuerySnafu, MissingAudioSnafu, MissingStudentSnafu, RosterResult},
};
use snafu::{OptionExt, ResultExt, ensure};
use sqlx::SqliteConnection;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Owns where student payloads live: audio as a blob on the student row, QR images on disk.
#[derive(Clone, Debug)]
pub struct FileManager {
    qr_code_dir: PathBuf,
}

impl FileManager {
    pub fn new(qr_code_dir: impl Into<PathBuf>) -> Self {
        Self {
            qr_code_dir: qr_code_dir.into(),
        }
    }

    pub fn qr_file_name(id: i64) -> String {
        format!("{id}_qrcode.png")
    }

    pub fn qr_path(&self, id: i64) -> PathBuf {
        self.qr_code_dir.join(Self::qr_file_name(id))
    }

    pub async fn store_audio(
        &self,
        id: i64,
        AudioClip { bytes, filename }: AudioClip,
        conn: &mut SqliteConnection,
    ) -> RosterResult<()> {
        let result = sqlx::query(
            "UPDATE students SET audio_blob = ?, audio_filename = ? WHERE id = ?",
        )
        .bind(bytes)
        .bind(&filename)
        .bind(id)
        .execute(conn)
        .await
        .context(MakeQuerySnafu)?;

        ensure!(result.rows_affected() > 0, MissingStudentSnafu { id });
        debug!(id, ?filename, "Stored audio");
        Ok(())
    }

    pub async fn load_audio(&self, id: i64, conn: &mut SqliteConnection) -> RosterResult<AudioClip> {
        let (bytes, filename) =
            sqlx::query_as::<_, (Option<Vec<u8>>, Option<String>)>("SELECT audio_blob, audio_filename FROM students WHERE id = ?")
                .bind(id)
                .fetch_optional(conn)
                .await
                .context(MakeQuerySnafu)?
                .context(MissingStudentSnafu { id })?;

        match (bytes, filename) {
            (Some(bytes), Some(filename)) => Ok(AudioClip { bytes, filename }),
            _ => MissingAudioSnafu { id }.fail(),
        }
    }

    /// Writes the PNG to `{qr_code_dir}/{id}_qrcode.png` and records it on the student.
    ///
    /// Returns the file name, which is what gets stored as the reference.
    pub async fn store_qr_image(
        &self,
        id: i64,
        image_bytes: &[u8],
        conn: &mut SqliteConnection,
    ) -> RosterResult<String> {
        let file_name = Self::qr_file_name(id);

        //file first, so the row never references a PNG that isn't there
        tokio::fs::create_dir_all(&self.qr_code_dir)
            .await
            .context(FileIoSnafu {
                path: self.qr_code_dir.clone(),
            })?;
        let path = self.qr_path(id);
        tokio::fs::write(&path, image_bytes)
            .await
            .context(FileIoSnafu { path: path.clone() })?;

        let result = sqlx::query("UPDATE students SET qr_code_file = ? WHERE id = ?")
            .bind(&file_name)
            .bind(id)
            .execute(&mut *conn)
            .await;
        let updated = match result {
            Ok(result) => result.rows_affected() > 0,
            Err(source) => {
                remove_if_present(&path).await?;
                return Err(source).context(MakeQuerySnafu);
            }
        };
        if !updated {
            remove_if_present(&path).await?;
            return MissingStudentSnafu { id }.fail();
        }

        debug!(id, ?path, "Stored QR code");
        Ok(file_name)
    }

    /// Releases everything stored for a student, ahead of the row itself being deleted.
    pub async fn delete_all_for(&self, id: i64, conn: &mut SqliteConnection) -> RosterResult<()> {
        sqlx::query(
            "UPDATE students SET audio_blob = NULL, audio_filename = NULL, qr_code_file = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(conn)
        .await
        .context(MakeQuerySnafu)?;

        remove_if_present(&self.qr_path(id)).await
    }
}

/// A file that is already gone is not an error.
async fn remove_if_present(path: &Path) -> RosterResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(?path, "Removed QR code");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(source).context(FileIoSnafu { path }),
    }
}
