use crate::{
    data::student::AudioClip,
    error::{
        B64Snafu, MalformedDataUrlSnafu, RosterError, RosterResult, TempFileSnafu, TranscodeSnafu,
        UnsupportedAudioFormatSnafu,
    },
};
use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use snafu::{OptionExt, ResultExt, ensure};
use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;

/// Containers browsers hand back from `MediaRecorder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Webm,
    Ogg,
    Mp4,
}

impl SourceFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "audio/webm" | "video/webm" => Some(Self::Webm),
            "audio/ogg" | "application/ogg" => Some(Self::Ogg),
            "audio/mp4" | "audio/x-m4a" => Some(Self::Mp4),
            _ => None,
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Mp4 => "m4a",
        }
    }

    pub const fn ffmpeg_format(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Mp4 => "mp4",
        }
    }
}

#[derive(Debug)]
pub struct RecordedClip {
    pub format: SourceFormat,
    pub bytes: Vec<u8>,
}

impl RecordedClip {
    /// Parses `data:<mime>[;params];base64,<payload>`.
    pub fn from_data_url(data_url: &str) -> RosterResult<Self> {
        let rest = data_url
            .trim()
            .strip_prefix("data:")
            .context(MalformedDataUrlSnafu)?;
        let (header, payload) = rest.split_once(',').context(MalformedDataUrlSnafu)?;
        let header = header
            .strip_suffix(";base64")
            .context(MalformedDataUrlSnafu)?;

        let mime = header
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let format =
            SourceFormat::from_mime(&mime).context(UnsupportedAudioFormatSnafu { mime })?;
        let bytes = BASE64_STANDARD.decode(payload.trim()).context(B64Snafu)?;

        Ok(Self { format, bytes })
    }
}

#[async_trait]
pub trait Transcoder: Debug + Send + Sync {
    /// Reads the clip at `input` and returns it re-encoded as MP3.
    async fn transcode_to_mp3(&self, input: &Path, format: SourceFormat) -> RosterResult<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode_to_mp3(&self, input: &Path, format: SourceFormat) -> RosterResult<Vec<u8>> {
        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-f", format.ffmpeg_format(), "-i"])
            .arg(input)
            .args(["-vn", "-f", "mp3", "pipe:1"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RosterError::Transcode {
                reason: format!("unable to run {}: {e}", self.binary.display()),
            })?;

        ensure!(
            output.status.success(),
            TranscodeSnafu {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
        );
        ensure!(
            !output.stdout.is_empty(),
            TranscodeSnafu {
                reason: "ffmpeg produced no audio",
            }
        );

        Ok(output.stdout)
    }
}

pub fn recorded_audio_filename(id: i64) -> String {
    format!("{id}_audio.mp3")
}

/// Runs a recording through the transcoder via a uniquely named temp file.
///
/// The temp file is dropped (and so deleted) on every return path.
pub async fn transcode_recording(
    transcoder: &dyn Transcoder,
    id: i64,
    clip: RecordedClip,
) -> RosterResult<AudioClip> {
    let temp_file = tempfile::Builder::new()
        .prefix("roster-recording-")
        .suffix(&format!(".{}", clip.format.extension()))
        .tempfile()
        .context(TempFileSnafu)?;
    tokio::fs::write(temp_file.path(), &clip.bytes)
        .await
        .context(TempFileSnafu)?;

    let bytes = match transcoder
        .transcode_to_mp3(temp_file.path(), clip.format)
        .await
    {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(id, ?e, format = ?clip.format, "Unable to transcode recording");
            return Err(e);
        }
    };

    debug!(id, in_len = clip.bytes.len(), out_len = bytes.len(), "Transcoded recording");
    Ok(AudioClip {
        bytes,
        filename: recorded_audio_filename(id),
    })
}

/// A direct upload is kept byte-for-byte, only the name is cleaned up. Empty uploads count as none.
pub fn uploaded_clip(filename: Option<&str>, bytes: Vec<u8>) -> Option<AudioClip> {
    if bytes.is_empty() {
        return None;
    }

    Some(AudioClip {
        bytes,
        filename: sanitise_filename(filename.unwrap_or_default()),
    })
}

pub fn sanitise_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => Some(c),
            ' ' => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "audio".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn content_type_for(clip: &AudioClip) -> &'static str {
    if let Some(kind) = infer::get(&clip.bytes) {
        return kind.mime_type();
    }

    let extension = Path::new(&clip.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("ogg" | "oga" | "opus") => "audio/ogg",
        Some("webm") => "audio/webm",
        Some("wav") => "audio/wav",
        Some("m4a" | "mp4") => "audio/mp4",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Records what it was asked to transcode, and whether the input existed at that moment.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FakeTranscoder {
    pub fail: bool,
    pub seen: std::sync::Mutex<Vec<(PathBuf, bool, SourceFormat)>>,
}

#[cfg(test)]
#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode_to_mp3(&self, input: &Path, format: SourceFormat) -> RosterResult<Vec<u8>> {
        self.seen
            .lock()
            .unwrap()
            .push((input.to_path_buf(), input.exists(), format));
        if self.fail {
            return TranscodeSnafu { reason: "boom" }.fail();
        }
        Ok(b"ID3 fake mp3".to_vec())
    }
}
