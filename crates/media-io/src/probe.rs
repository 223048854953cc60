use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe not found on PATH; please install FFmpeg (ffprobe)")]
    FfprobeMissing,
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FfprobeJson {
    streams: Option<Vec<FfprobeStream>>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

pub fn probe_media(path: &Path) -> Result<MediaInfo, ProbeError> {
    let ffprobe = which::which("ffprobe").map_err(|_| ProbeError::FfprobeMissing)?;
    let out = Command::new(ffprobe)
        .arg("-v")
        .arg("error")
        .arg("-show_format")
        .arg("-show_streams")
        .arg("-print_format")
        .arg("json")
        .arg(path)
        .output()
        .map_err(|e| ProbeError::FfprobeFailed(e.to_string()))?;
    if !out.status.success() {
        return Err(ProbeError::FfprobeFailed(
            String::from_utf8_lossy(&out.stderr).into(),
        ));
    }
    let parsed: FfprobeJson =
        serde_json::from_slice(&out.stdout).map_err(|e| ProbeError::Parse(e.to_string()))?;
    Ok(info_from_json(path, parsed))
}

fn info_from_json(path: &Path, parsed: FfprobeJson) -> MediaInfo {
    let mut has_video = false;
    let mut has_audio = false;
    let mut width = None;
    let mut height = None;

    if let Some(streams) = &parsed.streams {
        for s in streams {
            match s.codec_type.as_deref() {
                Some("video") => {
                    has_video = true;
                    width = width.or(s.width);
                    height = height.or(s.height);
                }
                Some("audio") => has_audio = true,
                _ => {}
            }
        }
    }

    let format = parsed.format.as_ref();
    let is_still = format
        .and_then(|f| f.format_name.as_deref())
        .map(|name| name.contains("image2") || name.contains("_pipe"))
        .unwrap_or(false);

    let kind = if has_video && is_still {
        MediaKind::Image
    } else if has_video {
        MediaKind::Video
    } else {
        MediaKind::Audio
    };

    let duration_seconds = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse().ok());

    MediaInfo {
        path: path.to_path_buf(),
        kind,
        width,
        height,
        duration_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_json_parsed() {
        let json = r#"{
            "streams": [{"codec_type": "audio", "sample_rate": "44100", "channels": 2}],
            "format": {"duration": "93.25", "format_name": "mp3"}
        }"#;
        let parsed: FfprobeJson = serde_json::from_str(json).unwrap();
        let info = info_from_json(Path::new("/tmp/track.mp3"), parsed);
        assert_eq!(info.kind, MediaKind::Audio);
        assert_eq!(info.duration_seconds, Some(93.25));
    }

    #[test]
    fn test_still_image_detected() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1080, "height": 1920}],
            "format": {"format_name": "png_pipe"}
        }"#;
        let parsed: FfprobeJson = serde_json::from_str(json).unwrap();
        let info = info_from_json(Path::new("/tmp/frame.png"), parsed);
        assert_eq!(info.kind, MediaKind::Image);
        assert_eq!(info.width, Some(1080));
    }

    #[test]
    fn test_video_with_audio_is_video() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "12.0", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
        }"#;
        let parsed: FfprobeJson = serde_json::from_str(json).unwrap();
        let info = info_from_json(Path::new("/tmp/clip.mp4"), parsed);
        assert_eq!(info.kind, MediaKind::Video);
    }
}
