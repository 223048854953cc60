/// Slideshow assembly through ffmpeg.
///
/// Ordered images become a fixed-duration 9:16 video via the concat
/// demuxer. The visual track defines the output duration: audio is
/// looped at the input and the output cut at the shorter stream, so
/// shorter audio loops to fill the video and longer audio is trimmed
/// to it. Output goes to a `.tmp` sibling first and is renamed only
/// on encoder success.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("no images selected")]
    NoImages,
    #[error("caption count ({captions}) does not match image count ({images})")]
    CaptionMismatch { captions: usize, images: usize },
    #[error("ffmpeg not found on PATH; please install FFmpeg")]
    FfmpegMissing,
    #[error("ffmpeg failed: {0}")]
    Encoder(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct SlideshowOptions {
    /// Seconds each image stays on screen.
    pub image_duration_secs: f64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// One caption per image, empty string for none. Burned in with
    /// drawtext over each image's time window.
    pub captions: Option<Vec<String>>,
}

impl Default for SlideshowOptions {
    fn default() -> Self {
        Self {
            image_duration_secs: 2.5,
            fps: 30,
            width: 1080,
            height: 1920,
            captions: None,
        }
    }
}

/// Total visual-track length for N images.
pub fn video_duration_secs(image_count: usize, options: &SlideshowOptions) -> f64 {
    image_count as f64 * options.image_duration_secs
}

pub fn assemble_slideshow(
    images: &[PathBuf],
    audio: Option<&Path>,
    output: &Path,
    options: &SlideshowOptions,
) -> Result<PathBuf, AssembleError> {
    if images.is_empty() {
        return Err(AssembleError::NoImages);
    }
    if let Some(captions) = &options.captions {
        if captions.len() != images.len() {
            return Err(AssembleError::CaptionMismatch {
                captions: captions.len(),
                images: images.len(),
            });
        }
    }

    let ffmpeg = which::which("ffmpeg").map_err(|_| AssembleError::FfmpegMissing)?;

    let workdir = tempfile::tempdir()?;
    let list_path = workdir.path().join("slideshow.txt");
    let mut list = std::fs::File::create(&list_path)?;
    list.write_all(concat_list_contents(images, options.image_duration_secs).as_bytes())?;
    list.sync_all()?;

    let tmp_output = temp_output_path(output);
    let args = build_ffmpeg_args(&list_path, audio, &tmp_output, options);
    debug!(?args, "invoking ffmpeg");

    let out = Command::new(&ffmpeg)
        .args(&args)
        .output()
        .map_err(AssembleError::Io)?;
    if !out.status.success() {
        let _ = std::fs::remove_file(&tmp_output);
        return Err(AssembleError::Encoder(
            String::from_utf8_lossy(&out.stderr).into_owned(),
        ));
    }

    std::fs::rename(&tmp_output, output)?;
    info!(
        output = %output.display(),
        images = images.len(),
        duration = video_duration_secs(images.len(), options),
        "slideshow assembled"
    );
    Ok(output.to_path_buf())
}

/// Concat-demuxer list: every image with its display duration, final
/// entry repeated without one per the demuxer's convention.
pub fn concat_list_contents(images: &[PathBuf], image_duration_secs: f64) -> String {
    let mut contents = String::new();
    for image in images {
        contents.push_str(&format!(
            "file '{}'\nduration {}\n",
            escape_concat_path(image),
            image_duration_secs
        ));
    }
    if let Some(last) = images.last() {
        contents.push_str(&format!("file '{}'\n", escape_concat_path(last)));
    }
    contents
}

/// The full encoder argv. Pure so the command template is testable
/// without an encoder on PATH.
pub fn build_ffmpeg_args(
    list_path: &Path,
    audio: Option<&Path>,
    output: &Path,
    options: &SlideshowOptions,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.to_string_lossy().into_owned(),
    ];

    if let Some(audio) = audio {
        // Loop the audio input; -shortest below cuts the output at
        // the end of the visual track.
        args.push("-stream_loop".into());
        args.push("-1".into());
        args.push("-i".into());
        args.push(audio.to_string_lossy().into_owned());
    }

    args.push("-vf".into());
    args.push(video_filter(options));

    args.push("-r".into());
    args.push(options.fps.to_string());
    args.push("-c:v".into());
    args.push("libx264".into());
    args.push("-pix_fmt".into());
    args.push("yuv420p".into());

    if audio.is_some() {
        args.push("-map".into());
        args.push("0:v".into());
        args.push("-map".into());
        args.push("1:a".into());
        args.push("-c:a".into());
        args.push("aac".into());
        args.push("-shortest".into());
    }

    args.push("-movflags".into());
    args.push("+faststart".into());
    args.push(output.to_string_lossy().into_owned());
    args
}

fn video_filter(options: &SlideshowOptions) -> String {
    let (w, h) = (options.width, options.height);
    let mut filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,format=yuv420p"
    );
    if let Some(captions) = &options.captions {
        for (i, caption) in captions.iter().enumerate() {
            if caption.is_empty() {
                continue;
            }
            let start = i as f64 * options.image_duration_secs;
            let end = start + options.image_duration_secs;
            filter.push_str(&format!(
                ",drawtext=text='{}':fontcolor=white:fontsize=64:borderw=3:\
                 bordercolor=black:x=(w-text_w)/2:y=h-text_h-160:\
                 enable='between(t,{start},{end})'",
                escape_drawtext(caption)
            ));
        }
    }
    filter
}

/// Single quotes inside a concat list entry close the quote, escape
/// the quote char, and reopen.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

fn escape_drawtext(text: &str) -> String {
    text.replace('\\', r"\\")
        .replace('\'', r"\'")
        .replace(':', r"\:")
        .replace(',', r"\,")
        .replace('%', r"\%")
}

fn temp_output_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_zero_images_rejected_without_output() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("out.mp4");
        let err =
            assemble_slideshow(&[], None, &output, &SlideshowOptions::default()).unwrap_err();
        assert!(matches!(err, AssembleError::NoImages));
        assert!(!output.exists());
        assert!(!temp_output_path(&output).exists());
    }

    #[test]
    fn test_caption_count_must_match() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("out.mp4");
        let options = SlideshowOptions {
            captions: Some(vec!["one".to_string()]),
            ..SlideshowOptions::default()
        };
        let err = assemble_slideshow(&paths(&["a.png", "b.png"]), None, &output, &options)
            .unwrap_err();
        assert!(matches!(
            err,
            AssembleError::CaptionMismatch { captions: 1, images: 2 }
        ));
    }

    #[test]
    fn test_concat_list_orders_and_repeats_tail() {
        let contents = concat_list_contents(&paths(&["/a/1.png", "/a/2.png", "/a/3.png"]), 2.5);
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            [
                "file '/a/1.png'",
                "duration 2.5",
                "file '/a/2.png'",
                "duration 2.5",
                "file '/a/3.png'",
                "duration 2.5",
                "file '/a/3.png'",
            ]
        );
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let contents = concat_list_contents(&paths(&["/a/it's.png"]), 1.0);
        assert!(contents.contains(r"file '/a/it'\''s.png'"));
    }

    #[test]
    fn test_args_without_audio_have_no_audio_flags() {
        let args = build_ffmpeg_args(
            Path::new("/tmp/list.txt"),
            None,
            Path::new("/tmp/out.mp4.tmp"),
            &SlideshowOptions::default(),
        );
        assert!(!args.iter().any(|a| a == "-shortest"));
        assert!(!args.iter().any(|a| a == "-stream_loop"));
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4.tmp");
    }

    #[test]
    fn test_args_with_audio_loop_and_cut_at_video() {
        let args = build_ffmpeg_args(
            Path::new("/tmp/list.txt"),
            Some(Path::new("/tmp/track.mp3")),
            Path::new("/tmp/out.mp4.tmp"),
            &SlideshowOptions::default(),
        );
        let loop_pos = args.iter().position(|a| a == "-stream_loop").unwrap();
        let audio_pos = args.iter().position(|a| a == "/tmp/track.mp3").unwrap();
        assert!(loop_pos < audio_pos, "loop flag must precede the audio input");
        assert!(args.iter().any(|a| a == "-shortest"));
        assert!(args.iter().any(|a| a == "aac"));
    }

    #[test]
    fn test_filter_scales_and_pads_to_portrait() {
        let args = build_ffmpeg_args(
            Path::new("/tmp/list.txt"),
            None,
            Path::new("/tmp/out.mp4.tmp"),
            &SlideshowOptions::default(),
        );
        let vf_pos = args.iter().position(|a| a == "-vf").unwrap();
        let filter = &args[vf_pos + 1];
        assert!(filter.contains("scale=1080:1920:force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=1080:1920"));
        assert!(!filter.contains("drawtext"));
    }

    #[test]
    fn test_captions_window_per_image() {
        let options = SlideshowOptions {
            captions: Some(vec!["first".to_string(), String::new(), "third".to_string()]),
            ..SlideshowOptions::default()
        };
        let filter = video_filter(&options);
        assert!(filter.contains("drawtext=text='first'"));
        assert!(filter.contains("enable='between(t,0,2.5)'"));
        // Empty captions draw nothing over the second image.
        assert!(!filter.contains("between(t,2.5,5)"));
        assert!(filter.contains("drawtext=text='third'"));
        assert!(filter.contains("enable='between(t,5,7.5)'"));
    }

    #[test]
    fn test_drawtext_escaping() {
        assert_eq!(escape_drawtext("it's 100%: a, b"), r"it\'s 100\%\: a\, b");
    }

    #[test]
    fn test_expected_duration() {
        let options = SlideshowOptions::default();
        assert_eq!(video_duration_secs(4, &options), 10.0);
    }
}
