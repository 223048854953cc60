mod assemble;
mod probe;

pub use assemble::{
    assemble_slideshow, build_ffmpeg_args, concat_list_contents, video_duration_secs,
    AssembleError, SlideshowOptions,
};
pub use probe::{probe_media, MediaInfo, MediaKind, ProbeError};
