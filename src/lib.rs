pub mod bitrate;
pub mod compress;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod size;

pub use compress::{
    CompressEvent, CompressEventSink, CompressOutcome, CompressPlan, CompressReport, EncodePlan,
    SkipReport, compress_video, plan_compression,
};
pub use config::CompressOptions;
pub use error::AppError;
