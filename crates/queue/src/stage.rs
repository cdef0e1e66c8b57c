//! Processing-stage tags attached to queue items.
//!
//! Informational only; control flow branches on [`ItemStatus`](crate::ItemStatus),
//! never on these strings.

pub const FILE_UPLOAD: &str = "file_upload";
pub const QUEUE_WAITING: &str = "queue_waiting";
pub const PREPROCESSING: &str = "preprocessing";
pub const VIDEO_ANALYSIS: &str = "video_analysis";
pub const ANALYSIS_COMPLETE: &str = "analysis_complete";
pub const UPLOAD_ERROR: &str = "upload_error";

/// Failure reason tags recorded in `processing_stage` when a job fails.
pub mod reason {
    pub const INSUFFICIENT_MEMORY: &str = "insufficient_memory";
    pub const CORRUPTED_SEGMENT: &str = "corrupted_segment";
    pub const PROCESSING_TIMEOUT: &str = "processing_timeout";
    pub const UNSUPPORTED_CODEC: &str = "unsupported_codec";
    pub const SERVER_OVERLOAD: &str = "server_overload";

    pub const ALL: [&str; 5] = [
        INSUFFICIENT_MEMORY,
        CORRUPTED_SEGMENT,
        PROCESSING_TIMEOUT,
        UNSUPPORTED_CODEC,
        SERVER_OVERLOAD,
    ];
}
