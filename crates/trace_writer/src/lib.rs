//! # Trace Writer
//!
//! XVIZ JSON 输出：将 `XvizMessage` 流写入 `Source`。
//!
//! ## 目录布局
//!
//! ```text
//! output/
//! ├── 0-frame.json   # index, written on close
//! ├── 1-frame.json   # xviz/metadata
//! ├── 2-frame.json   # first xviz/state_update
//! └── ...
//! ```

mod json_writer;
mod log;
mod source;

pub use json_writer::{IndexEntry, TraceIndex, WriterStats, XvizJsonWriter};
pub use log::LogSink;
pub use source::{DirectorySource, MemorySource, Source};
