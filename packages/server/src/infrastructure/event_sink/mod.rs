//! イベント出力（EventSink）の実装
//!
//! - `tracing_sink`: tracing のログレコードとして出力
//! - `file`: 追記専用のログファイルに出力

pub mod file;
pub mod tracing_sink;

pub use file::FileEventSink;
pub use tracing_sink::TracingEventSink;
