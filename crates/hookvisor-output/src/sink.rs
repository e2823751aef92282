//! Append-only output sinks.

use hookvisor_common::{StreamType, SupervisorError, SupervisorResult};
use std::fs::OpenOptions;
use std::path::Path;
use tokio::fs::File;

/// Open (creating if absent) the sink file for one stream in append mode.
///
/// Parent directories are created as needed.
pub fn open_sink(stream: StreamType, path: &Path) -> SupervisorResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| SupervisorError::sink_open(stream, path, e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SupervisorError::sink_open(stream, path, e))?;

    tracing::debug!(%stream, path = %path.display(), "Output sink opened");
    Ok(File::from_std(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_sink_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("command.out");

        let mut sink = open_sink(StreamType::Stdout, &path).unwrap();
        sink.write_all(b"first\n").await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);

        let mut sink = open_sink(StreamType::Stdout, &path).unwrap();
        sink.write_all(b"second\n").await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_unopenable_sink_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for writing.
        let err = open_sink(StreamType::Stderr, dir.path()).unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::SinkOpen {
                stream: StreamType::Stderr,
                ..
            }
        ));
    }
}
