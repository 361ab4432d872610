use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};
use tracing::trace;

use crate::backends::Sink;
use crate::common::{Delivery, Payload};

// -- 🚰 FileSinkConfig: lives next to the FileSink that uses it. One backend, one config, one file.
#[derive(Debug, Deserialize, Clone)]
pub struct FileSinkConfig {
    pub file_name: String,
}

/// 🚰 FileSink: receives encoded payloads and writes their documents to disk. I/O only.
///
/// ⚠️ `File::create` truncates if the file exists. No warning. No backup. Just gone.
/// He who runs this without checking the output path, re-simulates in shame.
#[derive(Debug)]
pub(crate) struct FileSink {
    file_buf: io::BufWriter<File>,
    sink_config: FileSinkConfig,
}

impl FileSink {
    /// 🚀 Creates (or obliterates and recreates) the sink file and wraps it in a BufWriter.
    pub(crate) async fn new(sink_config: FileSinkConfig) -> Result<Self> {
        let file_handle = File::create(&sink_config.file_name).await.with_context(|| {
            format!(
                "💀 The sink file '{}' could not be conjured into existence. \
                 We stared at the path. The path stared back. \
                 One of us was wrong about whether the parent directory existed.",
                sink_config.file_name
            )
        })?;
        // -- 📦 BufWriter: because one syscall per document is a war crime.
        let file_buf = io::BufWriter::new(file_handle);
        Ok(Self {
            file_buf,
            sink_config,
        })
    }
}

#[async_trait]
impl Sink for FileSink {
    /// 📡 Write every document in order. The file never says no, so delivery is always clean.
    async fn send(&mut self, payload: &Payload) -> Result<Delivery> {
        trace!(
            "📬 batch {} ({} records, {} bytes) walked into the file sink",
            payload.sequence,
            payload.len(),
            payload.total_bytes()
        );
        for document in &payload.documents {
            self.file_buf
                .write_all(document.as_bytes())
                .await
                .with_context(|| {
                    format!(
                        "💀 Writing batch {} to '{}' failed. The disk has had enough.",
                        payload.sequence, self.sink_config.file_name
                    )
                })?;
        }
        Ok(Delivery::clean(payload.len()))
    }

    /// 🗑️ Flush the BufWriter. Async Drop isn't a thing, so this is the only flush you get.
    async fn close(&mut self) -> Result<()> {
        trace!("🎬 final flush of '{}'", self.sink_config.file_name);
        self.file_buf.flush().await.with_context(|| {
            format!(
                "💀 Error flushing '{}'. The bytes were in the buffer, they could SEE the disk, \
                 and then the flush failed.",
                self.sink_config.file_name
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_documents_land_back_to_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.json");
        let mut sink = FileSink::new(FileSinkConfig {
            file_name: path.to_string_lossy().into_owned(),
        })
        .await?;

        let first = Payload {
            sequence: 0,
            documents: vec!["{\"n\":0}\n".into(), "{\"n\":1}\n".into()],
        };
        let second = Payload {
            sequence: 1,
            documents: vec!["{\"n\":2}\n".into()],
        };
        assert_eq!(sink.send(&first).await?, Delivery::clean(2));
        assert_eq!(sink.send(&second).await?, Delivery::clean(1));
        sink.close().await?;

        let written = tokio::fs::read_to_string(&path).await?;
        assert_eq!(written, "{\"n\":0}\n{\"n\":1}\n{\"n\":2}\n");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_parent_directory_is_imaginary() {
        let result = FileSink::new(FileSinkConfig {
            file_name: "/definitely/not/a/real/dir/out.json".into(),
        })
        .await;
        assert!(result.is_err());
    }
}
