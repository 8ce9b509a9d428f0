//! Writes synthesized segments to disk for playback elsewhere.

use std::path::{Path, PathBuf};

/// Numbered MP3 files in one directory, in arrival order.
#[derive(Debug)]
pub struct AudioWriter {
    dir: PathBuf,
    written: u64,
}

impl AudioWriter {
    /// Create the directory if needed.
    pub async fn create(dir: &Path) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    /// Write one segment; returns the file path.
    pub async fn write(&mut self, sentence_id: u64, audio: &[u8]) -> std::io::Result<PathBuf> {
        self.written += 1;
        let path = self
            .dir
            .join(format!("{:04}-s{sentence_id}.mp3", self.written));
        tokio::fs::write(&path, audio).await?;
        tracing::debug!(path = %path.display(), bytes = audio.len(), "Audio segment written");
        Ok(path)
    }

    pub const fn written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn segments_are_numbered_in_arrival_order() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("audio");
        let mut writer = AudioWriter::create(&dir).await.unwrap();

        let first = writer.write(1, b"one").await.unwrap();
        let second = writer.write(1, b"two").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "0001-s1.mp3");
        assert_eq!(second.file_name().unwrap(), "0002-s1.mp3");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert_eq!(writer.written(), 2);
    }
}
