use crate::workspace::Workspace;
use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::Path,
    process::{Command, Stdio},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, info};

const CHUNK_SIZE: usize = 8192;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("server answered HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("extraction failed: {0}")]
    Archive(String),
}

impl FetchError {
    fn io(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| FetchError::Io { context, source }
    }
}

/// Produces the extracted map package inside a workspace.
pub trait ArchiveSource {
    /// `progress` receives `(downloaded, total)` in bytes; `total` is 0 when unknown.
    fn fetch(
        &self,
        workspace: &Workspace,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<(), FetchError>;
}

/// Streams the package over HTTP, then unpacks it as 7z.
pub struct RemoteArchive {
    url: String,
    user_agent: String,
}

impl RemoteArchive {
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: user_agent.into(),
        }
    }

    fn download(&self, dest: &Path, progress: &mut dyn FnMut(u64, u64)) -> Result<u64, FetchError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .build();
        let response = agent
            .get(&self.url)
            .set("User-Agent", &self.user_agent)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(status, _) => FetchError::Status {
                    status,
                    url: self.url.clone(),
                },
                ureq::Error::Transport(transport) => FetchError::Network(transport.to_string()),
            })?;

        let total = response
            .header("Content-Length")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0);
        info!(url = %self.url, total, "downloading map package");

        let mut reader = response.into_reader();
        let mut file = File::create(dest).map_err(FetchError::io("create archive file"))?;
        copy_with_progress(&mut reader, &mut file, total, progress)
    }
}

impl ArchiveSource for RemoteArchive {
    fn fetch(
        &self,
        workspace: &Workspace,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<(), FetchError> {
        let downloaded = self.download(&workspace.archive_path, progress)?;
        debug!(bytes = downloaded, "download complete");
        extract_7z(&workspace.archive_path, &workspace.extract_dir)
    }
}

fn copy_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    total: u64,
    progress: &mut dyn FnMut(u64, u64),
) -> Result<u64, FetchError> {
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut downloaded = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FetchError::Network(err.to_string())),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(FetchError::io("write archive file"))?;
        downloaded += read as u64;
        progress(downloaded, total);
    }
    writer.flush().map_err(FetchError::io("flush archive file"))?;
    Ok(downloaded)
}

pub fn format_progress(downloaded: u64, total: u64) -> String {
    format!(
        "Progress: {:.1}MB / {:.1}MB",
        downloaded as f64 / BYTES_PER_MB,
        total as f64 / BYTES_PER_MB
    )
}

/// Unpacks with a system `7z` when one is installed, otherwise in-process.
pub fn extract_7z(path: &Path, dest: &Path) -> Result<(), FetchError> {
    fs::create_dir_all(dest).map_err(FetchError::io("create extract dir"))?;
    match extract_with_7z(path, dest)? {
        Some(()) => Ok(()),
        None => sevenz_rust::decompress_file(path, dest)
            .map_err(|err| FetchError::Archive(err.to_string())),
    }
}

fn extract_with_7z(path: &Path, dest: &Path) -> Result<Option<()>, FetchError> {
    let output = Command::new("7z")
        .arg("x")
        .arg("-y")
        .arg(format!("-o{}", dest.display()))
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();

    let output = match output {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(FetchError::Io {
            context: "launch 7z",
            source: err,
        }),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FetchError::Archive(stderr.trim().to_string()));
    }

    Ok(Some(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn progress_reports_cumulative_bytes() {
        let payload = vec![7u8; CHUNK_SIZE * 2 + 100];
        let mut reader = Cursor::new(payload.clone());
        let mut written = Vec::new();
        let mut seen = Vec::new();

        let total = copy_with_progress(&mut reader, &mut written, 0, &mut |done, total| {
            seen.push((done, total))
        })
        .unwrap();

        assert_eq!(total, payload.len() as u64);
        assert_eq!(written, payload);
        assert_eq!(seen.last(), Some(&(payload.len() as u64, 0)));
        assert!(seen.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn progress_line_in_megabytes() {
        assert_eq!(format_progress(0, 0), "Progress: 0.0MB / 0.0MB");
        assert_eq!(
            format_progress(1024 * 1024 * 3 / 2, 10 * 1024 * 1024),
            "Progress: 1.5MB / 10.0MB"
        );
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("map_files.7z");
        fs::write(&archive, b"definitely not a 7z archive").unwrap();

        let result = extract_7z(&archive, &dir.path().join("map_files"));

        assert!(matches!(result, Err(FetchError::Archive(_))));
    }

    #[test]
    fn unreachable_host_is_a_network_error() {
        let source = RemoteArchive::new("http://127.0.0.1:9/map_files.7z", "mapsmith-test");
        let dir = tempdir().unwrap();
        let workspace = Workspace::new(dir.path().join("a.7z"), dir.path().join("a"));

        let result = source.fetch(&workspace, &mut |_, _| {});

        assert!(matches!(result, Err(FetchError::Network(_))));
        assert!(!workspace.extract_dir.exists());
    }
}
