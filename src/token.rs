use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The shared bearer token on disk, readable only by its owner.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.weekly-report-ai/server.token`, or a file in the working directory
    /// when no home directory is known.
    pub fn default_location() -> Self {
        match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            Some(home) => Self::new(
                PathBuf::from(home)
                    .join(".weekly-report-ai")
                    .join("server.token"),
            ),
            None => Self::new("weekly-report-ai.token"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored token, or `None` when the file is missing or blank.
    pub fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn store(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        options.open(&self.path)?.write_all(token.as_bytes())
    }
}

/// Token the server accepts: the explicit one (persisted for clients), else the
/// stored one, else a freshly generated one.
pub fn resolve_server_token(file: &TokenFile, explicit: Option<String>) -> io::Result<String> {
    let token = match explicit {
        Some(token) => token,
        None => match file.load()? {
            Some(token) => return Ok(token),
            None => Uuid::new_v4().to_string(),
        },
    };
    file.store(&token)?;
    Ok(token)
}

pub fn resolve_client_token(file: &TokenFile, explicit: Option<String>) -> anyhow::Result<String> {
    if let Some(token) = explicit {
        return Ok(token);
    }

    file.load()?.ok_or_else(|| {
        anyhow::anyhow!(
            "No auth token found in {}; pass --token, set WEEKLY_AI_TOKEN, or start the server to create one.",
            file.path().display()
        )
    })
}
