//! FTP implementation of [`MirrorStore`].

use std::io::Cursor;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};
use tracing::debug;

use super::{MirrorError, MirrorStore};
use crate::config::{HttpConfig, MirrorConfig};
use crate::transport::RetryPolicy;

/// Connection settings shared by every session.
#[derive(Debug, Clone)]
struct Credentials {
    host: String,
    port: u16,
    username: String,
    password: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

/// One FTP session per operation: connect, log in, change directory, act,
/// quit. Sessions run on the blocking pool.
pub struct FtpMirrorStore {
    credentials: Credentials,
    retry: RetryPolicy,
}

impl FtpMirrorStore {
    pub fn new(mirror: &MirrorConfig, http: &HttpConfig) -> Self {
        Self {
            credentials: Credentials {
                host: mirror.host.clone(),
                port: mirror.port,
                username: mirror.username.clone(),
                password: mirror.password.clone(),
                connect_timeout: Duration::from_secs(http.connect_timeout_secs),
                read_timeout: Duration::from_secs(http.read_timeout_secs),
            },
            retry: RetryPolicy::from_config(http),
        }
    }

    async fn with_session<T, F>(&self, operation: String, dir: &str, action: F) -> Result<T, MirrorError>
    where
        T: Send + 'static,
        F: Fn(&mut FtpStream) -> Result<T, FtpError> + Clone + Send + 'static,
    {
        self.retry
            .run(&operation, || {
                let credentials = self.credentials.clone();
                let dir = dir.to_string();
                let action = action.clone();
                let operation = operation.clone();
                async move {
                    let joined = tokio::task::spawn_blocking(move || {
                        let mut session = open_session(&credentials, &dir)?;
                        let result = action(&mut session);
                        // a failed QUIT does not undo a completed transfer
                        let _ = session.quit();
                        result
                    })
                    .await;
                    match joined {
                        Ok(result) => result.map_err(|e| remote_error(&operation, e)),
                        Err(e) => Err(MirrorError::Remote {
                            operation,
                            message: e.to_string(),
                            retryable: false,
                        }),
                    }
                }
            })
            .await
    }
}

fn resolve(credentials: &Credentials) -> Result<SocketAddr, FtpError> {
    (credentials.host.as_str(), credentials.port)
        .to_socket_addrs()
        .map_err(FtpError::ConnectionError)?
        .next()
        .ok_or_else(|| {
            FtpError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not resolve", credentials.host),
            ))
        })
}

fn open_session(credentials: &Credentials, dir: &str) -> Result<FtpStream, FtpError> {
    let addr = resolve(credentials)?;
    let mut session = FtpStream::connect_timeout(addr, credentials.connect_timeout)?;
    session
        .get_ref()
        .set_read_timeout(Some(credentials.read_timeout))
        .map_err(FtpError::ConnectionError)?;
    session.login(credentials.username.as_str(), credentials.password.as_str())?;
    session.transfer_type(FileType::Binary)?;
    if !dir.is_empty() && session.cwd(dir).is_err() {
        debug!("Creating mirror directory {}", dir);
        session.mkdir(dir)?;
        session.cwd(dir)?;
    }
    Ok(session)
}

fn remote_error(operation: &str, error: FtpError) -> MirrorError {
    let retryable = match &error {
        FtpError::ConnectionError(_) => true,
        // 4xx replies are transient by definition
        FtpError::UnexpectedResponse(response) => (400..500).contains(&response.status.code()),
        _ => false,
    };
    MirrorError::Remote {
        operation: operation.to_string(),
        message: error.to_string(),
        retryable,
    }
}

fn is_missing_file(error: &FtpError) -> bool {
    matches!(
        error,
        FtpError::UnexpectedResponse(response) if response.status.code() == Status::FileUnavailable.code()
    )
}

#[async_trait]
impl MirrorStore for FtpMirrorStore {
    fn name(&self) -> &str {
        "ftp"
    }

    async fn put(&self, dir: &str, file_name: &str, content: Vec<u8>) -> Result<(), MirrorError> {
        let name = file_name.to_string();
        let size = content.len();
        self.with_session(format!("put {}/{}", dir, file_name), dir, move |session| {
            session.put_file(name.as_str(), &mut Cursor::new(&content))?;
            Ok(())
        })
        .await?;
        debug!(dir, file_name, size, "Uploaded to FTP mirror");
        Ok(())
    }

    async fn delete(&self, dir: &str, file_name: &str) -> Result<(), MirrorError> {
        let name = file_name.to_string();
        self.with_session(format!("delete {}/{}", dir, file_name), dir, move |session| {
            match session.rm(name.as_str()) {
                Ok(()) => Ok(()),
                Err(e) if is_missing_file(&e) => {
                    debug!("{} was already gone from the mirror", name);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .await
    }
}
