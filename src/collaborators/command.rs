use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::types::CollaboratorError;

const STDERR_LIMIT: usize = 2000;

/// An external program spoken to with one JSON request on stdin and one JSON
/// response on stdout.
///
/// The child is killed if it outlives `timeout` or if the caller's future is
/// dropped.
#[derive(Debug, Clone)]
pub struct CommandCollaborator {
    role: &'static str,
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandCollaborator {
    /// Fails with [`CollaboratorError::Unavailable`] when no command is configured.
    pub fn new(
        role: &'static str,
        argv: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        match argv.first() {
            Some(program) if !program.trim().is_empty() => Ok(Self {
                role,
                argv,
                timeout,
            }),
            _ => Err(CollaboratorError::Unavailable {
                role,
                reason: format!("no command configured under collaborators.{role}"),
            }),
        }
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    fn display(&self) -> String {
        self.argv.join(" ")
    }

    pub async fn call<Req, Resp>(&self, request: &Req) -> Result<Resp, CollaboratorError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let command = self.display();
        let payload = serde_json::to_vec(request).map_err(|source| CollaboratorError::Decode {
            command: command.clone(),
            source,
        })?;

        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CollaboratorError::Spawn {
                command: command.clone(),
                source,
            })?;

        let Some(mut stdin) = child.stdin.take() else {
            return Err(CollaboratorError::Failed(format!("`{command}` has no stdin")));
        };
        // Feed stdin concurrently so a child that writes before reading cannot deadlock us.
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            written
        });

        debug!(role = self.role, command = %command, "collaborator started");
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(CollaboratorError::Spawn { command, source }),
            Err(_) => {
                writer.abort();
                return Err(CollaboratorError::Timeout {
                    command,
                    secs: self.timeout.as_secs(),
                });
            }
        };
        // A child that exits without reading stdin breaks the pipe; its exit status decides.
        let _ = writer.await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(STDERR_LIMIT).collect();
            return Err(CollaboratorError::Exit {
                command,
                code: output.status.code(),
                stderr,
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|source| CollaboratorError::Decode { command, source })
    }
}
