//! Runners: produce a response for a prompt and its conversation history.

use anyhow::{bail, Context};
use futures::future::{BoxFuture, FutureExt};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::case::HistoryItem;

/// A response backend.
pub trait Runner: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [HistoryItem],
    ) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// Wraps a synchronous closure as a runner.
pub struct FnRunner<F> {
    name: String,
    f: F,
}

impl<F> FnRunner<F>
where
    F: Fn(&str, &[HistoryItem]) -> anyhow::Result<String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Runner for FnRunner<F>
where
    F: Fn(&str, &[HistoryItem]) -> anyhow::Result<String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [HistoryItem],
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        async move { (self.f)(prompt, history) }.boxed()
    }
}

/// Runs an external program per prompt.
///
/// The history (one `role: content` line per turn) followed by the prompt is
/// written to the program's stdin; its trimmed stdout is the response.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, args...]` command line.
    pub fn from_command(name: impl Into<String>, command: &[String]) -> anyhow::Result<Self> {
        let name = name.into();
        let Some((program, args)) = command.split_first() else {
            bail!("runner {:?} has an empty command", name);
        };
        Ok(Self::new(name, program.clone(), args.to_vec()))
    }

    async fn execute(&self, input: String) -> anyhow::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start runner {:?} ({})", self.name, self.program))?;

        // Feed stdin while stdout is drained, or a child that streams its
        // output back blocks on a full pipe.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = futures::join!(feed, child.wait_with_output());
        let output = output.with_context(|| format!("runner {:?} did not finish", self.name))?;

        if !output.status.success() {
            bail!(
                "runner {:?} exited with {}: {}",
                self.name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        match fed {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(e).with_context(|| format!("failed to write prompt to runner {:?}", self.name));
            }
            _ => {}
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Text sent to a command runner.
pub fn render_input(prompt: &str, history: &[HistoryItem]) -> String {
    let mut input = String::new();
    for item in history {
        input.push_str(&format!("{}: {}\n", item.role, item.content));
    }
    input.push_str(prompt);
    input
}

impl Runner for CommandRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [HistoryItem],
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        self.execute(render_input(prompt, history)).boxed()
    }
}
