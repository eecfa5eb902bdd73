use std::io::{BufRead, BufReader, ErrorKind, Lines, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::{Context, Result, bail};

pub type ChunkStream<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// The language model answering location-analysis prompts.
///
/// Replies must be idempotent for identical prompts, otherwise cached
/// directives would disagree with fresh ones.
pub trait DirectiveModel {
    fn send(&self, prompt: &str) -> Result<String>;

    /// Reply as a sequence of text chunks. Callers drain and concatenate the
    /// whole stream before parsing.
    fn stream<'a>(&'a self, prompt: &str) -> Result<ChunkStream<'a>> {
        let reply = self.send(prompt)?;
        Ok(Box::new(std::iter::once(Ok(reply))))
    }
}

impl<F> DirectiveModel for F
where
    F: Fn(&str) -> Result<String>,
{
    fn send(&self, prompt: &str) -> Result<String> {
        self(prompt)
    }
}

/// Runs an external program per prompt: the prompt goes to stdin, the reply
/// is read from stdout. Transport concerns (HTTP, retries, timeouts) live in
/// that program.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    /// Splits `command_line` on whitespace; quoting is not interpreted.
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(ToOwned::to_owned);
        let Some(program) = parts.next() else {
            bail!("model command is empty");
        };
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn spawn(
        &self,
        prompt: &str,
        stderr: Stdio,
    ) -> Result<(Child, JoinHandle<std::io::Result<()>>)> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .spawn()
            .with_context(|| format!("failed to execute model command {}", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .context("model command stdin was not captured")?;
        let payload = prompt.to_owned();
        let writer = std::thread::spawn(move || stdin.write_all(payload.as_bytes()));

        Ok((child, writer))
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<&str>>()
            .join(" ")
    }
}

impl DirectiveModel for CommandModel {
    fn send(&self, prompt: &str) -> Result<String> {
        let (child, writer) = self.spawn(prompt, Stdio::piped())?;
        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for model command {}", self.program))?;
        join_writer(writer, &self.program)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "model command returned non-zero exit status ({}): {}",
                self.describe(),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn stream<'a>(&'a self, prompt: &str) -> Result<ChunkStream<'a>> {
        let (mut child, writer) = self.spawn(prompt, Stdio::inherit())?;
        let stdout = child
            .stdout
            .take()
            .context("model command stdout was not captured")?;

        Ok(Box::new(CommandChunks {
            model: self,
            lines: BufReader::new(stdout).lines(),
            child: Some(child),
            writer: Some(writer),
        }))
    }
}

struct CommandChunks<'a> {
    model: &'a CommandModel,
    lines: Lines<BufReader<ChildStdout>>,
    child: Option<Child>,
    writer: Option<JoinHandle<std::io::Result<()>>>,
}

impl CommandChunks<'_> {
    fn finish(&mut self) -> Option<Result<String>> {
        let child = self.child.take()?;
        self.wait_child(child).err().map(Err)
    }

    fn wait_child(&mut self, mut child: Child) -> Result<()> {
        let status = child
            .wait()
            .with_context(|| format!("failed to wait for model command {}", self.model.program))?;
        if let Some(writer) = self.writer.take() {
            join_writer(writer, &self.model.program)?;
        }
        if !status.success() {
            bail!(
                "model command returned non-zero exit status ({}): {status}",
                self.model.describe()
            );
        }
        Ok(())
    }
}

impl Iterator for CommandChunks<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.as_ref()?;
        match self.lines.next() {
            Some(Ok(line)) => Some(Ok(format!("{line}\n"))),
            Some(Err(err)) => {
                let _ = self.finish();
                Some(Err(err).context("failed to read model command output"))
            }
            None => self.finish(),
        }
    }
}

/// A program that answers without reading its whole stdin closes the pipe
/// early; that is not a failure.
fn join_writer(writer: JoinHandle<std::io::Result<()>>, program: &str) -> Result<()> {
    match writer.join() {
        Ok(Err(err)) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
        Ok(result) => {
            result.with_context(|| format!("failed to write prompt to model command {program}"))
        }
        Err(_) => bail!("prompt writer thread for model command {program} panicked"),
    }
}
