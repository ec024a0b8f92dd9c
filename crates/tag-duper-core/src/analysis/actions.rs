use super::resolution::RankedGroup;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Whatever gets to delete duplicates during a resolution pass.
///
/// It receives a whole batch and may delete any subset of the listed
/// existing paths; the resolver finds out what happened by re-checking
/// the filesystem afterwards.
pub trait RemovalAction {
    fn remove(&mut self, batch: &[RankedGroup]) -> io::Result<()>;
}

impl<F> RemovalAction for F
where
    F: FnMut(&[RankedGroup]) -> io::Result<()>,
{
    fn remove(&mut self, batch: &[RankedGroup]) -> io::Result<()> {
        self(batch)
    }
}

fn batch_paths(batch: &[RankedGroup]) -> Vec<PathBuf> {
    batch.iter().flat_map(|g| g.existing.iter().cloned()).collect()
}

/// A user-supplied shell command. Paths are appended as arguments, or fed
/// one per line on stdin.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    command: String,
    use_stdin: bool,
}

impl ExternalCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            use_stdin: false,
        }
    }

    pub fn with_stdin(mut self, use_stdin: bool) -> Self {
        self.use_stdin = use_stdin;
        self
    }

    #[cfg(not(windows))]
    fn shell(&self, paths: &[PathBuf]) -> Command {
        let mut cmd = Command::new("sh");
        if self.use_stdin {
            cmd.arg("-c").arg(&self.command);
        } else {
            // paths reach the command as "$@", unsplit and unglobbed
            cmd.arg("-c")
                .arg(format!("{} \"$@\"", self.command))
                .arg("tag-duper")
                .args(paths);
        }
        cmd
    }

    #[cfg(windows)]
    fn shell(&self, paths: &[PathBuf]) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(&self.command);
        if !self.use_stdin {
            cmd.args(paths);
        }
        cmd
    }
}

impl RemovalAction for ExternalCommand {
    fn remove(&mut self, batch: &[RankedGroup]) -> io::Result<()> {
        let paths = batch_paths(batch);
        debug!("Running '{}' on {} paths", self.command, paths.len());

        let mut cmd = self.shell(&paths);
        let status = if self.use_stdin {
            let mut child = cmd.stdin(Stdio::piped()).spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                let written = paths
                    .iter()
                    .try_for_each(|path| writeln!(stdin, "{}", path.display()));
                match written {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        warn!("'{}' stopped reading its input early", self.command)
                    }
                    Err(e) => return Err(e),
                }
            }
            child.wait()?
        } else {
            cmd.status()?
        };

        // exit status does not decide anything; removals are detected on disk
        if !status.success() {
            warn!("'{}' exited with {}", self.command, status);
        }
        Ok(())
    }
}

/// Built-in action: keep the best-ranked existing member of each group and
/// delete the rest.
#[derive(Debug, Default)]
pub struct KeepHighest;

impl RemovalAction for KeepHighest {
    fn remove(&mut self, batch: &[RankedGroup]) -> io::Result<()> {
        for group in batch {
            let Some(keep) = group.existing.last() else {
                continue;
            };
            for path in group.existing.iter().filter(|p| *p != keep) {
                match fs::remove_file(path) {
                    Ok(()) => info!("Removed {} (keeping {})", path.display(), keep.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }
}
