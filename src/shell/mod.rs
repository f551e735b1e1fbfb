//! Shell process handling
//!
//! Spawns the user's shell behind a pseudoterminal and shuttles bytes between
//! it and the engine. The engine consumes `&str`, so this module also owns
//! the UTF-8 boundary: [`OutputDecoder`] turns raw pty reads into complete
//! character data, carrying partial multi-byte sequences across reads.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::ShellPty;

/// Error type for shell/pty operations
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("failed to open pty master: {0}")]
    OpenMaster(#[source] nix::Error),

    #[error("failed to prepare pty slave: {0}")]
    PrepareSlave(#[source] nix::Error),

    #[error("failed to fork: {0}")]
    Fork(#[source] nix::Error),

    #[error("failed to create session: {0}")]
    Setsid(#[source] nix::Error),

    #[error("failed to wire pty to standard descriptors: {0}")]
    Dup2(#[source] nix::Error),

    #[error("failed to execute shell: {0}")]
    Exec(#[source] nix::Error),

    #[error("failed to set window size: {0}")]
    SetWinsize(#[source] nix::Error),

    #[error("failed to read from pty: {0}")]
    Read(#[source] nix::Error),

    #[error("failed to write to pty: {0}")]
    Write(#[source] nix::Error),

    #[error("failed to set non-blocking mode: {0}")]
    SetNonBlocking(#[source] nix::Error),

    #[error("failed to poll: {0}")]
    Poll(#[source] nix::Error),

    #[error("failed to wait for child: {0}")]
    Wait(#[source] nix::Error),

    #[error("shell path contains a null byte")]
    NullInPath,
}

pub type ShellResult<T> = Result<T, ShellError>;

/// Incremental UTF-8 decoder for pty output.
///
/// A read can end mid-character; the undecodable tail is held back and
/// prepended to the next chunk. Genuinely invalid bytes become replacement
/// characters rather than stalling the stream.
#[derive(Debug, Default)]
pub struct OutputDecoder {
    pending: Vec<u8>,
}

impl OutputDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk of raw bytes, returning every complete character seen
    /// so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                let out = s.to_string();
                self.pending.clear();
                out
            }
            Err(e) => {
                let valid = e.valid_up_to();
                // error_len is None only for an incomplete final sequence
                if e.error_len().is_none() && self.pending.len() - valid < 4 {
                    let out = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                    self.pending.drain(..valid);
                    out
                } else {
                    let out = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    out
                }
            }
        }
    }
}

/// Pick the shell to spawn: the configured program if set, else `$SHELL`,
/// else `/bin/sh`.
pub fn default_shell(configured: Option<&str>) -> String {
    match configured {
        Some(program) => program.to_string(),
        None => std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_passes_ascii_through() {
        let mut dec = OutputDecoder::new();
        assert_eq!(dec.decode(b"hello"), "hello");
    }

    #[test]
    fn decoder_carries_split_multibyte() {
        let mut dec = OutputDecoder::new();
        let snowman = "\u{2603}".as_bytes();
        assert_eq!(dec.decode(&snowman[..1]), "");
        assert_eq!(dec.decode(&snowman[1..]), "\u{2603}");
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut dec = OutputDecoder::new();
        let out = dec.decode(b"a\xffb");
        assert_eq!(out, "a\u{fffd}b");
    }

    #[test]
    fn configured_shell_wins() {
        assert_eq!(default_shell(Some("/bin/zsh")), "/bin/zsh");
    }
}
