use std::io;

/// Builder for scripts that are piped to a remote `sh -s`.
///
/// Invariants:
/// - Fragments must not contain `\n` or `\r` (keeps each fragment a single shell statement).
/// - Fragments are joined with `; ` into a single line.
/// - Values are never formatted into fragments; scripts read them from `$1`, `$2`, ...
#[derive(Debug, Default, Clone)]
pub struct ShellScript {
    parts: Vec<String>,
}

impl ShellScript {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Start with `set -eu` so the first failing statement aborts the script.
    pub fn strict() -> Self {
        let mut s = Self::new();
        s.push("set -eu");
        s
    }

    pub fn push(&mut self, cmd: impl Into<String>) -> &mut Self {
        self.parts.push(cmd.into());
        self
    }

    pub fn extend<I>(&mut self, cmds: I) -> &mut Self
    where
        I: IntoIterator<Item = String>,
    {
        for c in cmds {
            self.parts.push(c);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn build(&self) -> io::Result<String> {
        for (i, p) in self.parts.iter().enumerate() {
            if p.contains('\n') || p.contains('\r') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("shell script fragment {i} contains a newline; use atomic fragments"),
                ));
            }
        }
        let out = self.parts.join("; ");
        debug_assert!(!out.contains('\n') && !out.contains('\r'));
        Ok(out)
    }
}
