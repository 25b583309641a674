use std::io;

/// Builder for indented configuration text (nginx site definitions and similar block formats).
///
/// Invariants:
/// - Each pushed line must not contain `\n`, `\r`, or `\0`.
/// - Lines inside `open`/`close` pairs are indented by four spaces per level.
/// - `build_lf()` joins lines with `\n` and ensures a trailing `\n` when non-empty.
#[derive(Debug, Default)]
pub struct TextLines {
    lines: Vec<String>,
    depth: usize,
}

impl TextLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one logical line at the current indentation.
    pub fn push(&mut self, line: impl Into<String>) -> &mut Self {
        let line = line.into();
        if line.is_empty() {
            self.lines.push(line);
        } else {
            self.lines.push(format!("{}{}", "    ".repeat(self.depth), line));
        }
        self
    }

    /// Push `<header> {` and indent following lines.
    pub fn open(&mut self, header: &str) -> &mut Self {
        self.push(format!("{header} {{"));
        self.depth += 1;
        self
    }

    /// Dedent and push the closing brace.
    pub fn close(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.push("}")
    }

    pub fn build_lf(&self) -> io::Result<String> {
        for (i, l) in self.lines.iter().enumerate() {
            if l.contains('\n') || l.contains('\r') || l.contains('\0') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("text line {i} contains a newline or NUL; use atomic lines"),
                ));
            }
        }
        if self.depth != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} block(s) left open", self.depth),
            ));
        }

        if self.lines.is_empty() {
            return Ok(String::new());
        }

        let mut out = self.lines.join("\n");
        out.push('\n');
        Ok(out)
    }
}
