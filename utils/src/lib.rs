use std::io::{BufWriter, Write};

/// Destination of a diagnostic stream: either a real writer or an in-memory
/// buffer that tests can inspect afterwards.
enum Sink {
    Buffer(Vec<u8>),
    Stream(BufWriter<Box<dyn Write>>),
}

impl Sink {
    fn write_str(&mut self, msg: &str) {
        match self {
            Sink::Buffer(inner) => inner.extend_from_slice(msg.as_bytes()),
            Sink::Stream(inner) => inner
                .write_all(msg.as_bytes())
                .expect("Failed to write to output stream."),
        }
    }

    fn contents(&self) -> Option<String> {
        match self {
            Sink::Buffer(inner) => Some(String::from_utf8_lossy(inner).into_owned()),
            Sink::Stream(_) => None,
        }
    }

    fn flush(&mut self) {
        if let Sink::Stream(inner) = self {
            inner.flush().expect("Failed to flush output stream.");
        }
    }
}

/// Collects everything a tool wants to tell its user. Findings of an
/// analysis are warnings on the regular output, problems with the input
/// are errors on the error output.
pub struct DiagnosticEmitter {
    out: Sink,
    err: Sink,
    warnings: usize,
    errors: usize,
}

impl DiagnosticEmitter {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            out: Sink::Stream(BufWriter::new(out)),
            err: Sink::Stream(BufWriter::new(err)),
            warnings: 0,
            errors: 0,
        }
    }

    pub fn log_to_buffer() -> Self {
        Self {
            out: Sink::Buffer(Vec::new()),
            err: Sink::Buffer(Vec::new()),
            warnings: 0,
            errors: 0,
        }
    }

    pub fn out(&mut self, msg: &str) {
        self.out.write_str(msg);
    }

    pub fn out_ln(&mut self, msg: &str) {
        self.out(msg);
        self.out("\n");
    }

    pub fn err(&mut self, msg: &str) {
        self.err.write_str(msg);
    }

    pub fn err_ln(&mut self, msg: &str) {
        self.err(msg);
        self.err("\n");
    }

    pub fn out_buffer(&self) -> Option<String> {
        self.out.contents()
    }

    pub fn err_buffer(&self) -> Option<String> {
        self.err.contents()
    }

    pub fn error(&mut self, line: u32, message: &str) {
        self.report(line, "", message);
    }

    pub fn report(&mut self, line: u32, item: &str, message: &str) {
        self.errors += 1;
        self.err_ln(&format!("[line {line}] Error {item}: {message}"));
    }

    pub fn warning(&mut self, line: u32, message: &str) {
        self.warnings += 1;
        self.out_ln(&format!("[line {line}] Warning: {message}"));
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn flush(&mut self) {
        self.out.flush();
        self.err.flush();
    }
}

impl Drop for DiagnosticEmitter {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_output() {
        let mut diag = DiagnosticEmitter::log_to_buffer();
        diag.out_ln("hello");
        diag.warning(3, "careful");
        diag.report(5, "at 'x'", "broken");
        assert_eq!(
            diag.out_buffer().unwrap(),
            "hello\n[line 3] Warning: careful\n"
        );
        assert_eq!(
            diag.err_buffer().unwrap(),
            "[line 5] Error at 'x': broken\n"
        );
        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn streams_have_no_buffer() {
        let diag = DiagnosticEmitter::new(Box::new(std::io::sink()), Box::new(std::io::sink()));
        assert!(diag.out_buffer().is_none());
        assert!(diag.err_buffer().is_none());
    }
}
