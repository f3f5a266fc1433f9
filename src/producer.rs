//! Page Producer - Markup to Paginated Output
//!
//! The producer is an opaque collaborator. The bundled implementation
//! drives an external `wkhtmltopdf` binary; tests and embedders can plug
//! in their own [`PageProducer`].

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::thread;

use thiserror::Error;

use crate::print::PageSetup;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Converter not found at {0}")]
    ConverterNotFound(PathBuf),

    #[error("Converter exited with {status}: {stderr}")]
    ConverterFailed { status: String, stderr: String },

    #[error("Converter produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("Producer error: {0}")]
    Other(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts markup into a paginated PDF written at `output`.
pub trait PageProducer {
    fn produce(&self, markup: &str, setup: &PageSetup, output: &Path) -> Result<(), ProducerError>;
}

/// Runs the external `wkhtmltopdf` converter, feeding markup on stdin.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfProducer {
    binary: PathBuf,
    allowed_dirs: Vec<PathBuf>,
}

impl WkhtmltopdfProducer {
    /// Fails immediately when the converter binary does not exist.
    pub fn new(binary: impl Into<PathBuf>) -> Result<Self, ProducerError> {
        let binary = binary.into();
        if !binary.is_file() {
            return Err(ProducerError::ConverterNotFound(binary));
        }
        Ok(Self {
            binary,
            allowed_dirs: vec![],
        })
    }

    /// Permit local file access under `dir` (logos, stylesheets).
    pub fn allow_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.allowed_dirs.push(dir.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Command-line options for a page setup, excluding input and output.
    pub fn args(&self, setup: &PageSetup) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--quiet".into(),
            "--page-size".into(),
            setup.page_size.as_str().into(),
            "--margin-top".into(),
            format!("{}mm", setup.margins.top),
            "--margin-right".into(),
            format!("{}mm", setup.margins.right),
            "--margin-bottom".into(),
            format!("{}mm", setup.margins.bottom),
            "--margin-left".into(),
            format!("{}mm", setup.margins.left),
        ];

        if !self.allowed_dirs.is_empty() {
            args.push("--enable-local-file-access".into());
            for dir in &self.allowed_dirs {
                args.push("--allow".into());
                args.push(dir.to_string_lossy().into_owned());
            }
        }
        if setup.ignore_load_errors {
            args.extend(
                ["--load-error-handling", "ignore", "--load-media-error-handling", "ignore"]
                    .map(String::from),
            );
        }
        if setup.print_media_type {
            args.push("--print-media-type".into());
        }
        if let Some(dpi) = setup.dpi {
            args.push("--dpi".into());
            args.push(dpi.to_string());
        }
        if let Some(dpi) = setup.image_dpi {
            args.push("--image-dpi".into());
            args.push(dpi.to_string());
        }
        if let Some(quality) = setup.image_quality {
            args.push("--image-quality".into());
            args.push(quality.to_string());
        }
        args.push(if setup.smart_shrinking {
            "--enable-smart-shrinking".into()
        } else {
            "--disable-smart-shrinking".into()
        });

        args
    }
}

impl PageProducer for WkhtmltopdfProducer {
    fn produce(&self, markup: &str, setup: &PageSetup, output: &Path) -> Result<(), ProducerError> {
        let mut child = Command::new(&self.binary)
            .args(self.args(setup))
            .arg("-")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin while stderr drains, so neither pipe can fill up and stall.
        let stdin = child.stdin.take();
        let (result, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || feed_stdin(stdin, markup));
            let result = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (result, written)
        });
        let result = result?;
        let produced = output.metadata().map(|m| m.len() > 0).unwrap_or(false);

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            // Ignored load errors still yield a non-zero exit with a usable file.
            if setup.ignore_load_errors && produced {
                tracing::warn!(status = %result.status, %stderr, "converter reported errors");
            } else {
                return Err(ProducerError::ConverterFailed {
                    status: result.status.to_string(),
                    stderr,
                });
            }
        }
        written?;

        if !produced {
            return Err(ProducerError::MissingOutput(output.to_path_buf()));
        }
        Ok(())
    }
}

/// A converter that stops reading early is not an error here; its exit
/// status says what went wrong.
fn feed_stdin(stdin: Option<ChildStdin>, markup: &str) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(markup.as_bytes()) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!("converter closed stdin before reading all markup");
            Ok(())
        }
        other => other,
    }
}
