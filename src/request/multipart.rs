//! Multipart form bodies and the temporary files backing them.
//!
//! Generated files live exactly as long as the [`Attachment`] that owns
//! them: dropping the request deletes them, and
//! [`RequestDescription::release`](super::RequestDescription::release)
//! deletes them explicitly so removal failures can be logged.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rand::{Rng, distributions::Alphanumeric};
use tempfile::NamedTempFile;

use crate::diagnostics::Diagnostics;

const BOUNDARY_LEN: usize = 30;

/// A uniquely named temporary file written in full before it is attached.
#[derive(Debug)]
pub struct Attachment {
    file: NamedTempFile,
    file_name: String,
    len: u64,
}

impl Attachment {
    /// Create a temporary file named `<prefix><random><suffix>` holding
    /// `content` in the system temp directory.
    pub fn write(prefix: &str, suffix: &str, content: &str) -> io::Result<Self> {
        Self::write_in(&env::temp_dir(), prefix, suffix, content)
    }

    /// Like [`write`](Self::write), but inside `dir`.
    ///
    /// # Errors
    ///
    /// Any I/O error from creating, writing or flushing the file, including a
    /// missing `dir`. A partly written file is removed before the error is
    /// returned.
    pub fn write_in(dir: &Path, prefix: &str, suffix: &str, content: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        let len = file.as_file().metadata()?.len();
        let file_name = file
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{prefix}{suffix}"));
        Ok(Self {
            file,
            file_name,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Bare file name sent in the part's `Content-Disposition`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size in bytes as written.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the file back.
    pub fn read_to_string(&self) -> io::Result<String> {
        fs::read_to_string(self.path())
    }

    /// Delete the file, logging rather than returning a failure.
    pub fn release(self, diagnostics: &Diagnostics) {
        let path = self.file.path().to_path_buf();
        if let Err(err) = self.file.close() {
            diagnostics.warn(format_args!(
                "failed to remove attachment {}: {err}",
                path.display()
            ));
        }
    }
}

/// Body of one form part.
#[derive(Debug)]
pub enum PartContent {
    Text(String),
    File(Attachment),
}

/// A named form part.
#[derive(Debug)]
pub struct Part {
    pub name: String,
    pub content: PartContent,
}

/// An ordered `multipart/form-data` body.
#[derive(Debug)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Empty form with a random boundary.
    pub fn new() -> Self {
        let boundary = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BOUNDARY_LEN)
            .map(char::from)
            .collect::<String>();
        Self {
            boundary: format!("relaylog-{boundary}"),
            parts: Vec::new(),
        }
    }

    /// Append an inline text part.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            content: PartContent::Text(value.into()),
        });
        self
    }

    /// Append a file-backed part.
    pub fn file(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.parts.push(Part {
            name: name.into(),
            content: PartContent::File(attachment),
        });
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Look up a part by name.
    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` header value for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Serialize the form, reading file parts from disk.
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        for part in &self.parts {
            write!(out, "--{}\r\n", self.boundary)?;
            match &part.content {
                PartContent::Text(value) => {
                    write!(
                        out,
                        "Content-Disposition: form-data; name=\"{}\"\r\n\
                         Content-Type: text/plain; charset=UTF-8\r\n\r\n",
                        part.name
                    )?;
                    out.extend_from_slice(value.as_bytes());
                }
                PartContent::File(attachment) => {
                    write!(
                        out,
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        part.name,
                        attachment.file_name()
                    )?;
                    out.extend_from_slice(&fs::read(attachment.path())?);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        write!(out, "--{}--\r\n", self.boundary)?;
        Ok(out)
    }

    /// Delete every generated file in the form.
    pub fn release(self, diagnostics: &Diagnostics) {
        for part in self.parts {
            if let PartContent::File(attachment) = part.content {
                attachment.release(diagnostics);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_is_written_in_full_and_removed_on_release() {
        let attachment = Attachment::write("exception", ".exc.log", "line one\nline two\n")
            .expect("write attachment");
        let path = attachment.path().to_path_buf();
        assert!(attachment.file_name().starts_with("exception"));
        assert!(attachment.file_name().ends_with(".exc.log"));
        assert_eq!(attachment.len(), 18);
        assert_eq!(
            attachment.read_to_string().expect("read"),
            "line one\nline two\n"
        );
        attachment.release(&Diagnostics::default());
        assert!(!path.exists());
    }

    #[test]
    fn dropping_attachment_removes_file() {
        let attachment = Attachment::write("description", ".log", "x").expect("write");
        let path = attachment.path().to_path_buf();
        drop(attachment);
        assert!(!path.exists());
    }

    #[test]
    fn writes_into_given_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let attachment =
            Attachment::write_in(dir.path(), "exception", ".exc.log", "x").expect("write");
        assert_eq!(attachment.path().parent(), Some(dir.path()));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("gone");
        let err = Attachment::write_in(&missing, "exception", ".exc.log", "x")
            .expect_err("directory does not exist");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn attachment_names_are_unique() {
        let a = Attachment::write("exception", ".exc.log", "a").expect("write");
        let b = Attachment::write("exception", ".exc.log", "b").expect("write");
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn encodes_text_and_file_parts() {
        let attachment = Attachment::write("exception", ".exc.log", "crash body").expect("write");
        let file_name = attachment.file_name().to_owned();
        let form = MultipartForm::new()
            .file("log", attachment)
            .text("contact", "ops@example.com");
        let body = String::from_utf8(form.encode().expect("encode")).expect("utf8");
        let boundary = form.boundary();

        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
        assert!(body.contains(&format!(
            "name=\"log\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\ncrash body\r\n"
        )));
        assert!(body.contains("name=\"contact\"\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\nops@example.com\r\n"));
        assert!(form.content_type().ends_with(boundary));
    }

    #[test]
    fn boundaries_differ_between_forms() {
        assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
    }
}
