use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{LookupError, Result};

/// Response format requested from the lookup API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    #[default]
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(LookupError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Writes one result to the console in the shape of its format.
pub fn render_result<W: Write>(
    out: &mut W,
    target: &str,
    format: OutputFormat,
    body: &str,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            writeln!(out, "{} :", target)?;
            match serde_json::from_str::<serde_json::Value>(body) {
                Ok(value) => {
                    let pretty = serde_json::to_string_pretty(&value)
                        .unwrap_or_else(|_| body.to_string());
                    writeln!(out, "{}", pretty)?;
                }
                Err(_) => writeln!(out, "{}", body.trim_end())?,
            }
            writeln!(out)
        }
        OutputFormat::Csv => writeln!(out, "{},{}", target, body.trim_end_matches(['\r', '\n'])),
    }
}

/// Asked before an existing output file is truncated.
pub trait Confirm {
    fn confirm_overwrite(&mut self, path: &Path) -> io::Result<bool>;
}

impl<F> Confirm for F
where
    F: FnMut(&Path) -> io::Result<bool>,
{
    fn confirm_overwrite(&mut self, path: &Path) -> io::Result<bool> {
        self(path)
    }
}

/// Interactive prompt on stderr, answer read from stdin.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm_overwrite(&mut self, path: &Path) -> io::Result<bool> {
        let mut stderr = io::stderr();
        write!(stderr, "{} already exists, overwrite? [y/N] ", path.display())?;
        stderr.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Append-only file receiving each raw response body.
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    file: File,
}

impl OutputSink {
    pub fn open<C: Confirm + ?Sized>(path: &Path, confirm: &mut C) -> Result<Self> {
        if path.exists() {
            if !confirm.confirm_overwrite(path)? {
                return Err(LookupError::Aborted(path.to_path_buf()));
            }
            info!("overwriting {}", path.display());
            File::create(path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!("writing results to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn append(&mut self, body: &[u8]) -> Result<()> {
        self.file.write_all(body)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn answer(yes: bool) -> impl FnMut(&Path) -> io::Result<bool> {
        move |_: &Path| Ok(yes)
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::default(), OutputFormat::Csv);
        assert!(matches!(
            "xml".parse::<OutputFormat>(),
            Err(LookupError::UnsupportedFormat(s)) if s == "xml"
        ));
    }

    #[test]
    fn test_render_csv_strips_trailing_newline() {
        let mut out = Vec::new();
        render_result(&mut out, "1.1.1.1", OutputFormat::Csv, "success,Australia\n").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1.1.1.1,success,Australia\n");
    }

    #[test]
    fn test_render_json_pretty_prints() {
        let mut out = Vec::new();
        render_result(&mut out, "1.1.1.1", OutputFormat::Json, r#"{"status":"success"}"#).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1.1.1.1 :\n{\n  \"status\": \"success\"\n}\n\n"
        );
    }

    #[test]
    fn test_render_json_falls_back_to_raw() {
        let mut out = Vec::new();
        render_result(&mut out, "1.1.1.1", OutputFormat::Json, "not json\n").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1.1.1.1 :\nnot json\n\n");
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("n"));
    }

    #[test]
    fn test_sink_creates_new_file_without_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut asked = false;
        let mut confirm = |_: &Path| {
            asked = true;
            Ok::<_, io::Error>(true)
        };

        let mut sink = OutputSink::open(&path, &mut confirm).unwrap();
        sink.append(b"a,ok\n").unwrap();
        sink.append(b"b,ok\n").unwrap();
        drop(sink);

        assert!(!asked);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,ok\nb,ok\n");
    }

    #[test]
    fn test_sink_truncates_on_accept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "old contents\n").unwrap();

        let mut sink = OutputSink::open(&path, &mut answer(true)).unwrap();
        sink.append(b"new,ok\n").unwrap();
        drop(sink);

        assert_eq!(fs::read_to_string(&path).unwrap(), "new,ok\n");
    }

    #[test]
    fn test_sink_decline_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "keep me\n").unwrap();

        let err = OutputSink::open(&path, &mut answer(false)).unwrap_err();

        assert!(matches!(err, LookupError::Aborted(ref p) if p == &path));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me\n");
    }
}
