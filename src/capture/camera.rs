use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::Local;

use crate::error::CaptureError;

/// Placeholder in the configured command that receives the output path.
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Takes a still photo by running an external capture program, the same way
/// a phone hands off to its camera app and waits for the result.
pub struct CameraCapture {
    command: Vec<String>,
    output_dir: PathBuf,
}

impl CameraCapture {
    pub fn new(command: Vec<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            output_dir: output_dir.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.command.is_empty()
    }

    /// Run the capture command and return the path of the written image.
    pub fn capture(&self) -> Result<PathBuf, CaptureError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(CaptureError::CameraNotConfigured)?;

        fs::create_dir_all(&self.output_dir)?;
        let output = self.next_output_path();
        let args = expand_args(args, &output);

        tracing::debug!(%program, ?args, "running camera command");
        let result = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| CaptureError::Camera(format!("could not run {program}: {err}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(CaptureError::Camera(if detail.is_empty() {
                format!("{program} exited with {}", result.status)
            } else {
                detail
            }));
        }
        if !output.is_file() {
            return Err(CaptureError::Camera(format!(
                "{program} did not write {}",
                output.display()
            )));
        }

        Ok(output)
    }

    fn next_output_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
        self.output_dir.join(format!("capture-{stamp}.jpg"))
    }
}

/// Substitute the output path into the arguments, appending it when no
/// placeholder is present.
fn expand_args(args: &[String], output: &Path) -> Vec<String> {
    let output = output.to_string_lossy();
    let mut substituted = false;
    let mut expanded: Vec<String> = args
        .iter()
        .map(|arg| {
            if arg.contains(OUTPUT_PLACEHOLDER) {
                substituted = true;
                arg.replace(OUTPUT_PLACEHOLDER, &output)
            } else {
                arg.clone()
            }
        })
        .collect();
    if !substituted {
        expanded.push(output.into_owned());
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn placeholder_is_replaced_in_place() {
        let args = expand_args(&strings(&["-r", "640x480", "--out={output}"]), Path::new("/tmp/a.jpg"));
        assert_eq!(args, strings(&["-r", "640x480", "--out=/tmp/a.jpg"]));
    }

    #[test]
    fn output_is_appended_without_placeholder() {
        let args = expand_args(&strings(&["--no-banner"]), Path::new("/tmp/a.jpg"));
        assert_eq!(args, strings(&["--no-banner", "/tmp/a.jpg"]));
    }

    #[test]
    fn unconfigured_camera_reports_it() {
        let camera = CameraCapture::new(Vec::new(), "/tmp");
        assert!(!camera.is_configured());
        assert!(matches!(
            camera.capture(),
            Err(CaptureError::CameraNotConfigured)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn successful_command_yields_the_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let camera = CameraCapture::new(strings(&["touch", "{output}"]), dir.path());
        let path = camera.capture().unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_a_camera_error() {
        let dir = tempfile::tempdir().unwrap();
        let camera = CameraCapture::new(strings(&["false"]), dir.path());
        assert!(matches!(camera.capture(), Err(CaptureError::Camera(_))));
    }

    #[cfg(unix)]
    #[test]
    fn command_that_writes_nothing_is_a_camera_error() {
        let dir = tempfile::tempdir().unwrap();
        let camera = CameraCapture::new(strings(&["true"]), dir.path());
        assert!(matches!(camera.capture(), Err(CaptureError::Camera(_))));
    }
}
