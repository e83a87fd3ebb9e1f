use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::info;

use crate::binarize;
use crate::dithering::Algorithm;
use crate::error::{PrintError, PrintResult};
use crate::font;
use crate::protocol::{encode_print_commands, Energy, PRINT_WIDTH};
use crate::render::render_text;
use crate::wrap::WrapConfig;

/// Byte sink for encoded print jobs.
/// Implemented by the BLE transport and by mocks in tests.
#[async_trait]
pub trait Transport {
    async fn transmit(&mut self, data: &[u8]) -> PrintResult<()>;
}

/// What a job prints: a text file rendered to an image, or an image file
/// used as-is.
#[derive(Debug, Clone)]
pub enum JobInput {
    Text(PathBuf),
    Image(PathBuf),
}

/// One print job's configuration. Built once per invocation.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub input: JobInput,
    pub font_size: u32,
    pub algorithm: Algorithm,
    pub energy: Energy,
    pub preview: bool,
    pub keep_image: bool,
    pub output: Option<PathBuf>,
    pub transmit_timeout: Duration,
}

impl JobOptions {
    pub fn new(input: JobInput) -> Self {
        Self {
            input,
            font_size: 16,
            algorithm: Algorithm::default(),
            energy: Energy::default(),
            preview: false,
            keep_image: false,
            output: None,
            transmit_timeout: Duration::from_secs(60),
        }
    }
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// Data reached the transport. `image` is the retained rendered image,
    /// when one was kept.
    Printed { bytes_sent: usize, image: Option<PathBuf> },
    /// User declined the preview; nothing was transmitted.
    Cancelled,
}

/// A print-ready image on disk.
///
/// When the image was rendered into a temporary file, the guard deletes
/// it on drop, whatever path the job exits through.
struct AcquiredImage {
    path: PathBuf,
    kept: Option<PathBuf>,
    _guard: Option<NamedTempFile>,
}

/// Runs one print job through its stages:
/// acquire, binarize, optional preview, encode, transmit, cleanup.
///
/// Stages run strictly in order; the first failure aborts the rest and
/// still releases the temporary artifact. No stage is retried here —
/// transient-connection retry belongs to the transport.
pub async fn run_job<T: Transport>(
    options: &JobOptions,
    transport: &mut T,
) -> PrintResult<JobOutcome> {
    let acquired = acquire_image(options)?;

    let bin = binarize::acquire(&acquired.path, PRINT_WIDTH, options.algorithm)?;
    bin.ensure_width(PRINT_WIDTH)?;

    if options.preview && !binarize::show_preview(&bin)? {
        info!("print cancelled at preview");
        return Ok(JobOutcome::Cancelled);
    }

    let data = encode_print_commands(&bin, options.energy)?;
    info!(bytes = data.len(), energy = %options.energy, "encoded print commands");

    tokio::time::timeout(options.transmit_timeout, transport.transmit(&data))
        .await
        .map_err(|_| {
            PrintError::Transport(format!(
                "transmit timed out after {:?}",
                options.transmit_timeout
            ))
        })??;

    Ok(JobOutcome::Printed { bytes_sent: data.len(), image: acquired.kept })
    // acquired drops here: a temporary artifact is deleted unless kept
}

/// ACQUIRE_IMAGE: validate a supplied raster file, or render text input
/// to a PNG at the printer width.
fn acquire_image(options: &JobOptions) -> PrintResult<AcquiredImage> {
    match &options.input {
        JobInput::Image(path) => {
            if !path.exists() {
                return Err(PrintError::InputNotFound(path.clone()));
            }
            Ok(AcquiredImage { path: path.clone(), kept: None, _guard: None })
        }
        JobInput::Text(path) => {
            if !path.exists() {
                return Err(PrintError::InputNotFound(path.clone()));
            }
            let text = fs::read_to_string(path)?;
            let text = text.trim();
            if text.is_empty() {
                return Err(PrintError::EmptyInput);
            }

            let font = font::resolve(options.font_size);
            let config = WrapConfig::with_font_size(options.font_size);
            let image = render_text(text, &font, &config)?;
            info!(width = image.width(), height = image.height(), "rendered text image");

            match &options.output {
                Some(out) => {
                    image.save(out)?;
                    info!(path = %out.display(), "saved rendered image");
                    Ok(AcquiredImage {
                        path: out.clone(),
                        kept: Some(out.clone()),
                        _guard: None,
                    })
                }
                None => {
                    let tmp = tempfile::Builder::new()
                        .prefix("catprint-")
                        .suffix(".png")
                        .tempfile()?;
                    image.save(tmp.path())?;
                    if options.keep_image {
                        let (_, path) = tmp.keep().map_err(|e| PrintError::Io(e.error))?;
                        info!(path = %path.display(), "keeping rendered image");
                        Ok(AcquiredImage { path: path.clone(), kept: Some(path), _guard: None })
                    } else {
                        let path = tmp.path().to_path_buf();
                        Ok(AcquiredImage { path, kept: None, _guard: Some(tmp) })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::sync::{Arc, Mutex};

    struct MockTransport {
        sent: Arc<Mutex<Vec<u8>>>,
        fail: bool,
    }

    impl MockTransport {
        fn new() -> Self {
            Self { sent: Arc::new(Mutex::new(Vec::new())), fail: false }
        }

        fn bytes_sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn transmit(&mut self, data: &[u8]) -> PrintResult<()> {
            if self.fail {
                return Err(PrintError::Transport("mock transport failure".into()));
            }
            self.sent.lock().unwrap().extend_from_slice(data);
            Ok(())
        }
    }

    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn transmit(&mut self, _data: &[u8]) -> PrintResult<()> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(())
        }
    }

    fn text_options(dir: &std::path::Path, content: &str) -> JobOptions {
        let input = dir.join("input.txt");
        fs::write(&input, content).unwrap();
        JobOptions::new(JobInput::Text(input))
    }

    #[tokio::test]
    async fn text_job_prints_and_retains_explicit_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = text_options(dir.path(), "Hello world");
        options.output = Some(dir.path().join("out.png"));
        let mut transport = MockTransport::new();

        let outcome = run_job(&options, &mut transport).await.unwrap();
        match outcome {
            JobOutcome::Printed { bytes_sent, image } => {
                assert!(bytes_sent > 0);
                assert_eq!(transport.bytes_sent(), bytes_sent);
                assert_eq!(image.as_deref(), options.output.as_deref());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(options.output.unwrap().exists());
    }

    #[tokio::test]
    async fn image_job_prints_supplied_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        GrayImage::from_fn(120, 80, |x, _| Luma([(x * 2) as u8]))
            .save(&input)
            .unwrap();
        let options = JobOptions::new(JobInput::Image(input));
        let mut transport = MockTransport::new();

        let outcome = run_job(&options, &mut transport).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Printed { image: None, .. }));
        assert!(transport.bytes_sent() > 0);
    }

    #[tokio::test]
    async fn missing_input_aborts_before_transport() {
        let options = JobOptions::new(JobInput::Text(PathBuf::from("/no/such/file.txt")));
        let mut transport = MockTransport::new();

        let err = run_job(&options, &mut transport).await.unwrap_err();
        assert!(matches!(err, PrintError::InputNotFound(_)));
        assert_eq!(transport.bytes_sent(), 0);
    }

    #[tokio::test]
    async fn empty_text_aborts_before_transport() {
        let dir = tempfile::tempdir().unwrap();
        let options = text_options(dir.path(), "   \n\n  ");
        let mut transport = MockTransport::new();

        let err = run_job(&options, &mut transport).await.unwrap_err();
        assert!(matches!(err, PrintError::EmptyInput));
        assert_eq!(transport.bytes_sent(), 0);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let options = text_options(dir.path(), "some text");
        let mut transport = MockTransport::new();
        transport.fail = true;

        let err = run_job(&options, &mut transport).await.unwrap_err();
        assert!(matches!(err, PrintError::Transport(_)));
    }

    #[tokio::test]
    async fn stalled_transport_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = text_options(dir.path(), "some text");
        options.transmit_timeout = Duration::from_millis(50);

        let err = run_job(&options, &mut StalledTransport).await.unwrap_err();
        assert!(matches!(err, PrintError::Transport(_)));
    }

    #[test]
    fn temporary_artifact_is_deleted_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let options = text_options(dir.path(), "cleanup me");

        let acquired = acquire_image(&options).unwrap();
        let path = acquired.path.clone();
        assert!(path.exists());
        assert!(acquired.kept.is_none());
        drop(acquired);
        assert!(!path.exists());
    }

    #[test]
    fn keep_image_retains_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = text_options(dir.path(), "keep me");
        options.keep_image = true;

        let acquired = acquire_image(&options).unwrap();
        let kept = acquired.kept.clone().expect("image should be kept");
        drop(acquired);
        assert!(kept.exists());
        fs::remove_file(kept).unwrap();
    }

    #[tokio::test]
    async fn energy_is_embedded_in_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = text_options(dir.path(), "dark print");
        options.energy = "0xbeef".parse().unwrap();
        let mut transport = MockTransport::new();

        run_job(&options, &mut transport).await.unwrap();
        let sent = transport.sent.lock().unwrap();
        // energy packet payload is little-endian
        assert_eq!(&sent[6..8], &[0xef, 0xbe]);
    }
}
