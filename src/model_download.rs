use std::{
    fs,
    io::{self, Write},
    path::Path,
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    HandposeEstimator,
    PalmDetector,
}

impl ModelKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::HandposeEstimator => "handpose estimator",
            ModelKind::PalmDetector => "palm detector",
        }
    }

    fn url(&self) -> &'static str {
        match self {
            ModelKind::HandposeEstimator => HANDPOSE_ESTIMATOR_MODEL_URL,
            ModelKind::PalmDetector => PALM_DETECTOR_MODEL_URL,
        }
    }
}

pub const HANDPOSE_ESTIMATOR_MODEL_FILENAME: &str = "handpose_estimation_mediapipe_2023feb.onnx";
const HANDPOSE_ESTIMATOR_MODEL_URL: &str = "https://github.com/opencv/opencv_zoo/raw/main/models/handpose_estimation_mediapipe/handpose_estimation_mediapipe_2023feb.onnx";
pub const PALM_DETECTOR_MODEL_FILENAME: &str = "palm_detection_mediapipe_2023feb.onnx";
const PALM_DETECTOR_MODEL_URL: &str = "https://github.com/opencv/opencv_zoo/raw/main/models/palm_detection_mediapipe/palm_detection_mediapipe_2023feb.onnx";

#[derive(Clone, Debug, PartialEq)]
pub enum ModelDownloadEvent {
    AlreadyPresent {
        model: ModelKind,
    },
    Started {
        model: ModelKind,
        total: Option<u64>,
    },
    Progress {
        model: ModelKind,
        downloaded: u64,
        total: Option<u64>,
    },
    Finished {
        model: ModelKind,
    },
}

impl ModelDownloadEvent {
    /// Download fraction in `0.0..=1.0` when the size is known.
    pub fn fraction(&self) -> Option<f32> {
        match self {
            ModelDownloadEvent::Progress {
                downloaded,
                total: Some(total),
                ..
            } if *total > 0 => Some((*downloaded as f64 / *total as f64).clamp(0.0, 1.0) as f32),
            ModelDownloadEvent::AlreadyPresent { .. } | ModelDownloadEvent::Finished { .. } => {
                Some(1.0)
            }
            _ => None,
        }
    }
}

/// Makes sure `model_path` holds the model, downloading it on first use.
///
/// `on_event` sees every download step; a model already on disk reports
/// `AlreadyPresent` followed by `Finished`.
pub fn ensure_model_ready<F>(model: ModelKind, model_path: &Path, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    if model_path.exists() {
        log::debug!("{} model found at {}", model.label(), model_path.display());
        on_event(ModelDownloadEvent::AlreadyPresent { model });
        on_event(ModelDownloadEvent::Finished { model });
        return Ok(());
    }

    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    download(model, model_path, &mut on_event).with_context(|| {
        format!(
            "failed to download {} model to {}",
            model.label(),
            model_path.display()
        )
    })?;
    on_event(ModelDownloadEvent::Finished { model });
    Ok(())
}

fn download(
    model: ModelKind,
    dest: &Path,
    on_event: &mut dyn FnMut(ModelDownloadEvent),
) -> anyhow::Result<()> {
    let url = model.url();
    log::info!("downloading {} model from {url}", model.label());

    let mut response = Client::new()
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;
    let total = response.content_length();
    on_event(ModelDownloadEvent::Started { model, total });

    // Written next to the destination and renamed once complete.
    let partial = dest.with_extension("part");
    let file = fs::File::create(&partial)
        .with_context(|| format!("failed to create {}", partial.display()))?;
    let mut writer = ReportingWriter {
        inner: file,
        bar: progress_bar(total),
        model,
        written: 0,
        total,
        on_event,
    };
    io::copy(&mut response, &mut writer).context("failed while streaming model to disk")?;
    writer
        .inner
        .sync_all()
        .context("failed to flush downloaded model to disk")?;
    writer
        .bar
        .finish_with_message(format!("{} model ready", model.label()));

    fs::rename(&partial, dest).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            partial.display(),
            dest.display()
        )
    })
}

/// Forwards writes and reports the running byte count.
struct ReportingWriter<'a, W> {
    inner: W,
    bar: ProgressBar,
    model: ModelKind,
    written: u64,
    total: Option<u64>,
    on_event: &'a mut dyn FnMut(ModelDownloadEvent),
}

impl<W: Write> Write for ReportingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        self.bar.set_position(self.written);
        (self.on_event)(ModelDownloadEvent::Progress {
            model: self.model,
            downloaded: self.written,
            total: self.total,
        });
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn progress_bar(total: Option<u64>) -> ProgressBar {
    let (bar, template) = match total {
        Some(total) if total > 0 => (
            ProgressBar::new(total),
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        ),
        _ => {
            let bar = ProgressBar::new_spinner();
            bar.enable_steady_tick(Duration::from_millis(100));
            (bar, "{spinner:.green} downloading model {bytes}")
        }
    };
    match ProgressStyle::with_template(template) {
        Ok(style) => bar.set_style(style.progress_chars("=>-")),
        Err(err) => log::warn!("invalid progress template: {err}"),
    }
    bar
}
