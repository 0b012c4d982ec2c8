use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::{FrameSource, rgba_converter};
use crate::types::Frame;

/// Formats tried before letting nokhwa pick; some built-in cameras reject YUYV even when listed.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

/// How long a round waits for the camera before giving up.
const FRAME_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    Ok(query(ApiBackend::Auto)?
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: info.human_name(),
        })
        .collect())
}

fn open_camera(index: &CameraIndex) -> Result<Camera> {
    // Highest resolution first: a round is a single still, frame rate does not matter.
    let requests = [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ];

    let mut last_err = anyhow!("no requested camera format was accepted");
    for requested in requests {
        let opened = Camera::new(index.clone(), requested).and_then(|mut camera| {
            camera.open_stream()?;
            Ok(camera)
        });
        match opened {
            Ok(camera) => return Ok(camera),
            Err(err) => last_err = err.into(),
        }
    }
    Err(last_err)
}

/// Background thread that keeps the newest converted frame in a one-slot channel.
struct CaptureThread {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CaptureThread {
    /// Opens the device on its own thread and waits until it is streaming.
    fn spawn(device: &CameraDevice, slot_tx: Sender<Frame>, slot_rx: Receiver<Frame>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let index = device.index.clone();

        let handle = thread::spawn(move || {
            let mut camera = match open_camera(&index) {
                Ok(camera) => {
                    let _ = ready_tx.send(Ok(()));
                    camera
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            while !stop_flag.load(Ordering::Relaxed) {
                let converted = camera
                    .frame()
                    .map_err(anyhow::Error::from)
                    .and_then(|raw| rgba_converter::convert_camera_frame(&raw));
                let frame = match converted {
                    Ok(frame) => frame,
                    Err(err) => {
                        log::warn!("dropping camera frame: {err:?}");
                        continue;
                    }
                };

                if !publish_latest(&slot_tx, &slot_rx, frame) {
                    break;
                }
            }
            log::debug!("camera capture thread stopped");
        });

        let mut thread = Self {
            stop,
            handle: Some(handle),
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(thread),
            Ok(Err(err)) => {
                thread.shutdown();
                Err(err)
            }
            Err(_) => {
                thread.shutdown();
                bail!("camera thread exited before opening the device")
            }
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Live camera that hands out its most recent frame on demand.
pub struct CameraCapture {
    devices: Vec<CameraDevice>,
    selected: usize,
    thread: CaptureThread,
    frame_rx: Receiver<Frame>,
}

impl CameraCapture {
    pub fn open(preferred_index: u32) -> Result<Self> {
        let devices = available_cameras().context("failed to enumerate cameras")?;
        if devices.is_empty() {
            bail!("no camera found");
        }
        let selected = devices
            .iter()
            .position(|d| d.index == CameraIndex::Index(preferred_index))
            .unwrap_or(0);

        let (thread, frame_rx) = start(&devices[selected])?;
        Ok(Self {
            devices,
            selected,
            thread,
            frame_rx,
        })
    }

    pub fn current_label(&self) -> &str {
        &self.devices[self.selected].label
    }
}

/// Puts `frame` in the one-slot channel, evicting whatever older frame is still queued.
/// Returns false once nobody can receive any more.
fn publish_latest(slot_tx: &Sender<Frame>, slot_rx: &Receiver<Frame>, mut frame: Frame) -> bool {
    loop {
        match slot_tx.try_send(frame) {
            Ok(()) => return true,
            Err(TrySendError::Full(rejected)) => {
                let _ = slot_rx.try_recv();
                frame = rejected;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

/// Waits for the first frame converted at or after `requested`; older ones are skipped.
fn frame_since(
    slot_rx: &Receiver<Frame>,
    requested: Instant,
    deadline: Instant,
) -> Result<Frame, RecvTimeoutError> {
    loop {
        let frame = slot_rx.recv_deadline(deadline)?;
        if frame.timestamp >= requested {
            return Ok(frame);
        }
    }
}

fn start(device: &CameraDevice) -> Result<(CaptureThread, Receiver<Frame>)> {
    let (frame_tx, frame_rx) = bounded(1);
    let thread = CaptureThread::spawn(device, frame_tx, frame_rx.clone())
        .with_context(|| format!("failed to open camera {}", device.label))?;
    log::info!("camera ready: {}", device.label);
    Ok((thread, frame_rx))
}

impl FrameSource for CameraCapture {
    /// Returns a frame taken after this call, never one left over from an earlier round.
    fn capture(&mut self) -> Result<Frame> {
        let requested = Instant::now();
        match frame_since(&self.frame_rx, requested, requested + FRAME_TIMEOUT) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => bail!(
                "camera {} produced no frame within {FRAME_TIMEOUT:?}",
                self.current_label()
            ),
            Err(RecvTimeoutError::Disconnected) => {
                bail!("camera {} stopped streaming", self.current_label())
            }
        }
    }

    /// Moves to the next camera; with a single camera this is a no-op.
    fn flip(&mut self) -> Result<()> {
        if self.devices.len() < 2 {
            log::info!("only one camera available, flip ignored");
            return Ok(());
        }

        let next = (self.selected + 1) % self.devices.len();
        // Release the current device first; some backends refuse a second open.
        self.thread.shutdown();
        match start(&self.devices[next]) {
            Ok((thread, frame_rx)) => {
                self.thread = thread;
                self.frame_rx = frame_rx;
                self.selected = next;
                Ok(())
            }
            Err(err) => {
                log::warn!("{err:#}, going back to {}", self.current_label());
                let (thread, frame_rx) = start(&self.devices[self.selected])
                    .context("failed to reopen the previous camera after a failed flip")?;
                self.thread = thread;
                self.frame_rx = frame_rx;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: u8) -> Frame {
        Frame::new(vec![n; 4], 1, 1)
    }

    #[test]
    fn slot_keeps_the_newest_frame() {
        let requested = Instant::now();
        let (slot_tx, slot_rx) = bounded(1);
        for n in 1..=5 {
            assert!(publish_latest(&slot_tx, &slot_rx, numbered(n)));
        }

        let deadline = Instant::now() + Duration::from_millis(100);
        let frame = frame_since(&slot_rx, requested, deadline).unwrap();
        assert_eq!(frame.rgba[0], 5);
        assert!(slot_rx.try_recv().is_err());
    }

    #[test]
    fn frames_from_before_the_request_are_skipped() {
        let (slot_tx, slot_rx) = bounded(1);
        assert!(publish_latest(&slot_tx, &slot_rx, numbered(1)));
        thread::sleep(Duration::from_millis(2));

        let requested = Instant::now();
        let deadline = requested + Duration::from_millis(20);
        assert_eq!(
            frame_since(&slot_rx, requested, deadline).unwrap_err(),
            RecvTimeoutError::Timeout
        );

        let late = numbered(2);
        assert!(publish_latest(&slot_tx, &slot_rx, late));
        let frame = frame_since(&slot_rx, requested, Instant::now() + Duration::from_millis(100)).unwrap();
        assert_eq!(frame.rgba[0], 2);
    }
}
