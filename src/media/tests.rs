use super::*;
use crate::config::Facing;
use crate::error::DeviceError;
use std::sync::Arc;

fn constraints() -> CaptureConstraints {
    CaptureConstraints::new(Facing::User, 640, 480)
}

fn capture_with(camera: &Arc<SyntheticCamera>) -> MediaCapture {
    MediaCapture::new(Arc::clone(camera) as Arc<dyn CaptureDevice>, 80)
}

#[tokio::test]
async fn test_acquire_and_release() {
    let camera = Arc::new(SyntheticCamera::new((64, 48)));
    let media = capture_with(&camera);

    let session = media
        .acquire(PreviewTarget::Recognition, constraints())
        .await
        .unwrap();

    assert!(session.is_active());
    assert_eq!(session.target(), PreviewTarget::Recognition);
    assert_eq!(session.device(), "synthetic");
    assert_eq!(camera.active_streams(), 1);

    let mut slot = Some(session);
    media.release(&mut slot);

    assert!(slot.is_none());
    assert_eq!(camera.active_streams(), 0);
}

#[tokio::test]
async fn test_acquire_failure_is_reported() {
    let camera = Arc::new(SyntheticCamera::new((64, 48)));
    camera.set_failure(Some(DeviceError::PermissionDenied {
        device: "synthetic".to_string(),
    }));
    let media = capture_with(&camera);

    let result = media.acquire(PreviewTarget::Enrollment, constraints()).await;

    assert!(matches!(result, Err(DeviceError::PermissionDenied { .. })));
    assert_eq!(camera.active_streams(), 0);

    // The device recovers once the failure clears
    camera.set_failure(None);
    assert!(media
        .acquire(PreviewTarget::Enrollment, constraints())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_snapshot_uses_true_frame_size() {
    // Native size differs from the ideal 640x480 request
    let camera = Arc::new(SyntheticCamera::new((80, 60)));
    let media = capture_with(&camera);
    let mut session = media
        .acquire(PreviewTarget::Recognition, constraints())
        .await
        .unwrap();

    let payload = media.snapshot(&mut session).unwrap();

    assert_eq!((payload.width(), payload.height()), (80, 60));
    assert!(payload.as_data_url().starts_with("data:image/jpeg;base64,"));

    let jpeg = payload.to_jpeg().unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (80, 60));
}

#[tokio::test]
async fn test_synthetic_frame_is_packed_rgb24() {
    // Wide enough that the pixel index outruns a single gradient period
    let camera = SyntheticCamera::new((1280, 3));
    let mut source = camera.open(constraints()).await.unwrap();

    let frame = source.grab().unwrap();

    assert_eq!(frame.data.len(), crate::frame::rgb24_len(1280, 3));
    assert!(frame.validate_size());
    // Second row starts one step further along the green gradient
    assert_eq!(frame.data[1280 * 3 + 1], frame.data[1] + 1);

    source.stop();
    assert_eq!(camera.active_streams(), 0);
}

#[tokio::test]
async fn test_each_snapshot_grabs_a_fresh_frame() {
    let camera = Arc::new(SyntheticCamera::new((32, 24)));
    let media = capture_with(&camera);
    let mut session = media
        .acquire(PreviewTarget::Enrollment, constraints())
        .await
        .unwrap();

    let first = media.snapshot(&mut session).unwrap();
    let second = media.snapshot(&mut session).unwrap();

    assert_eq!(camera.frames_generated(), 2);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let camera = Arc::new(SyntheticCamera::new((32, 24)));
    let media = capture_with(&camera);
    let mut session = media
        .acquire(PreviewTarget::Recognition, constraints())
        .await
        .unwrap();

    assert!(session.release());
    assert!(!session.release());
    assert!(!session.is_active());
    assert_eq!(camera.active_streams(), 0);

    // Snapshot on a released session is an error, not a panic
    assert_eq!(
        media.snapshot(&mut session).unwrap_err(),
        DeviceError::NoActiveSession
    );

    // Releasing an empty slot is a no-op
    let mut empty: Option<CaptureSession> = None;
    media.release(&mut empty);
    media.release(&mut empty);
    assert!(empty.is_none());
}

#[tokio::test]
async fn test_dropping_session_stops_stream() {
    let camera = Arc::new(SyntheticCamera::new((32, 24)));
    let media = capture_with(&camera);

    {
        let _session = media
            .acquire(PreviewTarget::Recognition, constraints())
            .await
            .unwrap();
        assert_eq!(camera.active_streams(), 1);
    }

    assert_eq!(camera.active_streams(), 0);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let camera = Arc::new(SyntheticCamera::new((32, 24)));
    let media = capture_with(&camera);

    let mut recognition = Some(
        media
            .acquire(PreviewTarget::Recognition, constraints())
            .await
            .unwrap(),
    );
    let enrollment = media
        .acquire(PreviewTarget::Enrollment, constraints())
        .await
        .unwrap();
    assert_eq!(camera.active_streams(), 2);

    media.release(&mut recognition);

    assert_eq!(camera.active_streams(), 1);
    assert!(enrollment.is_active());
}
