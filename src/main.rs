//! Binary entry point: resolve configuration, start logging, bring up the
//! prediction store and the classifier, then drive the Ratatui event loop
//! until the user exits.
use directories::BaseDirs;
use injury_lens::capture::{CameraCapture, DevicePermissions};
use injury_lens::{
    ensure_schema, logging, open_in_memory, run_app, App, AppConfig, CaptureEnvironment,
    Classifier, StoreWorker,
};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let _log_guard = logging::init(&config.logging)?;
    tracing::info!(data_dir = %config.data_dir.display(), "starting injury-lens");

    // A broken database file should not lock the user out of classifying.
    let conn = match ensure_schema(&config.storage.database) {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!(
                error = %format!("{err:#}"),
                path = %config.storage.database.display(),
                "falling back to an in-memory prediction store"
            );
            open_in_memory()?
        }
    };
    let store = StoreWorker::spawn(conn)?;

    let classifier = Classifier::load(&config.model.path);

    let capture = &config.capture;
    let camera = CameraCapture::new(capture.camera_command.clone(), &capture.captures_dir);
    let probe = DevicePermissions {
        gallery_dir: capture.gallery_dir.clone(),
        camera_device: capture.camera_device.clone(),
        camera_configured: camera.is_configured(),
    };
    let env = CaptureEnvironment {
        gallery_dir: capture.gallery_dir.clone(),
        camera,
        probe: Box::new(probe),
        home_dir: BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
    };

    let mut app = App::new(store, classifier, env);
    let result = run_app(&mut app);
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "terminal session ended with an error");
    }
    result
}
