use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::CaptureError;

/// File extensions offered by the gallery picker.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp", "gif", "tif", "tiff"];

/// Image files directly inside `dir`, sorted by file name. Subdirectories and
/// non-image files are skipped.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let gallery_error = |source| CaptureError::Gallery {
        path: dir.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(gallery_error)? {
        let path = entry.map_err(gallery_error)?.path();
        if path.is_file() && is_image_path(&path) {
            images.push(path);
        }
    }
    images.sort_by_key(|path| path.file_name().map(|name| name.to_ascii_lowercase()));
    Ok(images)
}

/// Decode the file at `path`.
pub fn load_image(path: &Path) -> Result<DynamicImage, CaptureError> {
    image::open(path).map_err(|source| CaptureError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    #[test]
    fn lists_only_image_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.jpeg"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);
    }

    #[test]
    fn missing_gallery_is_a_gallery_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_images(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, CaptureError::Gallery { .. }));
    }

    #[test]
    fn loads_a_real_png_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("wound.png");
        RgbImage::from_pixel(8, 6, Rgb([200, 10, 10]))
            .save(&good)
            .unwrap();
        let image = load_image(&good).unwrap();
        assert_eq!((image.width(), image.height()), (8, 6));

        let bad = dir.path().join("broken.png");
        fs::write(&bad, b"not a png").unwrap();
        assert!(matches!(
            load_image(&bad),
            Err(CaptureError::ImageLoad { .. })
        ));
    }
}
