use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tokio::{fs, io::AsyncWriteExt};

use crate::error::{GenError, Result};
use crate::providers::InlineImage;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Formats the model accepts as-is; anything else is re-encoded to PNG before upload.
const UPLOAD_FORMATS: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Reads an input image and tags it with the MIME type sniffed from its bytes.
pub async fn load_image(path: &Path) -> Result<InlineImage> {
    ensure_exists(path).await?;
    let bytes = fs::read(path).await?;
    let format = image::guess_format(&bytes).map_err(|e| GenError::image(path, e))?;
    if UPLOAD_FORMATS.contains(&format) {
        return Ok(InlineImage { mime_type: format.to_mime_type().to_string(), bytes });
    }
    tracing::debug!(path = %path.display(), ?format, "re-encoding input as png");
    let png = transcode(&bytes, ImageFormat::Png).map_err(|e| GenError::image(path, e))?;
    Ok(InlineImage { mime_type: ImageFormat::Png.to_mime_type().to_string(), bytes: png })
}

pub async fn ensure_exists(path: &Path) -> Result<()> {
    if fs::try_exists(path).await? {
        Ok(())
    } else {
        Err(GenError::InputNotFound(path.to_path_buf()))
    }
}

/// Writes a generated image to `path`, converting it to the format the extension names.
/// The parent directory must already exist.
pub async fn save_output(path: &Path, img: &InlineImage) -> Result<()> {
    let target = ImageFormat::from_path(path).map_err(|e| GenError::image(path, e))?;
    let bytes = match image::guess_format(&img.bytes) {
        Ok(found) if found == target => img.bytes.clone(),
        _ => transcode(&img.bytes, target).map_err(|e| GenError::image(path, e))?,
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if let Err(e) = write_then_rename(&tmp, path, &bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    {
        let mut f = fs::File::create(tmp).await?;
        f.write_all(bytes).await?;
        let _ = f.sync_all().await; // best-effort
    }
    fs::rename(tmp, path).await
}

fn transcode(bytes: &[u8], target: ImageFormat) -> image::ImageResult<Vec<u8>> {
    let mut decoded = image::load_from_memory(bytes)?;
    if target == ImageFormat::Jpeg {
        decoded = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
    }
    let mut out = Vec::new();
    decoded.write_to(&mut Cursor::new(&mut out), target)?;
    Ok(out)
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by path.
pub async fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    ensure_exists(dir).await?;
    let mut out = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        // metadata() follows symlinks; dangling links are skipped
        let is_file = matches!(fs::metadata(&path).await, Ok(m) if m.is_file());
        if is_image_path(&path) && is_file {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// One entry per non-empty line, trimmed.
pub async fn load_texts(path: &Path) -> Result<Vec<String>> {
    ensure_exists(path).await?;
    let txt = fs::read_to_string(path).await?;
    Ok(txt
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::png;

    #[tokio::test]
    async fn missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("nope.png")).await.unwrap_err();
        assert!(matches!(err, GenError::InputNotFound(_)));
    }

    #[tokio::test]
    async fn mime_type_comes_from_content() {
        let dir = tempfile::tempdir().unwrap();
        // misleading extension on purpose
        let path = dir.path().join("scene.jpg");
        std::fs::write(&path, png(3)).unwrap();
        let img = load_image(&path).await.unwrap();
        assert_eq!(img.mime_type, "image/png");
    }

    #[tokio::test]
    async fn bmp_input_is_uploaded_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.bmp");
        image::load_from_memory(&png(3)).unwrap().save(&path).unwrap();
        let img = load_image(&path).await.unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(image::guess_format(&img.bytes).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn jpeg_input_is_sent_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.jpg");
        image::load_from_memory(&png(3)).unwrap().to_rgb8().save(&path).unwrap();
        let img = load_image(&path).await.unwrap();
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(img.bytes, std::fs::read(&path).unwrap());
    }

    #[tokio::test]
    async fn same_format_is_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.png");
        let bytes = png(10);
        save_output(&out, &InlineImage { mime_type: "image/png".into(), bytes: bytes.clone() })
            .await
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), bytes);
        assert!(!dir.path().join("out.png.tmp").exists());
    }

    #[tokio::test]
    async fn png_is_converted_for_jpeg_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.jpg");
        save_output(&out, &InlineImage { mime_type: "image/png".into(), bytes: png(10) })
            .await
            .unwrap();
        let written = std::fs::read(&out).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn unknown_output_extension_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.xyz");
        let err = save_output(&out, &InlineImage { mime_type: "image/png".into(), bytes: png(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Image { .. }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn lists_only_supported_images_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.bmp", "notes.txt", "d.jpeg", "e.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();
        let names: Vec<String> = list_images(dir.path())
            .await
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.bmp", "d.jpeg"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_images_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        let input = dir.path().join("in");
        std::fs::create_dir(&real).unwrap();
        std::fs::create_dir(&input).unwrap();
        std::fs::write(real.join("a.png"), png(1)).unwrap();
        std::os::unix::fs::symlink(real.join("a.png"), input.join("a.png")).unwrap();

        let listed = list_images(&input).await.unwrap();
        assert_eq!(listed, vec![input.join("a.png")]);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a directory squatting on the output path makes the final rename fail
        let out = dir.path().join("out.png");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("keep"), b"x").unwrap();
        let res = save_output(&out, &InlineImage { mime_type: "image/png".into(), bytes: png(1) }).await;
        assert!(matches!(res, Err(GenError::Io(_))));
        assert!(!dir.path().join("out.png.tmp").exists());
    }

    #[tokio::test]
    async fn texts_skip_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("texts.txt");
        std::fs::write(&path, "Team Alpha\n\n   \n  GO BLUE  \n").unwrap();
        assert_eq!(load_texts(&path).await.unwrap(), vec!["Team Alpha", "GO BLUE"]);
    }
}
