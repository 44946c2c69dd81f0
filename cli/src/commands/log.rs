use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use std::process;

use psmf_core::analysis::{AnalysisRequest, DEFAULT_IMAGE_MIME, FoodAnalyzer};
use psmf_core::service::PsmfService;

use super::helpers::{format_macros, json_error, print_entries_table, resolve_id};

/// Photos larger than this are refused before anything is sent.
const MAX_PHOTO_BYTES: u64 = 15 * 1024 * 1024;

#[allow(clippy::cast_precision_loss)]
pub(crate) fn read_photo_base64(path: &Path) -> Result<String> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read photo: {}", path.display()))?
        .len();
    if size > MAX_PHOTO_BYTES {
        bail!(
            "Photo is too large ({:.1} MB, max 15 MB)",
            size as f64 / (1024.0 * 1024.0)
        );
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read photo: {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

/// Media type from the photo's file extension. Unknown extensions fall back to JPEG.
pub(crate) fn photo_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => DEFAULT_IMAGE_MIME,
    }
}

pub(crate) fn build_request(text: Option<String>, photo: Option<&Path>) -> Result<AnalysisRequest> {
    let request = match photo {
        Some(path) => AnalysisRequest::image(&read_photo_base64(path)?, text.as_deref())
            .with_image_mime(photo_mime(path)),
        None => AnalysisRequest {
            text,
            ..AnalysisRequest::default()
        },
    };
    request.validate()?;
    Ok(request)
}

pub(crate) async fn cmd_log(
    svc: &mut PsmfService,
    analyzer: &dyn FoodAnalyzer,
    text: Option<String>,
    photo: Option<&Path>,
    json: bool,
) -> Result<()> {
    let request = build_request(text, photo)?;
    if !json {
        eprintln!("Analysing...");
    }
    let entry = svc.log_food(analyzer, &request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("Logged: {} ({})", entry.name, format_macros(&entry.macros));
        if !entry.micronutrients.is_empty() {
            println!("  Micronutrients: {}", entry.micronutrients.join(", "));
        }
        if let Some(ref notes) = entry.notes {
            println!("  Notes: {notes}");
        }
        println!("Today: {} | score {}%", format_macros(&svc.current_macros()), svc.score());
    }
    Ok(())
}

pub(crate) fn cmd_entries(svc: &PsmfService, json: bool) -> Result<()> {
    let entries = svc.entries();

    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("Nothing logged today. Use `psmf log \"...\"` to add food.");
        process::exit(2);
    }

    print_entries_table(entries);
    println!("  TOTAL: {}", format_macros(&svc.current_macros()));
    Ok(())
}

pub(crate) fn cmd_remove(svc: &mut PsmfService, id: &str, json: bool) -> Result<()> {
    let id = match resolve_id(svc.entries().iter().map(|e| e.id.as_str()), id) {
        Ok(id) => id,
        Err(e) => {
            if json {
                println!("{}", json_error(&format!("{e}")));
            } else {
                eprintln!("{e}");
            }
            process::exit(2);
        }
    };
    svc.remove_entry(&id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted entry {id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_build_request_text() {
        let r = build_request(Some("3 eggs".to_string()), None).unwrap();
        assert_eq!(r.text.as_deref(), Some("3 eggs"));
        assert!(!r.has_image());
    }

    #[test]
    fn test_build_request_requires_input() {
        assert!(build_request(None, None).is_err());
        assert!(build_request(Some("  ".to_string()), None).is_err());
    }

    #[test]
    fn test_build_request_photo() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ABC").unwrap();
        let r = build_request(Some("lunch".to_string()), Some(file.path())).unwrap();
        assert_eq!(r.image_base64.as_deref(), Some("QUJD"));
        assert_eq!(r.caption(), Some("lunch"));
    }

    #[test]
    fn test_photo_mime_from_extension() {
        assert_eq!(photo_mime(Path::new("lunch.PNG")), "image/png");
        assert_eq!(photo_mime(Path::new("lunch.webp")), "image/webp");
        assert_eq!(photo_mime(Path::new("lunch.jpeg")), "image/jpeg");
        assert_eq!(photo_mime(Path::new("lunch")), "image/jpeg");
    }

    #[test]
    fn test_build_request_photo_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.png");
        std::fs::write(&path, b"ABC").unwrap();
        let r = build_request(None, Some(&path)).unwrap();
        assert_eq!(r.mime_type(), "image/png");
    }

    #[test]
    fn test_missing_photo_is_error() {
        assert!(read_photo_base64(Path::new("/definitely/not/here.jpg")).is_err());
    }
}
