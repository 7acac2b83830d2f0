//! Extension and mimetype helpers for downloaded files.

/// Extensions that are recognised even though no registry maps them.
/// Cloud documents converted by the server, plus scripts served as downloads.
const EXTRA_EXTENSIONS: &[&str] = &["gdoc", "gsheet", "gslides", "gdraw", "php"];

/// Preferred extension for mimetypes that map to several.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("application/msword", "doc"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("audio/mpeg", "mp3"),
    ("image/jpeg", "jpg"),
    ("image/svg+xml", "svg"),
    ("image/tiff", "tiff"),
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("video/mp4", "mp4"),
    ("video/quicktime", "mov"),
];

fn is_known_extension(extension: &str) -> bool {
    EXTRA_EXTENSIONS.contains(&extension) || mime_guess::from_ext(extension).first().is_some()
}

/// Strip query string and fragment from a file name or URL tail.
fn clean_extension(extension: &str) -> &str {
    let end = extension.find(['?', '#']).unwrap_or(extension.len());
    &extension[..end]
}

fn last_segment(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Lowercased extension of a path or URL, if it is a known one.
pub fn get_file_extension(path: &str) -> Option<String> {
    let name = last_segment(path);
    let (_, extension) = name.rsplit_once('.')?;
    let extension = clean_extension(extension).to_lowercase();

    if extension.is_empty() {
        return None;
    }
    if !is_known_extension(&extension) {
        tracing::debug!(extension = %extension, "Invalid extension");
        return None;
    }
    Some(extension)
}

/// Byte offset of the extension dot in a local path and the text after it.
/// `?` and `#` are ordinary file name characters here.
fn split_local_extension(path: &str) -> Option<(usize, &str)> {
    let dot = path.rfind('.')?;
    let name_start = path.rfind(['/', '\\']).map_or(0, |sep| sep + 1);
    (dot > name_start).then(|| (dot, &path[dot + 1..]))
}

/// Lowercased extension of a local file path, if it is a known one.
pub fn get_path_extension(path: &str) -> Option<String> {
    let (_, extension) = split_local_extension(path)?;
    let extension = extension.to_lowercase();
    (!extension.is_empty() && is_known_extension(&extension)).then_some(extension)
}

/// Remove a known extension from a local path. Unknown extensions are kept.
pub fn remove_extension(path: &str) -> String {
    match split_local_extension(path) {
        Some((dot, extension)) if is_known_extension(&extension.to_lowercase()) => path[..dot].to_string(),
        _ => path.to_string(),
    }
}

/// Extension for a mimetype. When several match, the URL's own extension wins
/// if it is one of them.
pub fn get_extension(mimetype: &str, url: Option<&str>) -> Option<String> {
    let mimetype = mimetype.split(';').next().unwrap_or_default().trim().to_lowercase();
    if mimetype == "application/x-forcedownload" || mimetype == "application/forcedownload" {
        return None;
    }

    let candidates = mime_guess::get_mime_extensions_str(&mimetype)?;
    if candidates.is_empty() {
        return None;
    }

    if candidates.len() > 1 {
        if let Some(candidate) = url.and_then(get_file_extension) {
            if candidates.contains(&candidate.as_str()) {
                return Some(candidate);
            }
        }
    }

    PREFERRED_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == mimetype)
        .map(|(_, ext)| (*ext).to_string())
        .or_else(|| candidates.first().map(|ext| (*ext).to_string()))
}
