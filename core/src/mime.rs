//! Content types by file extension.

use std::path::Path;

use mime_guess::mime;

/// Content type for `path`, guessed from its extension.
///
/// Unknown extensions are `application/octet-stream`. Text and JavaScript
/// types carry `charset=utf-8`.
pub fn content_type(path: &Path) -> String {
    let guess = mime_guess::from_path(path).first_or_octet_stream();
    let textual = guess.type_() == mime::TEXT || guess.subtype() == mime::JAVASCRIPT;
    if textual && guess.get_param(mime::CHARSET).is_none() {
        format!("{}; charset=utf-8", guess.essence_str())
    } else {
        guess.to_string()
    }
}

/// Whether responses for `path` go through the HTML transformer.
pub fn is_html(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .is_some_and(|guess| guess.type_() == mime::TEXT && guess.subtype() == mime::HTML)
}
