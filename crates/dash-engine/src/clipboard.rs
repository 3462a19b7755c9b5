//! Best-effort clipboard copy of playback URLs.

use tracing::{debug, warn};

/// Copy `url` to the system clipboard.  When no clipboard is available
/// (headless session, denied access) the URL is printed to stdout instead,
/// so the operator can still grab it.  Returns whether the clipboard path
/// succeeded.
pub fn copy_url(url: &str) -> bool {
    match arboard::Clipboard::new().and_then(|mut clip| clip.set_text(url.to_string())) {
        Ok(()) => {
            debug!("clipboard: copied {}", url);
            true
        }
        Err(e) => {
            warn!("clipboard: unavailable ({}), printing instead", e);
            println!("{}", url);
            false
        }
    }
}
