//! Call-control markup that plays the unlock tone to the callbox.

use callbox_core::config::UnlockConfig;
use std::fmt::Write;

use crate::markup::escape_markup;

pub const CONTENT_TYPE: &str = "application/xml";

/// Builds the TeXML response: one `<Play>` per iteration, a `<Pause>` between
/// iterations (none after the last), then `<Hangup/>`.
///
/// The audio file carries a held DTMF tone; `<Play digits>` only produces
/// short tones, which the callbox ignores.
pub fn unlock_texml(unlock: &UnlockConfig) -> String {
    let audio = escape_markup(&unlock.audio_url);
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n");

    for i in 0..unlock.iterations {
        let _ = writeln!(xml, "    <Play>{}</Play>", audio);
        if i + 1 < unlock.iterations {
            let _ = writeln!(xml, "    <Pause length=\"{}\"/>", unlock.pause_seconds);
        }
    }

    xml.push_str("    <Hangup/>\n</Response>");
    xml
}
