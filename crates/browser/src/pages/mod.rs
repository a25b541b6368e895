//! Console page objects
//!
//! Each page method generates one script run: navigate, interact, extract,
//! return JSON. Selector chains start with stable test ids and fall back to
//! structural selectors, since console markup shifts between releases.
//! Because every script run starts on a blank page (the profile persists,
//! the tab does not), each method navigates before it touches anything.

pub mod connections;
pub mod login;
pub mod webhook;

pub use connections::{ConnectionsPage, DestinationInfo, SourceInfo};
pub use login::LoginPage;
pub use webhook::WebhookDestinationPage;

use crate::driver::{js_string, js_string_array};

/// Script that walks the first matching row selector chain and returns one
/// JSON object per row: the requested inner-cell texts plus the row text.
pub(crate) fn rows_script(url: &str, row_selectors: &[&str], fields: &[(&str, &str)]) -> String {
    let mut picks = String::new();
    for (name, inner) in fields {
        picks.push_str(&format!("    {}: await pick({}),\n", name, js_string(inner)));
    }
    format!(
        "await page.goto({url}, {{ waitUntil: 'networkidle' }});\n\
         const rows = [];\n\
         for (const sel of {selectors}) {{\n\
           const locs = page.locator(sel);\n\
           const count = await locs.count();\n\
           if (count === 0) continue;\n\
           for (let i = 0; i < count; i++) {{\n\
             const row = locs.nth(i);\n\
             const pick = async (inner) => {{\n\
               const el = row.locator(inner).first();\n\
               return (await el.count()) > 0 ? ((await el.textContent()) || '').trim() : null;\n\
             }};\n\
             rows.push({{\n{picks}    text: ((await row.textContent()) || '').trim(),\n  }});\n\
           }}\n\
           break;\n\
         }}\n\
         return rows;",
        url = js_string(url),
        selectors = js_string_array(row_selectors),
        picks = picks,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_script_embeds_fields_and_selectors() {
        let script = rows_script(
            "https://x.io/connections",
            &[".source-item"],
            &[("name", ".source-name"), ("write_key", ".write-key")],
        );
        assert!(script.contains("name: await pick(\".source-name\")"));
        assert!(script.contains("write_key: await pick(\".write-key\")"));
        assert!(script.contains(".source-item"));
        assert!(script.contains("return rows;"));
    }
}
