//! Console login page.

use serde::Deserialize;
use tracing::{debug, info};

use pipecheck_common::{Error, Result};

use crate::driver::{js_string, js_string_array, BrowserSession};

const EMAIL_INPUTS: [&str; 4] = [
    "[data-testid=\"email-input\"]",
    "input[type=\"email\"]",
    "input[name=\"email\"]",
    "#email",
];

const PASSWORD_INPUTS: [&str; 4] = [
    "[data-testid=\"password-input\"]",
    "input[type=\"password\"]",
    "input[name=\"password\"]",
    "#password",
];

const SUBMIT_BUTTONS: [&str; 3] = [
    "[data-testid=\"login-button\"]",
    "button[type=\"submit\"]",
    "button:has-text(\"Log in\")",
];

const LOGGED_IN_INDICATORS: [&str; 4] = [
    "[data-testid=\"user-menu\"]",
    "[data-testid=\"app-sidebar\"]",
    "nav[aria-label=\"Main\"]",
    ".user-avatar",
];

const ERROR_BANNERS: [&str; 3] = [
    "[data-testid=\"login-error\"]",
    "[role=\"alert\"]",
    ".error-message",
];

#[derive(Debug, Deserialize)]
struct LoginScrape {
    logged_in: bool,
    error: Option<String>,
}

pub struct LoginPage<'s> {
    session: &'s BrowserSession,
    base_url: String,
}

impl<'s> LoginPage<'s> {
    pub fn new(session: &'s BrowserSession, base_url: impl Into<String>) -> Self {
        Self {
            session,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn login_url(&self) -> String {
        format!("{}/login", self.base_url)
    }

    /// Navigate to the login form and wait for it to render.
    pub async fn open(&self) -> Result<()> {
        let body = open_script(&self.login_url());
        self.session.eval(&body).await.map_err(|e| Error::Navigation {
            page: "login".to_string(),
            reason: e.to_string(),
        })?;
        debug!(url = %self.login_url(), "login form rendered");
        Ok(())
    }

    /// Submit credentials and confirm the console accepted them.
    ///
    /// A failed attempt surfaces whatever banner the console showed, so the
    /// caller can tell bad credentials apart from a page that never loaded.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        debug!(email, "submitting login form");
        let body = login_script(&self.login_url(), email, password);
        let value = self.session.eval(&body).await.map_err(|e| Error::Navigation {
            page: "login".to_string(),
            reason: e.to_string(),
        })?;
        let scrape: LoginScrape = serde_json::from_value(value)
            .map_err(|e| Error::Scrape(format!("login result: {e}")))?;

        if scrape.logged_in {
            info!(email, "logged in to console");
            Ok(())
        } else {
            Err(Error::Navigation {
                page: "login".to_string(),
                reason: scrape
                    .error
                    .unwrap_or_else(|| "no logged-in indicator after submit".to_string()),
            })
        }
    }

    /// Whether a previous login in this session is still valid.
    pub async fn is_logged_in(&self) -> Result<bool> {
        let body = format!(
            "await page.goto({url}, {{ waitUntil: 'networkidle' }});\n\
             return (await firstPresent({indicators})) !== null;",
            url = js_string(&self.base_url),
            indicators = js_string_array(&LOGGED_IN_INDICATORS),
        );
        let value = self.session.eval(&body).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Any error banner currently shown on the login page.
    pub async fn error_message(&self) -> Result<Option<String>> {
        let body = format!(
            "await page.goto({url}, {{ waitUntil: 'networkidle' }});\n\
             const banner = await firstPresent({banners});\n\
             return banner ? await textOf(banner) : null;",
            url = js_string(&self.login_url()),
            banners = js_string_array(&ERROR_BANNERS),
        );
        let value = self.session.eval(&body).await?;
        Ok(value
            .as_str()
            .map(str::to_string)
            .filter(|s| !s.is_empty()))
    }
}

fn open_script(login_url: &str) -> String {
    format!(
        "await page.goto({url}, {{ waitUntil: 'domcontentloaded' }});\n\
         const emailInput = await firstPresent({emails});\n\
         if (!emailInput) throw new Error('login form did not appear');\n\
         return true;",
        url = js_string(login_url),
        emails = js_string_array(&EMAIL_INPUTS),
    )
}

fn login_script(login_url: &str, email: &str, password: &str) -> String {
    format!(
        "await page.goto({url}, {{ waitUntil: 'domcontentloaded' }});\n\
         const emailInput = await firstPresent({emails});\n\
         const passwordInput = await firstPresent({passwords});\n\
         if (!emailInput || !passwordInput) throw new Error('login form did not appear');\n\
         await emailInput.fill({email_value});\n\
         await passwordInput.fill({password_value});\n\
         const submit = await firstPresent({submits});\n\
         if (!submit) throw new Error('login submit button not found');\n\
         await submit.click();\n\
         await page.waitForLoadState('networkidle');\n\
         const indicator = await firstPresent({indicators});\n\
         if (indicator) return {{ logged_in: true, error: null }};\n\
         const banner = await firstPresent({banners});\n\
         return {{ logged_in: false, error: banner ? await textOf(banner) : null }};",
        url = js_string(login_url),
        emails = js_string_array(&EMAIL_INPUTS),
        passwords = js_string_array(&PASSWORD_INPUTS),
        email_value = js_string(email),
        password_value = js_string(password),
        submits = js_string_array(&SUBMIT_BUTTONS),
        indicators = js_string_array(&LOGGED_IN_INDICATORS),
        banners = js_string_array(&ERROR_BANNERS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_script_escapes_credentials() {
        let script = login_script("https://app.example.io/login", "a@b.io", "p\"ss'wd\\");
        assert!(script.contains(r#""a@b.io""#));
        assert!(script.contains(r#""p\"ss'wd\\""#));
        assert!(script.contains("waitForLoadState"));
    }

    #[test]
    fn open_script_checks_for_the_form() {
        let script = open_script("https://app.example.io/login");
        assert!(script.contains("input[type=\\\"email\\\"]"));
        assert!(script.contains("login form did not appear"));
    }
}
