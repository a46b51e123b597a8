//! Browser UI surface driven through generated Playwright scripts
//!
//! Each operation builds a self-contained JavaScript program (launch the
//! profile's browser, open a context with the profile's viewport/device
//! emulation, log in, perform the check), writes it to a temp dir, runs it
//! with `node`, and parses the final JSON line of stdout. Scripts are
//! stateless between runs, so every operation re-authenticates inside the
//! generated program with the credentials captured by `login`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crossflow_common::config::Timing;
use crossflow_common::types::{Credentials, PlatformProfile, ProjectDetail};
use crossflow_common::{Error, Result};

use crate::surface::{Gesture, UiSurface, UiSurfaceFactory};
use crate::waits::{wait_until, WaitSpec};

const EMAIL_INPUT: &str = "#email";
const PASSWORD_INPUT: &str = "#password";
const LOGIN_BUTTON: &str = "#login-btn";
const WELCOME_BANNER: &str = ".welcome-message";
const PROJECT_LIST: &str = ".project-list";
const PROJECT_DETAILS: &str = ".project-details";

/// One browser-rendered surface, parameterized by a platform profile
pub struct BrowserSurface {
    web_base_url: String,
    profile: PlatformProfile,
    headless: bool,
    poll_interval: Duration,
    selector_timeout_ms: u64,
    credentials: Mutex<Option<Credentials>>,
}

/// Escape a Rust string into a double-quoted JS string literal
fn js_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn project_card_selector(name: &str) -> String {
    // :has-text takes a quoted literal inside the selector string;
    // JS-level escaping happens when the selector is embedded via js_str
    format!(".project-card:has-text(\"{}\")", name.replace('"', "\\\""))
}

impl BrowserSurface {
    pub fn new(
        web_base_url: &str,
        profile: PlatformProfile,
        headless: bool,
        timing: &Timing,
    ) -> Self {
        Self {
            web_base_url: web_base_url.trim_end_matches('/').to_string(),
            profile,
            headless,
            poll_interval: timing.poll_interval(),
            selector_timeout_ms: timing.ui_visibility_deadline_ms,
            credentials: Mutex::new(None),
        }
    }

    fn stored_credentials(&self) -> Result<Credentials> {
        self.credentials
            .lock()
            .clone()
            .ok_or_else(|| Error::Auth(format!("login() not called on {}", self.profile.label)))
    }

    fn context_options(&self) -> String {
        let mut opts = vec![format!(
            "viewport: {{ width: {}, height: {} }}",
            self.profile.viewport.width, self.profile.viewport.height
        )];
        if let Some(ua) = &self.profile.user_agent {
            opts.push(format!("userAgent: {}", js_str(ua)));
        }
        opts.push(format!("deviceScaleFactor: {}", self.profile.device_scale_factor));
        if self.profile.is_mobile() {
            opts.push("isMobile: true".into());
        }
        if self.profile.has_touch {
            opts.push("hasTouch: true".into());
        }
        format!("{{ {} }}", opts.join(", "))
    }

    /// Wrap a script body in the launch/teardown boilerplate. The body must
    /// print exactly one `{ ok: true, value: ... }` JSON line on success.
    fn script(&self, body: &str) -> String {
        format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({options});
  const page = await context.newPage();
  const baseUrl = {base_url};

  try {{
{body}
  }} catch (error) {{
    console.error(JSON.stringify({{ ok: false, error: error.message }}));
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            browser = self.profile.browser.as_str(),
            headless = self.headless,
            options = self.context_options(),
            base_url = js_str(&self.web_base_url),
        )
    }

    fn login_js(&self, credentials: &Credentials) -> String {
        format!(
            r#"    await page.goto(baseUrl + '/login', {{ waitUntil: 'networkidle' }});
    await page.fill('{email_sel}', {email});
    await page.fill('{password_sel}', {password});
    await Promise.all([
      page.waitForNavigation({{ waitUntil: 'networkidle' }}),
      page.click('{button_sel}'),
    ]);
    await page.waitForSelector('{welcome_sel}', {{ timeout: {timeout} }});"#,
            email_sel = EMAIL_INPUT,
            password_sel = PASSWORD_INPUT,
            button_sel = LOGIN_BUTTON,
            welcome_sel = WELCOME_BANNER,
            email = js_str(&credentials.email),
            password = js_str(&credentials.password),
            timeout = self.selector_timeout_ms,
        )
    }

    fn goto_projects_js(&self) -> String {
        format!(
            r#"    await page.goto(baseUrl + '/dashboard/projects', {{ waitUntil: 'networkidle' }});
    await page.waitForSelector('{list_sel}', {{ timeout: {timeout} }});"#,
            list_sel = PROJECT_LIST,
            timeout = self.selector_timeout_ms,
        )
    }

    fn visibility_body(&self, credentials: &Credentials, name: &str) -> String {
        format!(
            r#"{login}
{goto}
    const count = await page.locator({card}).count();
    console.log(JSON.stringify({{ ok: true, value: count > 0 }}));"#,
            login = self.login_js(credentials),
            goto = self.goto_projects_js(),
            card = js_str(&project_card_selector(name)),
        )
    }

    fn detail_body(&self, credentials: &Credentials, name: &str) -> String {
        format!(
            r#"{login}
{goto}
    await page.locator({card}).first().click();
    await page.waitForSelector('{details_sel}', {{ timeout: {timeout} }});
    const detail = {{
      name: (await page.locator('.project-title').innerText()).trim(),
      description: (await page.locator('.project-description').innerText()).trim(),
      collaborators: await page.locator('.team-members li').allInnerTexts(),
    }};
    console.log(JSON.stringify({{ ok: true, value: detail }}));"#,
            login = self.login_js(credentials),
            goto = self.goto_projects_js(),
            card = js_str(&project_card_selector(name)),
            details_sel = PROJECT_DETAILS,
            timeout = self.selector_timeout_ms,
        )
    }

    fn gesture_body(&self, credentials: &Credentials, target: &str, gesture: Gesture) -> String {
        let action = match gesture {
            Gesture::Tap => "    await el.tap();".to_string(),
            Gesture::SwipeLeft => r#"    const box = await el.boundingBox();
    const y = box.y + box.height / 2;
    await page.mouse.move(box.x + box.width - 10, y);
    await page.mouse.down();
    await page.mouse.move(box.x + 10, y, { steps: 10 });
    await page.mouse.up();"#
                .to_string(),
        };
        format!(
            r#"{login}
{goto}
    const el = page.locator({card}).first();
    await el.waitFor({{ state: 'visible', timeout: {timeout} }});
{action}
    console.log(JSON.stringify({{ ok: true, value: true }}));"#,
            login = self.login_js(credentials),
            goto = self.goto_projects_js(),
            card = js_str(&project_card_selector(target)),
            timeout = self.selector_timeout_ms,
        )
    }

    /// Run a generated script with node and parse the final JSON line.
    async fn run_script(&self, script: &str) -> Result<serde_json::Value> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("surface.js");
        std::fs::write(&path, script)?;

        debug!(profile = %self.profile.label, "running browser script");
        let output = TokioCommand::new("node").arg(&path).output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::BrowserDriver(format!(
                "script failed on {}: {stderr}{stdout}",
                self.profile.label
            )));
        }

        let line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| Error::BrowserDriver("script produced no output".into()))?;
        let value: serde_json::Value = serde_json::from_str(line.trim())
            .map_err(|e| Error::BrowserDriver(format!("unparseable script output: {e}: {line}")))?;

        if value.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            return Err(Error::BrowserDriver(format!("script reported failure: {value}")));
        }
        Ok(value.get("value").cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl UiSurface for BrowserSurface {
    async fn login(&self, credentials: &Credentials) -> Result<()> {
        let body = format!(
            "{}\n    console.log(JSON.stringify({{ ok: true, value: true }}));",
            self.login_js(credentials)
        );
        self.run_script(&self.script(&body)).await?;
        *self.credentials.lock() = Some(credentials.clone());
        Ok(())
    }

    async fn is_project_visible(&self, name: &str, deadline: Duration) -> Result<bool> {
        let credentials = self.stored_credentials()?;
        let script = self.script(&self.visibility_body(&credentials, name));
        let what = format!("project '{name}' visible on {}", self.profile.label);

        let spec = WaitSpec::new(deadline, self.poll_interval);
        match wait_until(spec, &what, || {
            let script = script.clone();
            async move { Ok(self.run_script(&script).await?.as_bool().unwrap_or(false)) }
        })
        .await
        {
            Ok(()) => Ok(true),
            Err(Error::VerificationTimeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn read_project_detail(&self, name: &str) -> Result<ProjectDetail> {
        let credentials = self.stored_credentials()?;
        let value = self
            .run_script(&self.script(&self.detail_body(&credentials, name)))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::BrowserDriver(format!("malformed project detail: {e}")))
    }

    async fn perform_gesture(&self, target: &str, gesture: Gesture) -> Result<()> {
        let credentials = self.stored_credentials()?;
        self.run_script(&self.script(&self.gesture_body(&credentials, target, gesture)))
            .await?;
        Ok(())
    }
}

/// Factory minting one `BrowserSurface` per platform profile
pub struct PlaywrightFactory {
    web_base_url: String,
    headless: bool,
    timing: Timing,
}

impl PlaywrightFactory {
    pub fn new(web_base_url: &str, headless: bool, timing: Timing) -> Result<Self> {
        check_node_installed()?;
        Ok(Self {
            web_base_url: web_base_url.to_string(),
            headless,
            timing,
        })
    }
}

impl UiSurfaceFactory for PlaywrightFactory {
    fn surface_for(&self, profile: &PlatformProfile) -> Arc<dyn UiSurface> {
        Arc::new(BrowserSurface::new(
            &self.web_base_url,
            profile.clone(),
            self.headless,
            &self.timing,
        ))
    }
}

fn check_node_installed() -> Result<()> {
    use std::process::{Command, Stdio};

    let status = Command::new("node")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(s) if s.success() => Ok(()),
        _ => Err(Error::NodeNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossflow_common::types::{Browser, ProfileKind, Viewport};

    fn mobile_profile() -> PlatformProfile {
        PlatformProfile {
            label: "iphone".into(),
            kind: ProfileKind::Mobile,
            browser: Browser::Webkit,
            viewport: Viewport { width: 375, height: 812 },
            user_agent: Some("iPhone UA".into()),
            device_scale_factor: 3,
            has_touch: true,
        }
    }

    fn surface(profile: PlatformProfile) -> BrowserSurface {
        BrowserSurface::new("https://app.example", profile, true, &Timing::default())
    }

    fn creds() -> Credentials {
        Credentials { email: "admin@company1.com".into(), password: "password123".into() }
    }

    #[test]
    fn js_str_escapes_quotes_and_backslashes() {
        assert_eq!(js_str(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn mobile_script_carries_device_emulation() {
        let s = surface(mobile_profile());
        let script = s.script("    // body");
        assert!(script.contains("webkit.launch"));
        assert!(script.contains("isMobile: true"));
        assert!(script.contains("hasTouch: true"));
        assert!(script.contains("deviceScaleFactor: 3"));
        assert!(script.contains(r#"userAgent: "iPhone UA""#));
        assert!(script.contains("width: 375, height: 812"));
    }

    #[test]
    fn desktop_script_omits_mobile_emulation() {
        let mut profile = mobile_profile();
        profile.kind = ProfileKind::Desktop;
        profile.has_touch = false;
        profile.user_agent = None;
        profile.browser = Browser::Chromium;
        let script = surface(profile).script("    // body");
        assert!(script.contains("chromium.launch"));
        assert!(!script.contains("isMobile"));
        assert!(!script.contains("userAgent"));
    }

    #[test]
    fn login_body_fills_the_login_form() {
        let s = surface(mobile_profile());
        let body = s.login_js(&creds());
        assert!(body.contains("'#email'"));
        assert!(body.contains(r#""admin@company1.com""#));
        assert!(body.contains("'#login-btn'"));
        assert!(body.contains(".welcome-message"));
    }

    #[test]
    fn visibility_body_targets_the_named_card() {
        let s = surface(mobile_profile());
        let body = s.visibility_body(&creds(), "Test Project ab12cd34");
        assert!(body.contains("Test Project ab12cd34"));
        assert!(body.contains(".project-card:has-text("));
        assert!(body.contains("count > 0"));
    }

    #[test]
    fn swipe_gesture_moves_across_the_card() {
        let s = surface(mobile_profile());
        let body = s.gesture_body(&creds(), "P1", Gesture::SwipeLeft);
        assert!(body.contains("page.mouse.down()"));
        assert!(body.contains("steps: 10"));
        let tap = s.gesture_body(&creds(), "P1", Gesture::Tap);
        assert!(tap.contains("el.tap()"));
    }
}
