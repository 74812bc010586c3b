//! Appium (W3C WebDriver) session client.

use super::{DeviceSession, NativeElement, NativeSelector, PointerSequence, SessionFactory};
use crate::config::{AppiumConfig, FlowConfig};
use crate::core::{AppState, Rect, ScreenSize};
use crate::errors::{FlowError, TransportError};
use crate::vision::TemplateImage;
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// W3C key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// A live Appium session.
#[derive(Debug)]
pub struct AppiumSession {
    client: Client,
    base_url: String,
    session_id: String,
    closed: AtomicBool,
}

impl AppiumSession {
    /// Creates a new session on the server with UiAutomator2 capabilities.
    pub async fn connect(config: &AppiumConfig) -> Result<Self, FlowError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(TransportError::from)?;
        let base_url = config.server_url.trim_end_matches('/').to_string();

        info!(server = %base_url, package = %config.app_package, "Creating Appium session");
        let response = client
            .post(format!("{base_url}/session"))
            .json(&capabilities(config))
            .send()
            .await
            .map_err(TransportError::from)?;
        let status = response.status();
        let body = response.text().await.map_err(TransportError::from)?;
        let value = parse_response(status, &body)?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::InvalidResponse("missing sessionId".into()))?
            .to_string();
        info!(session_id = %session_id, "Appium session created");

        Ok(Self {
            client,
            base_url,
            session_id,
            closed: AtomicBool::new(false),
        })
    }

    /// The server-assigned session id.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, FlowError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SessionClosed.into());
        }
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        debug!(method = %method, path = %path, "WebDriver command");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(TransportError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(TransportError::from)?;
        Ok(parse_response(status, &text)?)
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value, FlowError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({"script": script, "args": [args]})),
        )
        .await
    }

    async fn find_element(&self, using: &str, value: &str) -> Result<NativeElement, FlowError> {
        let found = self
            .command(
                Method::POST,
                "/element",
                Some(json!({"using": using, "value": value})),
            )
            .await?;
        Ok(element_ref(&found)?)
    }

    async fn element_rect(&self, element: &NativeElement) -> Result<Rect, FlowError> {
        let value = self
            .command(Method::GET, &format!("/element/{}/rect", element.id()), None)
            .await?;
        Ok(parse_rect(&value)?)
    }
}

#[async_trait]
impl DeviceSession for AppiumSession {
    async fn activate_app(&self, package: &str) -> Result<(), FlowError> {
        self.execute("mobile: activateApp", json!({"appId": package}))
            .await
            .map(|_| ())
    }

    async fn clear_app_data(&self, package: &str) -> Result<(), FlowError> {
        self.execute("mobile: clearApp", json!({"appId": package}))
            .await
            .map(|_| ())
    }

    async fn current_package(&self) -> Result<Option<String>, FlowError> {
        let value = self.execute("mobile: getCurrentPackage", json!({})).await?;
        Ok(value
            .as_str()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string))
    }

    async fn query_app_state(&self, package: &str) -> Result<AppState, FlowError> {
        let value = self
            .execute("mobile: queryAppState", json!({"appId": package}))
            .await?;
        let code = value
            .as_i64()
            .ok_or_else(|| TransportError::InvalidResponse(format!("app state {value}")))?;
        AppState::from_code(code).ok_or_else(|| {
            TransportError::InvalidResponse(format!("unknown app state code {code}")).into()
        })
    }

    async fn perform(&self, sequence: &PointerSequence) -> Result<(), FlowError> {
        self.command(Method::POST, "/actions", Some(sequence.to_w3c()))
            .await
            .map(|_| ())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, FlowError> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| TransportError::InvalidResponse("screenshot is not a string".into()))?;
        Ok(decode_screenshot(encoded)?)
    }

    async fn screen_size(&self) -> Result<ScreenSize, FlowError> {
        let value = self.command(Method::GET, "/window/rect", None).await?;
        let rect = parse_rect(&value)?;
        Ok(ScreenSize::new(rect.width, rect.height))
    }

    async fn back(&self) -> Result<(), FlowError> {
        self.command(Method::POST, "/back", Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn quit(&self) -> Result<(), FlowError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(TransportError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(TransportError::from)?;
        if let Err(err) = parse_response(status, &text) {
            warn!(error = %err, "Session delete reported an error");
            return Err(err.into());
        }
        info!(session_id = %self.session_id, "Appium session closed");
        Ok(())
    }

    async fn implicit_wait(&self) -> Result<Duration, FlowError> {
        let value = self.command(Method::GET, "/timeouts", None).await?;
        let millis = value
            .get("implicit")
            .and_then(Value::as_u64)
            .ok_or_else(|| TransportError::InvalidResponse("missing implicit timeout".into()))?;
        Ok(Duration::from_millis(millis))
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn set_implicit_wait(&self, wait: Duration) -> Result<(), FlowError> {
        self.command(
            Method::POST,
            "/timeouts",
            Some(json!({"implicit": wait.as_millis() as u64})),
        )
        .await
        .map(|_| ())
    }

    async fn find_image(&self, template: &TemplateImage) -> Result<Rect, FlowError> {
        let element = self.find_element("-image", template.base64()).await?;
        self.element_rect(&element).await
    }

    async fn find_native(&self, selector: &NativeSelector) -> Result<NativeElement, FlowError> {
        let (using, value) = selector.to_locator();
        self.find_element(using, &value).await
    }

    async fn find_all_native(
        &self,
        selector: &NativeSelector,
    ) -> Result<Vec<NativeElement>, FlowError> {
        let (using, value) = selector.to_locator();
        let found = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({"using": using, "value": value})),
            )
            .await?;
        let items = found
            .as_array()
            .ok_or_else(|| TransportError::InvalidResponse("elements is not an array".into()))?;
        items
            .iter()
            .map(|item| element_ref(item).map_err(FlowError::from))
            .collect()
    }

    async fn click_native(&self, element: &NativeElement) -> Result<(), FlowError> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.id()),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    async fn element_text(&self, element: &NativeElement) -> Result<String, FlowError> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", element.id()), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn element_enabled(&self, element: &NativeElement) -> Result<bool, FlowError> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/enabled", element.id()),
                None,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

/// Connects [`AppiumSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppiumSessionFactory;

#[async_trait]
impl SessionFactory for AppiumSessionFactory {
    async fn connect(&self, config: &FlowConfig) -> Result<Arc<dyn DeviceSession>, FlowError> {
        let session = AppiumSession::connect(&config.appium).await?;
        Ok(Arc::new(session))
    }
}

/// New-session capabilities for the configured app.
fn capabilities(config: &AppiumConfig) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "platformName": "Android",
                "appium:automationName": config.automation_name,
                "appium:deviceName": config.device_name,
                "appium:appPackage": config.app_package,
                "appium:appActivity": config.app_activity,
                "appium:noReset": config.no_reset,
                "appium:newCommandTimeout": config.new_command_timeout_seconds,
            },
            "firstMatch": [{}],
        }
    })
}

/// Unwraps the W3C `{"value": ...}` envelope or maps the error payload.
fn parse_response(status: StatusCode, body: &str) -> Result<Value, TransportError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        TransportError::InvalidResponse(format!("HTTP {status}: {e}: {}", truncate(body)))
    })?;
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if error == "no such element" {
            return Err(TransportError::NoSuchElement(message));
        }
        return Err(TransportError::protocol(error, message));
    }
    if !status.is_success() {
        return Err(TransportError::protocol(
            "unknown error",
            format!("HTTP {status}: {}", truncate(body)),
        ));
    }
    Ok(value)
}

fn element_ref(value: &Value) -> Result<NativeElement, TransportError> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(NativeElement::new)
        .ok_or_else(|| TransportError::InvalidResponse(format!("not an element: {value}")))
}

#[allow(clippy::cast_possible_truncation)]
fn parse_rect(value: &Value) -> Result<Rect, TransportError> {
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_f64)
            .map(|v| v.round() as i64)
            .ok_or_else(|| TransportError::InvalidResponse(format!("rect missing '{name}'")))
    };
    Ok(Rect::new(
        field("x")?,
        field("y")?,
        field("width")?,
        field("height")?,
    ))
}

fn decode_screenshot(encoded: &str) -> Result<Vec<u8>, TransportError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| TransportError::Decode(e.to_string()))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_capabilities_carry_app_identity() {
        let caps = capabilities(&AppiumConfig::default());
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["appium:automationName"], "UiAutomator2");
        assert_eq!(always["appium:appPackage"], "com.epidgames.trickcalrevive");
        assert_eq!(always["appium:noReset"], true);
        assert_eq!(always["appium:newCommandTimeout"], 1800);
    }

    #[test]
    fn test_parse_success_envelope() {
        let value = parse_response(StatusCode::OK, r#"{"value": {"implicit": 1000}}"#).unwrap();
        assert_eq!(value["implicit"], 1000);
    }

    #[test]
    fn test_parse_no_such_element() {
        let body = r#"{"value": {"error": "no such element", "message": "image not found"}}"#;
        let err = parse_response(StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(matches!(err, TransportError::NoSuchElement(ref m) if m == "image not found"));
    }

    #[test]
    fn test_parse_other_protocol_error() {
        let body = r#"{"value": {"error": "invalid session id", "message": "gone"}}"#;
        let err = parse_response(StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(matches!(err, TransportError::Protocol { ref error, .. } if error == "invalid session id"));
    }

    #[test]
    fn test_parse_non_json_body() {
        let err = parse_response(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
    }

    #[test]
    fn test_element_ref_w3c_key() {
        let value = json!({ELEMENT_KEY: "abc-123"});
        assert_eq!(element_ref(&value).unwrap().id(), "abc-123");
    }

    #[test]
    fn test_parse_rect_rounds_fractions() {
        let value = json!({"x": 10.4, "y": 20.6, "width": 100, "height": 50});
        assert_eq!(parse_rect(&value).unwrap(), Rect::new(10, 21, 100, 50));
    }

    #[test]
    fn test_decode_screenshot_ignores_line_breaks() {
        let bytes = decode_screenshot("iVBO\nRw0K").unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }
}
