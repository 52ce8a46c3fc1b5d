//! API client for the scanner's XML interface.
//!
//! Every call is a single form-encoded POST. Authenticated calls carry the
//! session token as the first parameter. The scanner reports a rejected token
//! inside an otherwise successful reply, so bodies are checked for the
//! unauthorized marker before anything is extracted from them.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::auth::Token;
use crate::extract::{extract, ExtractRequest, Record};
use crate::models::{Policy, PluginFamily, Report, Scan};

use super::{ApiError, FormParams, Result, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Marker the scanner embeds in a 200 reply when the token was refused.
/// Matched as a substring; the HTTP status is not meaningful for this case.
pub const UNAUTHORIZED_MARKER: &str = "<title>200 Unauthorized</title>";

mod endpoint {
    pub const LOGIN: &str = "login";
    pub const LOGOUT: &str = "logout";
    pub const REPORT_DOWNLOAD: &str = "file/report/download";
    pub const SCAN_NEW: &str = "scan/new";
    pub const SCAN_LIST: &str = "scan/list";
    pub const POLICY_LIST: &str = "policy/list";
    pub const REPORT_LIST: &str = "report/list";
    pub const PLUGINS_LIST: &str = "plugins/list";
}

const LOGIN_REQUEST: ExtractRequest<'static> = ExtractRequest::flat(&["token"]);
const LAUNCH_REQUEST: ExtractRequest<'static> = ExtractRequest::flat(&["uuid"]);
const POLICY_REQUEST: ExtractRequest<'static> =
    ExtractRequest::keyed(&["policyName", "policyOwner", "policyComments"], "policyID");
const REPORT_REQUEST: ExtractRequest<'static> =
    ExtractRequest::keyed(&["name", "readableName", "timestamp"], "name");
const SCAN_REQUEST: ExtractRequest<'static> = ExtractRequest::keyed(
    &["owner", "start_time", "completion_current", "completion_total"],
    "uuid",
);
const PLUGIN_REQUEST: ExtractRequest<'static> =
    ExtractRequest::keyed(&["familyName", "numFamilyMembers"], "familyName");

/// True when the reply says the supplied token was not accepted
pub fn is_unauthorized(body: &str) -> bool {
    body.contains(UNAUTHORIZED_MARKER)
}

/// Parameters for starting a scan.
#[derive(Debug, Clone)]
pub struct LaunchScan {
    pub name: String,
    pub policy_id: String,
    pub targets: Vec<String>,
}

impl LaunchScan {
    pub fn new(name: impl Into<String>, policy_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy_id: policy_id.into(),
            targets: Vec::new(),
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    fn to_params(&self, token: &Token) -> Result<FormParams> {
        if self.targets.is_empty() {
            return Err(ApiError::InvalidRequest(
                "a scan needs at least one target".to_string(),
            ));
        }
        Ok(FormParams::new()
            .push("token", token.as_str())
            .push("policy_id", self.policy_id.as_str())
            .push("target", self.targets.join(","))
            .push("scan_name", self.name.as_str()))
    }
}

/// Operation layer over a [`Transport`].
#[derive(Clone)]
pub struct ApiClient<T> {
    transport: T,
    base_url: String,
    token: Option<Token>,
}

impl<T: Transport> ApiClient<T> {
    /// `base_url` is the scanner root, e.g. `https://scanner:8834/`
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            transport,
            base_url,
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&mut self, token: Token) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) -> Option<Token> {
        self.token.take()
    }

    pub fn token(&self) -> Result<&Token> {
        self.token.as_ref().ok_or(ApiError::NotAuthenticated)
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn post(&self, endpoint: &str, form: &FormParams) -> Result<String> {
        let url = self.url(endpoint);
        debug!(endpoint, "Sending request");
        self.transport.send(&url, form).await
    }

    /// POST with the current token and reject unauthorized replies
    async fn post_authed(&self, endpoint: &str, form: FormParams) -> Result<String> {
        let body = self.post(endpoint, &form).await?;
        if is_unauthorized(&body) {
            warn!(endpoint, "Server rejected session token");
            return Err(ApiError::AuthorizationExpired);
        }
        Ok(body)
    }

    fn token_params(&self) -> Result<FormParams> {
        Ok(FormParams::new().push("token", self.token()?.as_str()))
    }

    async fn list(
        &self,
        endpoint: &str,
        request: &ExtractRequest<'_>,
    ) -> Result<BTreeMap<String, Record>> {
        let body = self.post_authed(endpoint, self.token_params()?).await?;
        let records = extract(&body, request)?.into_keyed()?;
        debug!(endpoint, count = records.len(), "Listed records");
        Ok(records)
    }

    // ===== Session =====

    /// Exchange credentials for a fresh token. Does not touch the held token.
    pub async fn login(&self, username: &str, password: &str) -> Result<Token> {
        let form = FormParams::new()
            .push("login", username)
            .push("password", password);
        let body = self.post(endpoint::LOGIN, &form).await?;
        drop(form);

        if is_unauthorized(&body) {
            return Err(ApiError::AuthFailed(format!("login rejected for {}", username)));
        }

        let record = extract(&body, &LOGIN_REQUEST)
            .map_err(|e| ApiError::AuthFailed(format!("unreadable login reply: {}", e)))?
            .into_flat()?;

        match record.get("token").and_then(|v| v.as_text()) {
            Some(token) if !token.is_empty() => {
                info!(username, "Logged in");
                Ok(Token::new(token))
            }
            _ => Err(ApiError::AuthFailed(format!(
                "no token returned for {}",
                username
            ))),
        }
    }

    /// Invalidate `token` on the server
    pub async fn logout(&self, token: &Token) -> Result<()> {
        let form = FormParams::new().push("token", token.as_str());
        self.post_authed(endpoint::LOGOUT, form).await?;
        info!("Logged out");
        Ok(())
    }

    /// Cheap authenticated request to see whether `token` is still accepted
    pub async fn check_auth(&self, token: &Token) -> Result<bool> {
        let form = FormParams::new().push("token", token.as_str());
        let body = self.post(endpoint::SCAN_LIST, &form).await?;
        Ok(!is_unauthorized(&body))
    }

    // ===== Reports and scans =====

    /// Download a report; the body is returned untouched
    pub async fn get_report(&self, uuid: &str) -> Result<String> {
        let form = self.token_params()?.push("report", uuid);
        self.post_authed(endpoint::REPORT_DOWNLOAD, form).await
    }

    /// Start a scan and return the new scan's uuid
    pub async fn launch_scan(&self, scan: &LaunchScan) -> Result<String> {
        let form = scan.to_params(self.token()?)?;
        let body = self.post_authed(endpoint::SCAN_NEW, form).await?;
        let record = extract(&body, &LAUNCH_REQUEST)?.into_flat()?;
        let uuid = record
            .get("uuid")
            .and_then(|v| v.as_text())
            .filter(|uuid| !uuid.is_empty())
            .ok_or_else(|| ApiError::malformed("scan/new reply has no uuid", &body))?;
        info!(scan_name = %scan.name, uuid, "Scan launched");
        Ok(uuid.to_string())
    }

    // ===== Listings =====

    /// Policies keyed by policy id
    pub async fn list_policies(&self) -> Result<BTreeMap<String, Record>> {
        self.list(endpoint::POLICY_LIST, &POLICY_REQUEST).await
    }

    /// Reports keyed by report name (uuid)
    pub async fn list_reports(&self) -> Result<BTreeMap<String, Record>> {
        self.list(endpoint::REPORT_LIST, &REPORT_REQUEST).await
    }

    /// Scans keyed by scan uuid
    pub async fn list_scans(&self) -> Result<BTreeMap<String, Record>> {
        self.list(endpoint::SCAN_LIST, &SCAN_REQUEST).await
    }

    /// Plugin families keyed by family name
    pub async fn list_plugins(&self) -> Result<BTreeMap<String, Record>> {
        self.list(endpoint::PLUGINS_LIST, &PLUGIN_REQUEST).await
    }

    pub async fn policies(&self) -> Result<Vec<Policy>> {
        let records = self.list_policies().await?;
        Ok(records.iter().map(|(k, r)| Policy::from_record(k, r)).collect())
    }

    pub async fn reports(&self) -> Result<Vec<Report>> {
        let records = self.list_reports().await?;
        Ok(records.iter().map(|(k, r)| Report::from_record(k, r)).collect())
    }

    pub async fn scans(&self) -> Result<Vec<Scan>> {
        let records = self.list_scans().await?;
        Ok(records.iter().map(|(k, r)| Scan::from_record(k, r)).collect())
    }

    pub async fn plugin_families(&self) -> Result<Vec<PluginFamily>> {
        let records = self.list_plugins().await?;
        Ok(records
            .iter()
            .map(|(k, r)| PluginFamily::from_record(k, r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    const BASE: &str = "https://scanner:8834/";

    fn client(transport: &ScriptedTransport) -> ApiClient<&ScriptedTransport> {
        let mut client = ApiClient::new(transport, BASE);
        client.set_token(Token::new("tok"));
        client
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(is_unauthorized(
            "<html><head><title>200 Unauthorized</title></head></html>"
        ));
        assert!(!is_unauthorized("<reply><status>OK</status></reply>"));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let transport = ScriptedTransport::new();
        let client = ApiClient::new(&transport, "https://scanner:8834");
        assert_eq!(client.base_url(), BASE);
    }

    #[tokio::test]
    async fn test_login_returns_token() {
        let transport = ScriptedTransport::new();
        transport.reply("login", "<reply><contents><token>fresh</token></contents></reply>");
        let client = ApiClient::new(&transport, BASE);

        let token = client.login("admin", "pw").await.unwrap();
        assert_eq!(token, Token::new("fresh"));

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://scanner:8834/login");
        assert_eq!(calls[0].param("login"), Some("admin"));
        assert_eq!(calls[0].param("password"), Some("pw"));
        assert_eq!(calls[0].param("token"), None);
    }

    #[tokio::test]
    async fn test_login_without_token_fails() {
        let transport = ScriptedTransport::new();
        transport.reply("login", "<reply><status>ERROR</status></reply>");
        let client = ApiClient::new(&transport, BASE);

        let err = client.login("admin", "bad").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_operations_require_token() {
        let transport = ScriptedTransport::new();
        let client = ApiClient::new(&transport, BASE);

        assert!(matches!(client.list_policies().await, Err(ApiError::NotAuthenticated)));
        assert!(matches!(client.get_report("r").await, Err(ApiError::NotAuthenticated)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_marker_fails_every_operation() {
        let body = "<reply><contents><policies><policy><policyID>1</policyID></policy></policies>\
                    <uuid>u</uuid></contents><title>200 Unauthorized</title></reply>";
        let transport = ScriptedTransport::new().fallback(body);
        let client = client(&transport);

        assert!(matches!(client.list_policies().await, Err(ApiError::AuthorizationExpired)));
        assert!(matches!(client.list_reports().await, Err(ApiError::AuthorizationExpired)));
        assert!(matches!(client.list_scans().await, Err(ApiError::AuthorizationExpired)));
        assert!(matches!(client.list_plugins().await, Err(ApiError::AuthorizationExpired)));
        assert!(matches!(client.get_report("r").await, Err(ApiError::AuthorizationExpired)));
        let scan = LaunchScan::new("n", "1").target("10.0.0.1");
        assert!(matches!(client.launch_scan(&scan).await, Err(ApiError::AuthorizationExpired)));
    }

    #[tokio::test]
    async fn test_list_policies() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "policy/list",
            "<reply><contents><policies>\
             <policy><policyID>-1</policyID><policyName>Default</policyName>\
             <policyOwner>admin</policyOwner><policyComments>Stock</policyComments></policy>\
             <policy><policyID>4</policyID><policyName>Web</policyName>\
             <policyOwner>bob</policyOwner><policyComments/></policy>\
             </policies></contents></reply>",
        );
        let client = client(&transport);

        let policies = client.list_policies().await.unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(policies["-1"]["policyName"].as_text(), Some("Default"));
        assert_eq!(policies["4"]["policyOwner"].as_text(), Some("bob"));
        assert_eq!(transport.calls()[0].param("token"), Some("tok"));
    }

    #[tokio::test]
    async fn test_list_scans_converts_start_time() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "scan/list",
            "<reply><contents><scans><scanList>\
             <scan><uuid>abc</uuid><owner>admin</owner><start_time>1281600000</start_time>\
             <completion_current>5</completion_current>\
             <completion_total>10</completion_total></scan>\
             </scanList></scans></contents></reply>",
        );
        let client = client(&transport);

        let scans = client.scans().await.unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].uuid, "abc");
        assert_eq!(scans[0].start_time.unwrap().timestamp(), 1281600000);
        assert_eq!(scans[0].progress_percent(), Some(50));
    }

    #[tokio::test]
    async fn test_launch_scan() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "scan/new",
            "<reply><contents><scan><uuid>new-scan</uuid></scan></contents></reply>",
        );
        let client = client(&transport);

        let scan = LaunchScan::new("Weekly scan", "4")
            .target("10.0.0.1")
            .target("10.0.0.2");
        let uuid = client.launch_scan(&scan).await.unwrap();
        assert_eq!(uuid, "new-scan");

        let calls = transport.calls();
        let call = &calls[0];
        assert_eq!(call.url, "https://scanner:8834/scan/new");
        assert_eq!(call.keys, vec!["token", "policy_id", "target", "scan_name"]);
        assert_eq!(call.param("target"), Some("10.0.0.1,10.0.0.2"));
        assert_eq!(call.param("scan_name"), Some("Weekly scan"));
    }

    #[tokio::test]
    async fn test_launch_scan_without_uuid_is_malformed() {
        let transport = ScriptedTransport::new();
        transport.reply("scan/new", "<reply><status>ERROR</status></reply>");
        let client = client(&transport);

        let scan = LaunchScan::new("n", "1").target("h");
        assert!(matches!(
            client.launch_scan(&scan).await,
            Err(ApiError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_launch_scan_needs_targets() {
        let transport = ScriptedTransport::new();
        let client = client(&transport);

        let scan = LaunchScan::new("n", "1");
        assert!(matches!(
            client.launch_scan(&scan).await,
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_report_returns_raw_body() {
        let transport = ScriptedTransport::new();
        let report = "<NessusClientData_v2><Report name=\"x\"/></NessusClientData_v2>";
        transport.reply("file/report/download", report);
        let client = client(&transport);

        assert_eq!(client.get_report("r-1").await.unwrap(), report);
        assert_eq!(transport.calls()[0].param("report"), Some("r-1"));
    }

    #[tokio::test]
    async fn test_check_auth() {
        let transport = ScriptedTransport::new();
        transport.reply("scan/list", "<reply><status>OK</status></reply>");
        transport.reply("scan/list", "<title>200 Unauthorized</title>");
        let client = ApiClient::new(&transport, BASE);

        assert!(client.check_auth(&Token::new("a")).await.unwrap());
        assert!(!client.check_auth(&Token::new("b")).await.unwrap());
        assert_eq!(transport.calls()[1].param("token"), Some("b"));
    }

    #[tokio::test]
    async fn test_logout_rejected_token() {
        let transport = ScriptedTransport::new();
        transport.reply("logout", "<html><title>200 Unauthorized</title></html>");
        let client = ApiClient::new(&transport, BASE);

        assert!(matches!(
            client.logout(&Token::new("t")).await,
            Err(ApiError::AuthorizationExpired)
        ));
        assert_eq!(transport.calls()[0].param("token"), Some("t"));
    }

    #[tokio::test]
    async fn test_logout_accepted() {
        let transport = ScriptedTransport::new();
        transport.reply("logout", "<reply><status>OK</status></reply>");
        let client = ApiClient::new(&transport, BASE);

        client.logout(&Token::new("t")).await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        let transport = ScriptedTransport::new();
        transport.fail("plugins/list", "connection refused");
        let client = client(&transport);

        assert!(matches!(client.list_plugins().await, Err(ApiError::Transport(_))));
    }

    #[tokio::test]
    async fn test_malformed_listing() {
        let transport = ScriptedTransport::new();
        transport.reply("report/list", "<reply><contents>");
        let client = client(&transport);

        assert!(matches!(
            client.list_reports().await,
            Err(ApiError::MalformedResponse(_))
        ));
    }
}
